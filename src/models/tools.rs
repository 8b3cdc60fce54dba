//! Tool registry wire types.
//!
//! A tool's `config` is shaped by its `toolType`. MCP-backed tools have
//! a known schema and decode into [`McpConfig`]; every other type keeps
//! its config as a raw JSON object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Per-type tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolConfig {
    /// MCP server connection settings.
    Mcp(McpConfig),
    /// Config for tool types this client build does not model.
    Custom(Map<String, Value>),
}

impl ToolConfig {
    /// The MCP view of this config, if it decoded as one.
    pub fn as_mcp(&self) -> Option<&McpConfig> {
        match self {
            ToolConfig::Mcp(mcp) => Some(mcp),
            ToolConfig::Custom(_) => None,
        }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig::Custom(Map::new())
    }
}

/// Connection settings for an MCP-backed tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct McpConfig {
    pub protocol: String,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, alias = "timeout_ms", skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, alias = "allowed_tools", skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
}

/// A registered tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: String,
    pub name: String,
    #[serde(alias = "display_name")]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "tool_type")]
    pub tool_type: String,
    #[serde(default)]
    pub config: ToolConfig,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, alias = "last_status")]
    pub last_status: Option<String>,
    #[serde(default, alias = "last_executed_at")]
    pub last_executed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "execution_count")]
    pub execution_count: Option<u64>,
    #[serde(default, alias = "created_by")]
    pub created_by: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request body for registering a tool (POST /tools).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateToolRequest {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub tool_type: String,
    pub config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Request body for updating a tool (PUT /tools/{id}).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateToolRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Request body for a connectivity test (POST /tools/test).
///
/// Tests a candidate config without persisting anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestToolRequest {
    pub tool_type: String,
    pub config: Value,
}

/// Outcome of a connectivity test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolTestOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "response_time")]
    pub response_time: Option<u64>,
    #[serde(default)]
    pub details: Option<Value>,
}

/// A recorded tool execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolExecution {
    pub id: String,
    #[serde(alias = "tool_id")]
    pub tool_id: String,
    #[serde(default, alias = "message_id")]
    pub message_id: Option<String>,
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(default, alias = "input_params")]
    pub input_params: Option<Value>,
    #[serde(default, alias = "output_result")]
    pub output_result: Option<Value>,
    #[serde(default, alias = "execution_time_ms")]
    pub execution_time_ms: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "error_message")]
    pub error_message: Option<String>,
    #[serde(default, alias = "executed_at")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A tool type the server supports (GET /tools/types).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolTypeInfo {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "config_schema")]
    pub config_schema: Option<Value>,
    #[serde(default)]
    pub examples: Option<Value>,
}

/// Config template for one tool type
/// (GET /tools/types/{type}/template).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolTypeTemplate {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "config_schema")]
    pub config_schema: Option<Value>,
    #[serde(default, alias = "default_config")]
    pub default_config: Option<Value>,
    #[serde(default)]
    pub examples: Option<Value>,
}
