//! Wire types for the assistant backend API.
//!
//! Every REST response is wrapped in [`ApiEnvelope`]; list endpoints
//! additionally wrap their payload in [`Paginated`]. Field names are
//! camelCase on the wire, with snake_case aliases accepted for
//! tolerance against older backend builds.

use serde::{Deserialize, Serialize};

pub mod conversation;
pub mod knowledge;
pub mod message;
pub mod tools;

pub use conversation::{
    Conversation, ConversationStatus, CreateConversationRequest, RenameConversationRequest,
};
pub use knowledge::{
    CreateCategoryRequest, CreateDocumentRequest, DocumentSearch, ImportResult,
    KnowledgeCategory, KnowledgeDocument, UpdateCategoryRequest, UpdateDocumentRequest,
};
pub use message::{
    Message, MessageMetadata, MessageStatus, MetadataRecord, ReferenceRecord,
    SendMessageRequest, SenderType, ToolRecord,
};
pub use tools::{
    CreateToolRequest, McpConfig, TestToolRequest, Tool, ToolConfig, ToolExecution,
    ToolTestOutcome, ToolTypeInfo, ToolTypeTemplate, UpdateToolRequest,
};

/// Standard response envelope used by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default, alias = "error_code")]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Pagination block returned by list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    #[serde(alias = "page_size")]
    pub page_size: u32,
    pub total: u64,
    #[serde(alias = "total_page")]
    pub total_page: u64,
}

/// A page of results plus its pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Login request (POST /auth/login).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Registration request (POST /auth/register).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

/// Successful login/register payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(alias = "access_token")]
    pub access_token: String,
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
    #[serde(default, alias = "expires_in")]
    pub expires_in: Option<u32>,
    pub user: UserInfo,
}

/// Refresh-token exchange request (POST /auth/refresh).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh-token exchange payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(alias = "access_token")]
    pub access_token: String,
    #[serde(default, alias = "refresh_token")]
    pub refresh_token: Option<String>,
    #[serde(default, alias = "expires_in")]
    pub expires_in: Option<u32>,
}

/// Authenticated user profile (GET /auth/profile).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default, alias = "display_name")]
    pub display_name: Option<String>,
    #[serde(default, rename = "avatarURL", alias = "avatar_url")]
    pub avatar_url: Option<String>,
    pub role: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "last_login_at")]
    pub last_login_at: Option<chrono::DateTime<chrono::Utc>>,
}
