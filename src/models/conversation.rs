//! Conversation wire type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Archived,
    /// Statuses this client build does not know about.
    #[serde(other)]
    Unknown,
}

/// A conversation as persisted by the server. The client never mutates
/// this directly; renames and deletes go through REST and the mirror is
/// refreshed from the response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: ConversationStatus,
    #[serde(default, alias = "total_messages")]
    pub total_messages: i64,
    #[serde(default, alias = "last_message_at")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request body for creating a conversation (POST /conversations).
///
/// The server may return an existing empty conversation instead of
/// creating a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Request body for renaming a conversation (PUT /conversations/{id}).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameConversationRequest {
    pub title: String,
}
