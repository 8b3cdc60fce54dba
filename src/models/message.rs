//! Message wire type and the typed metadata bag.
//!
//! The server stores message metadata as an open JSON object. At the
//! network boundary this client validates the known shapes (tool-call
//! records, reference citations) into a tagged union and preserves
//! anything unrecognized as raw JSON so nothing is lost on round-trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Who authored a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Ai,
}

/// Persistence status of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Streaming,
    #[default]
    Completed,
    Failed,
    Partial,
    #[serde(other)]
    Unknown,
}

/// A tool invocation recorded in message metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

/// A knowledge-base citation recorded in message metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ReferenceRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// One validated metadata entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataRecord {
    /// Tool invocations attached to an assistant message.
    Tools(Vec<ToolRecord>),
    /// Knowledge-base citations attached to an assistant message.
    References(Vec<ReferenceRecord>),
    /// A key this client build does not understand, kept verbatim.
    Other { key: String, value: Value },
}

/// The message metadata bag, validated at the network boundary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
pub struct MessageMetadata {
    records: Vec<MetadataRecord>,
}

impl MessageMetadata {
    /// Build metadata from validated records.
    pub fn from_records(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    /// All records, in wire order.
    pub fn records(&self) -> &[MetadataRecord] {
        &self.records
    }

    /// Tool invocations, if any were recorded.
    pub fn tools(&self) -> Option<&[ToolRecord]> {
        self.records.iter().find_map(|r| match r {
            MetadataRecord::Tools(tools) => Some(tools.as_slice()),
            _ => None,
        })
    }

    /// Reference citations, if any were recorded.
    pub fn references(&self) -> Option<&[ReferenceRecord]> {
        self.records.iter().find_map(|r| match r {
            MetadataRecord::References(refs) => Some(refs.as_slice()),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for MessageMetadata {
    fn from(map: BTreeMap<String, Value>) -> Self {
        let mut records = Vec::with_capacity(map.len());
        for (key, value) in map {
            let record = match key.as_str() {
                // A malformed known key degrades to Other rather than
                // failing the whole message decode.
                "tools" => serde_json::from_value::<Vec<ToolRecord>>(value.clone())
                    .map(MetadataRecord::Tools)
                    .unwrap_or(MetadataRecord::Other { key, value }),
                "references" => serde_json::from_value::<Vec<ReferenceRecord>>(value.clone())
                    .map(MetadataRecord::References)
                    .unwrap_or(MetadataRecord::Other { key, value }),
                _ => MetadataRecord::Other { key, value },
            };
            records.push(record);
        }
        Self { records }
    }
}

impl From<MessageMetadata> for BTreeMap<String, Value> {
    fn from(metadata: MessageMetadata) -> Self {
        let mut map = BTreeMap::new();
        for record in metadata.records {
            match record {
                MetadataRecord::Tools(tools) => {
                    map.insert(
                        "tools".to_string(),
                        serde_json::to_value(tools).unwrap_or(Value::Null),
                    );
                }
                MetadataRecord::References(refs) => {
                    map.insert(
                        "references".to_string(),
                        serde_json::to_value(refs).unwrap_or(Value::Null),
                    );
                }
                MetadataRecord::Other { key, value } => {
                    map.insert(key, value);
                }
            }
        }
        map
    }
}

/// A message as persisted by the server. Immutable on the client once
/// fetched; streaming-time status/content transitions are observed only
/// through re-fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(alias = "conversation_id")]
    pub conversation_id: String,
    #[serde(default, alias = "parent_message_id")]
    pub parent_message_id: Option<String>,
    #[serde(alias = "sender_type")]
    pub sender_type: SenderType,
    pub content: String,
    #[serde(default, alias = "content_type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
    #[serde(default, alias = "token_count")]
    pub token_count: Option<u32>,
    #[serde(default, alias = "processing_time_ms")]
    pub processing_time_ms: Option<u64>,
    #[serde(default)]
    pub status: MessageStatus,
    #[serde(default, alias = "error_message")]
    pub error_message: Option<String>,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Build the optimistic pending user message shown at send time,
    /// before the server confirms persistence.
    pub fn pending_user(conversation_id: &str, content: &str) -> Self {
        Self {
            id: format!("pending-{}", uuid::Uuid::new_v4()),
            conversation_id: conversation_id.to_string(),
            parent_message_id: None,
            sender_type: SenderType::User,
            content: content.to_string(),
            content_type: Some("text".to_string()),
            metadata: None,
            token_count: None,
            processing_time_ms: None,
            status: MessageStatus::Pending,
            error_message: None,
            created_at: Some(Utc::now()),
        }
    }
}

/// Request body for sending a message
/// (POST /conversations/{id}/messages).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}
