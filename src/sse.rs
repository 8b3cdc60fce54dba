//! SSE (Server-Sent Events) stream parser
//!
//! Parses the SSE format used by the assistant backend's streaming
//! endpoint. SSE format consists of:
//! - `event: <type>` - event type line
//! - `data: <json>` - data payload line
//! - Empty line - signals end of event
//! - Lines starting with `:` - comments (ignored)
//!
//! The backend additionally wraps each payload in an envelope,
//! `data: {"type": "<type>", "data": {...}}`, mirroring the event type
//! into the body. The parser unwraps that envelope so handlers only
//! ever see the inner payload.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Represents a parsed SSE line
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Event type declaration (e.g., "event: content_delta")
    Event(String),
    /// Data payload (e.g., "data: {\"delta\": \"hello\"}")
    Data(String),
    /// Empty line - signals end of event
    Empty,
    /// Comment line (starts with ':')
    Comment(String),
}

/// Terminal status of a tool call reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallOutcome {
    Success,
    Failed,
}

impl ToolCallOutcome {
    fn from_status(status: Option<&str>) -> Self {
        match status {
            Some("success") => ToolCallOutcome::Success,
            _ => ToolCallOutcome::Failed,
        }
    }
}

/// Typed events from the streaming endpoint.
///
/// Unknown event types never reach this enum; the parser drops them so
/// backend additions don't break older clients.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Generation turn began; the assistant message row exists
    MessageStart {
        message_id: Option<String>,
    },
    /// A chunk of assistant text, to be appended verbatim
    ContentDelta {
        delta: String,
    },
    /// Pre-generation planning began
    PlanningStart {
        intent_detected: Option<String>,
    },
    /// Tool discovery began
    ToolsLoadingStart,
    /// Tool discovery finished
    ToolsLoadingFinished {
        tool_count: Option<u32>,
    },
    /// One model iteration of the tool loop began
    ModelStepStarted {
        iteration: u32,
    },
    /// One model iteration finished
    ModelStepFinished {
        iteration: u32,
        has_tool_calls: bool,
    },
    /// Planning phase ended, possibly without running
    PlanningFinished {
        skipped: bool,
    },
    /// A tool invocation began
    ToolCallStarted {
        tool_name: String,
        args: Option<Value>,
        started_at: Option<DateTime<Utc>>,
    },
    /// A tool invocation ended
    ToolCallFinished {
        tool_name: String,
        outcome: ToolCallOutcome,
        duration_ms: Option<u64>,
        result_preview: Option<String>,
        error: Option<String>,
    },
    /// The server renamed the conversation (auto-titling)
    ConversationTitleUpdated {
        conversation_id: String,
    },
    /// The assistant message was persisted
    MessageComplete {
        message_id: Option<String>,
    },
    /// Generation failed server-side
    AiError {
        error: String,
    },
    /// The server is about to close the stream
    Done,
}

impl StreamEvent {
    /// Returns the wire name of this event, for logging.
    pub fn event_type_name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentDelta { .. } => "content_delta",
            StreamEvent::PlanningStart { .. } => "planning_start",
            StreamEvent::ToolsLoadingStart => "tools_loading_start",
            StreamEvent::ToolsLoadingFinished { .. } => "tools_loading_finished",
            StreamEvent::ModelStepStarted { .. } => "model_step_started",
            StreamEvent::ModelStepFinished { .. } => "model_step_finished",
            StreamEvent::PlanningFinished { .. } => "planning_finished",
            StreamEvent::ToolCallStarted { .. } => "tool_call_started",
            StreamEvent::ToolCallFinished { .. } => "tool_call_finished",
            StreamEvent::ConversationTitleUpdated { .. } => "conversation_title_updated",
            StreamEvent::MessageComplete { .. } => "message_complete",
            StreamEvent::AiError { .. } => "ai_error",
            StreamEvent::Done => "done",
        }
    }
}

/// content_delta payload. Only `delta` matters; the backend also sends
/// the accumulated `content` but clients must append deltas themselves.
#[derive(Debug, Clone, Deserialize)]
struct ContentDeltaPayload {
    #[serde(default)]
    delta: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ToolCallFinishedPayload {
    #[serde(alias = "toolName", default)]
    tool_name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(alias = "durationMs", default)]
    duration_ms: Option<u64>,
    #[serde(alias = "resultPreview", default)]
    result_preview: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelStepPayload {
    #[serde(default)]
    iteration: Option<u32>,
    #[serde(alias = "hasToolCalls", default)]
    has_tool_calls: Option<bool>,
}

/// Parse a single SSE line into its component type
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return SseLine::Comment(stripped.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        return SseLine::Data(rest.trim().to_string());
    }

    // Unknown line format - treat as comment
    SseLine::Comment(line.to_string())
}

fn invalid_json(event_type: &str, e: serde_json::Error) -> SseParseError {
    SseParseError::InvalidJson {
        event_type: event_type.to_string(),
        source: e.to_string(),
    }
}

/// Parse an SSE event type and data payload into a typed [`StreamEvent`].
///
/// Returns `Ok(None)` for event types this client does not know, so a
/// stream never fails because the backend grew a new event.
pub fn parse_stream_event(
    event_type: &str,
    data: &str,
) -> Result<Option<StreamEvent>, SseParseError> {
    match event_type {
        "message_start" => {
            let v: Value = serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            Ok(Some(StreamEvent::MessageStart {
                message_id: json_string(&v, &["messageId", "message_id"]),
            }))
        }
        "content_delta" => {
            let payload: ContentDeltaPayload =
                serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            Ok(Some(StreamEvent::ContentDelta {
                delta: payload.delta.unwrap_or_default(),
            }))
        }
        "planning_start" => {
            let v: Value = serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            Ok(Some(StreamEvent::PlanningStart {
                intent_detected: json_string(&v, &["intentDetected", "intent_detected"]),
            }))
        }
        "tools_loading_start" => Ok(Some(StreamEvent::ToolsLoadingStart)),
        "tools_loading_finished" => {
            let v: Value = serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            let tool_count = v
                .get("toolCount")
                .or_else(|| v.get("tool_count"))
                .and_then(|n| n.as_u64())
                .map(|n| n as u32);
            Ok(Some(StreamEvent::ToolsLoadingFinished { tool_count }))
        }
        "model_step_started" => {
            let payload: ModelStepPayload =
                serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            Ok(Some(StreamEvent::ModelStepStarted {
                iteration: payload.iteration.unwrap_or(0),
            }))
        }
        "model_step_finished" => {
            let payload: ModelStepPayload =
                serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            Ok(Some(StreamEvent::ModelStepFinished {
                iteration: payload.iteration.unwrap_or(0),
                has_tool_calls: payload.has_tool_calls.unwrap_or(false),
            }))
        }
        "planning_finished" => {
            let v: Value = serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            Ok(Some(StreamEvent::PlanningFinished {
                skipped: v.get("skipped").and_then(|b| b.as_bool()).unwrap_or(false),
            }))
        }
        "tool_call_started" => {
            let v: Value = serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            Ok(Some(StreamEvent::ToolCallStarted {
                tool_name: json_string(&v, &["toolName", "tool_name"]).unwrap_or_default(),
                args: v.get("args").cloned().filter(|a| !a.is_null()),
                started_at: json_timestamp(&v, "timestamp"),
            }))
        }
        "tool_call_finished" => {
            let payload: ToolCallFinishedPayload =
                serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            // Older backends send a raw `result` instead of a preview
            let result_preview = payload.result_preview.or_else(|| {
                payload.result.as_ref().map(|r| match r.as_str() {
                    Some(s) => s.to_string(),
                    None => r.to_string(),
                })
            });
            Ok(Some(StreamEvent::ToolCallFinished {
                tool_name: payload.tool_name.unwrap_or_default(),
                outcome: ToolCallOutcome::from_status(payload.status.as_deref()),
                duration_ms: payload.duration_ms,
                result_preview,
                error: payload.error,
            }))
        }
        "conversation_title_updated" => {
            let v: Value = serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            let conversation_id = json_string(&v, &["conversationId", "conversation_id"])
                .ok_or_else(|| SseParseError::MissingData {
                    event_type: event_type.to_string(),
                })?;
            Ok(Some(StreamEvent::ConversationTitleUpdated { conversation_id }))
        }
        "message_complete" => {
            let v: Value = serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            Ok(Some(StreamEvent::MessageComplete {
                message_id: json_string(&v, &["messageId", "message_id"]),
            }))
        }
        "ai_error" | "error" => {
            let v: Value = serde_json::from_str(data).map_err(|e| invalid_json(event_type, e))?;
            Ok(Some(StreamEvent::AiError {
                error: json_string(&v, &["error", "message"]).unwrap_or_default(),
            }))
        }
        "done" => Ok(Some(StreamEvent::Done)),
        // Unknown event types are dropped, not errors
        _ => Ok(None),
    }
}

/// Timestamps arrive either as RFC 3339 strings or epoch milliseconds.
fn json_timestamp(v: &Value, key: &str) -> Option<DateTime<Utc>> {
    match v.get(key)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_i64()?),
        _ => None,
    }
}

fn json_string(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        v.get(key).and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    })
}

/// Errors that can occur during SSE parsing
#[derive(Debug, Clone, PartialEq)]
pub enum SseParseError {
    /// Invalid JSON in data payload
    InvalidJson {
        event_type: String,
        source: String,
    },
    /// Missing data for event
    MissingData {
        event_type: String,
    },
}

impl std::fmt::Display for SseParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SseParseError::InvalidJson { event_type, source } => {
                write!(f, "Invalid JSON for event '{}': {}", event_type, source)
            }
            SseParseError::MissingData { event_type } => {
                write!(f, "Missing data for event type: {}", event_type)
            }
        }
    }
}

impl std::error::Error for SseParseError {}

/// Stateful SSE parser that accumulates lines and emits complete events
#[derive(Debug, Default)]
pub struct SseParser {
    /// Current event type being accumulated
    current_event_type: Option<String>,
    /// Accumulated data lines (SSE allows multiple data: lines)
    data_buffer: Vec<String>,
}

impl SseParser {
    /// Create a new SSE parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a line to the parser, potentially returning a complete event
    ///
    /// Returns:
    /// - `Ok(Some(event))` - A complete event was parsed
    /// - `Ok(None)` - Line was consumed, or it completed an event this
    ///   client doesn't know about
    /// - `Err(error)` - Parse error occurred
    pub fn feed_line(&mut self, line: &str) -> Result<Option<StreamEvent>, SseParseError> {
        let parsed = parse_sse_line(line);

        match parsed {
            SseLine::Event(event_type) => {
                self.current_event_type = Some(event_type);
                Ok(None)
            }
            SseLine::Data(data) => {
                self.data_buffer.push(data);
                Ok(None)
            }
            SseLine::Empty => {
                // Empty line signals end of event - try to emit
                self.try_emit_event()
            }
            SseLine::Comment(_) => {
                // Comments are ignored
                Ok(None)
            }
        }
    }

    /// Drop any partially accumulated event.
    pub fn reset(&mut self) {
        self.current_event_type = None;
        self.data_buffer.clear();
    }

    /// Try to emit a complete event from accumulated state
    fn try_emit_event(&mut self) -> Result<Option<StreamEvent>, SseParseError> {
        // If we have no event type or data, nothing to emit
        if self.current_event_type.is_none() && self.data_buffer.is_empty() {
            return Ok(None);
        }

        let mut event_type = self.current_event_type.take();
        let data = self.data_buffer.join("\n");
        self.data_buffer.clear();

        // Unwrap the backend's {"type": ..., "data": {...}} envelope.
        // The envelope also covers the case where no `event:` line was
        // sent and the type only appears in the body.
        let mut payload = data;
        if !payload.is_empty() {
            if let Ok(json) = serde_json::from_str::<Value>(&payload) {
                let body_type = json.get("type").and_then(|t| t.as_str()).map(String::from);
                if let Some(inner) = json.get("data") {
                    if body_type.is_some() {
                        payload = inner.to_string();
                    }
                }
                if event_type.is_none() {
                    event_type = body_type;
                }
            }
        }

        match event_type {
            Some(et) => {
                if payload.is_empty() {
                    // Events like 'done' may carry no body at all
                    parse_stream_event(&et, "{}")
                } else {
                    parse_stream_event(&et, &payload)
                }
            }
            // Data without any event type is unattributable; drop it
            None => Ok(None),
        }
    }
}
