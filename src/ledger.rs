//! Tool call ledger
//!
//! Tracks tool invocations observed during one streaming turn. The
//! backend does not correlate start and finish events with an id, so
//! finishes are matched to the newest running entry with the same tool
//! name. A finish with no matching start still produces an entry, so
//! the ledger never silently drops an observed invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sse::ToolCallOutcome;

/// Status of a ledger entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ToolCallStatus {
    /// Tool is currently running
    #[default]
    Running,
    /// Tool completed successfully
    Success,
    /// Tool execution failed
    Failed,
}

/// One tool invocation observed on the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallEntry {
    /// Name of the tool being executed
    pub tool_name: String,
    /// Status of the invocation
    pub status: ToolCallStatus,
    /// Pretty-printed arguments, for display
    pub args_preview: Option<String>,
    /// Pretty-printed result, populated on finish
    pub result_preview: Option<String>,
    /// Error message if the tool failed
    pub error: Option<String>,
    /// Reported execution time in milliseconds
    pub duration_ms: Option<u64>,
    /// Server-reported start time of the invocation
    pub started_at: Option<DateTime<Utc>>,
}

impl ToolCallEntry {
    fn running(
        tool_name: String,
        args_preview: Option<String>,
        started_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            tool_name,
            status: ToolCallStatus::Running,
            args_preview,
            result_preview: None,
            error: None,
            duration_ms: None,
            started_at,
        }
    }

    /// Check if the invocation is still running.
    pub fn is_running(&self) -> bool {
        self.status == ToolCallStatus::Running
    }
}

/// Best-effort pretty-print for display previews. Strings that parse
/// as JSON are re-rendered indented; anything else passes through.
fn pretty_preview(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_object() || value.is_array() => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string())
        }
        _ => raw.to_string(),
    }
}

/// Ledger of tool invocations for one streaming turn.
///
/// Ephemeral state, cleared when the turn reaches a terminal event.
/// Entries keep their arrival order for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallLedger {
    entries: Vec<ToolCallEntry>,
}

impl ToolCallLedger {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tool start. Appends a running entry.
    pub fn record_started(
        &mut self,
        tool_name: &str,
        args: Option<&Value>,
        started_at: Option<DateTime<Utc>>,
    ) {
        let args_preview = args.map(|a| {
            serde_json::to_string_pretty(a).unwrap_or_else(|_| a.to_string())
        });
        self.entries.push(ToolCallEntry::running(
            tool_name.to_string(),
            args_preview,
            started_at,
        ));
    }

    /// Record a tool finish.
    ///
    /// Resolves the newest running entry with the same name. When two
    /// same-named calls overlap this assumes last-started finishes
    /// first, which holds for the backend's sequential tool loop. A
    /// finish with no matching start synthesizes an already-resolved
    /// entry.
    pub fn record_finished(
        &mut self,
        tool_name: &str,
        outcome: ToolCallOutcome,
        duration_ms: Option<u64>,
        result_preview: Option<&str>,
        error: Option<&str>,
    ) {
        let status = match outcome {
            ToolCallOutcome::Success => ToolCallStatus::Success,
            ToolCallOutcome::Failed => ToolCallStatus::Failed,
        };
        let result_preview = result_preview.map(pretty_preview);
        let error = error.map(String::from);

        let matched = self
            .entries
            .iter_mut()
            .rev()
            .find(|entry| entry.is_running() && entry.tool_name == tool_name);

        match matched {
            Some(entry) => {
                entry.status = status;
                entry.duration_ms = duration_ms;
                entry.result_preview = result_preview;
                entry.error = error;
            }
            None => {
                self.entries.push(ToolCallEntry {
                    tool_name: tool_name.to_string(),
                    status,
                    args_preview: None,
                    result_preview,
                    error,
                    duration_ms,
                    started_at: None,
                });
            }
        }
    }

    /// All entries, in arrival order.
    pub fn entries(&self) -> &[ToolCallEntry] {
        &self.entries
    }

    /// Check if any invocation is still running.
    pub fn has_running(&self) -> bool {
        self.entries.iter().any(|entry| entry.is_running())
    }

    /// Number of running invocations.
    pub fn running_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_running()).count()
    }

    /// Clear the ledger (called when the turn ends).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
