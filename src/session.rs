//! Streaming session state machine
//!
//! One [`StreamingSession`] tracks a single generation turn for a
//! conversation: the phase of the turn, the accumulated assistant text,
//! the planning notes log, and the tool-call ledger. Applying an event
//! returns signals that tell the owner what changed; the session never
//! touches the cache or the network itself.

use crate::ledger::ToolCallLedger;
use crate::sse::StreamEvent;

/// Phase of a generation turn.
///
/// `Planning` and `ToolLoop` are optional detours; a turn that goes
/// straight to text skips them entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No events applied yet
    #[default]
    Idle,
    /// Pre-generation planning is running
    Planning,
    /// The model is iterating through tool calls
    ToolLoop,
    /// Assistant text is arriving
    ContentStreaming,
    /// The turn finished normally
    Completed,
    /// The turn failed server-side
    Errored,
    /// The turn was abandoned by disconnecting
    Cancelled,
}

impl SessionPhase {
    /// Whether the turn has ended. Terminal sessions ignore further
    /// events, which makes the trailing `done` after `message_complete`
    /// a no-op instead of a second invalidation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionPhase::Completed | SessionPhase::Errored | SessionPhase::Cancelled
        )
    }
}

/// What an applied event changed, for the owner to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    /// Visible streaming state changed (text, notes, or ledger)
    ContentChanged,
    /// The persisted message list for this conversation is stale
    InvalidateMessages,
    /// The conversation list (titles, counts, ordering) is stale
    InvalidateConversations,
    /// Generation failed; the text should be surfaced to the user
    Error(String),
}

/// State of one generation turn.
#[derive(Debug, Default)]
pub struct StreamingSession {
    phase: SessionPhase,
    /// Whether message_start has been observed
    started: bool,
    /// Assistant text accumulated so far, deltas appended verbatim
    content: String,
    /// Ordered planning/progress notes; entries are never removed
    /// while the turn runs
    notes: Vec<String>,
    ledger: ToolCallLedger,
    /// Error text when the phase is Errored
    error: Option<String>,
}

impl StreamingSession {
    /// Create a fresh session in the Idle phase.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Assistant text streamed so far (empty after the turn ends).
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Planning and progress notes, in arrival order.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn ledger(&self) -> &ToolCallLedger {
        &self.ledger
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a turn is underway (for list badges on background
    /// conversations).
    pub fn is_generating(&self) -> bool {
        self.started && !self.phase.is_terminal()
    }

    /// Apply one stream event and report what changed.
    ///
    /// Events applied after a terminal phase are ignored.
    pub fn apply(&mut self, event: &StreamEvent) -> Vec<SessionSignal> {
        if self.phase.is_terminal() {
            return Vec::new();
        }

        match event {
            StreamEvent::MessageStart { .. } => {
                self.started = true;
                Vec::new()
            }
            StreamEvent::ContentDelta { delta } => {
                self.content.push_str(delta);
                self.phase = SessionPhase::ContentStreaming;
                vec![SessionSignal::ContentChanged]
            }
            StreamEvent::PlanningStart { intent_detected } => {
                self.phase = SessionPhase::Planning;
                let note = match intent_detected {
                    Some(intent) => format!("Detected intent: {}", intent),
                    None => "Planning response".to_string(),
                };
                self.notes.push(note);
                vec![SessionSignal::ContentChanged]
            }
            StreamEvent::ToolsLoadingStart => {
                self.phase = SessionPhase::Planning;
                self.notes.push("Loading tools".to_string());
                vec![SessionSignal::ContentChanged]
            }
            StreamEvent::ToolsLoadingFinished { tool_count } => {
                let note = match tool_count {
                    Some(count) => format!("Loaded {} tools", count),
                    None => "Tools loaded".to_string(),
                };
                self.notes.push(note);
                vec![SessionSignal::ContentChanged]
            }
            StreamEvent::ModelStepStarted { iteration } => {
                self.phase = SessionPhase::ToolLoop;
                self.notes.push(format!("Model step {} started", iteration));
                vec![SessionSignal::ContentChanged]
            }
            StreamEvent::ModelStepFinished {
                iteration,
                has_tool_calls,
            } => {
                let note = if *has_tool_calls {
                    format!("Model step {} requested tools", iteration)
                } else {
                    format!("Model step {} finished", iteration)
                };
                self.notes.push(note);
                vec![SessionSignal::ContentChanged]
            }
            StreamEvent::PlanningFinished { skipped } => {
                let note = if *skipped {
                    "Planning skipped".to_string()
                } else {
                    "Planning finished".to_string()
                };
                self.notes.push(note);
                vec![SessionSignal::ContentChanged]
            }
            StreamEvent::ToolCallStarted {
                tool_name,
                args,
                started_at,
            } => {
                if self.phase == SessionPhase::Planning || self.phase == SessionPhase::Idle {
                    self.phase = SessionPhase::ToolLoop;
                }
                self.ledger.record_started(tool_name, args.as_ref(), *started_at);
                vec![SessionSignal::ContentChanged]
            }
            StreamEvent::ToolCallFinished {
                tool_name,
                outcome,
                duration_ms,
                result_preview,
                error,
            } => {
                self.ledger.record_finished(
                    tool_name,
                    *outcome,
                    *duration_ms,
                    result_preview.as_deref(),
                    error.as_deref(),
                );
                vec![SessionSignal::ContentChanged]
            }
            StreamEvent::ConversationTitleUpdated { .. } => {
                vec![SessionSignal::InvalidateConversations]
            }
            StreamEvent::MessageComplete { .. } | StreamEvent::Done => {
                self.phase = SessionPhase::Completed;
                self.clear_transient();
                vec![
                    SessionSignal::InvalidateMessages,
                    SessionSignal::InvalidateConversations,
                ]
            }
            StreamEvent::AiError { error } => {
                self.phase = SessionPhase::Errored;
                self.error = Some(error.clone());
                self.clear_transient();
                vec![
                    SessionSignal::Error(error.clone()),
                    SessionSignal::InvalidateMessages,
                ]
            }
        }
    }

    /// Record a transport failure. Same terminal handling as an
    /// `ai_error` event, so partial server-side state is re-fetched.
    pub fn fail(&mut self, error: &str) -> Vec<SessionSignal> {
        if self.phase.is_terminal() {
            return Vec::new();
        }
        self.phase = SessionPhase::Errored;
        self.error = Some(error.to_string());
        self.clear_transient();
        vec![
            SessionSignal::Error(error.to_string()),
            SessionSignal::InvalidateMessages,
        ]
    }

    /// Abandon the turn after an explicit disconnect. The server keeps
    /// generating; whatever it persisted shows up on the next refetch.
    pub fn cancel(&mut self) -> Vec<SessionSignal> {
        if self.phase.is_terminal() {
            return Vec::new();
        }
        self.phase = SessionPhase::Cancelled;
        self.clear_transient();
        vec![SessionSignal::InvalidateMessages]
    }

    fn clear_transient(&mut self) {
        self.content.clear();
        self.notes.clear();
        self.ledger.clear();
    }
}
