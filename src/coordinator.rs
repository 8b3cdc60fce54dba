//! Chat coordinator
//!
//! Glues the pieces together for a UI: the REST client, the single
//! streaming connection, the per-conversation session registry, and
//! the conversation cache. The coordinator routes stream messages to
//! the right session, turns session signals into cache invalidations,
//! and reports UI effects only for the conversation the user is
//! looking at; background turns accumulate silently.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::ConversationCache;
use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::Message;
use crate::session::{SessionSignal, StreamingSession};
use crate::stream::{ConnectionManager, StreamMessage};

/// What the UI should do after a stream message was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEffect {
    /// Streaming content for the visible conversation changed
    ScrollToBottom,
    /// Show an error to the user
    Notify(String),
    /// The visible message list is stale and should be refetched
    RefreshMessages,
    /// The conversation list is stale and should be refetched
    RefreshConversations,
}

/// Errors surfaced by coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// A send is still outstanding for this conversation
    #[error("a send is already in progress for this conversation")]
    SendInProgress,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Orchestrates one user's chat surface.
pub struct ChatCoordinator {
    api: ApiClient,
    connections: ConnectionManager,
    cache: ConversationCache,
    /// Session per conversation; retained after terminal phases so
    /// late events for old turns land somewhere harmless
    sessions: HashMap<String, StreamingSession>,
    active: Option<String>,
    /// Conversations with an outstanding send (input disabled)
    sending: HashSet<String>,
}

impl ChatCoordinator {
    /// Create a coordinator plus the stream-message receiver the app
    /// loop must drain into [`Self::handle_stream_message`].
    pub fn new(api: ApiClient) -> (Self, mpsc::UnboundedReceiver<StreamMessage>) {
        let (connections, rx) = ConnectionManager::new(
            api.base_url().to_string(),
            api.http_client().clone(),
            api.auth().clone(),
        );
        (
            Self {
                api,
                connections,
                cache: ConversationCache::new(),
                sessions: HashMap::new(),
                active: None,
                sending: HashSet::new(),
            },
            rx,
        )
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &ConversationCache {
        &self.cache
    }

    pub fn active_conversation(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The streaming session for a conversation, if one exists.
    pub fn session(&self, conversation_id: &str) -> Option<&StreamingSession> {
        self.sessions.get(conversation_id)
    }

    /// Whether a turn is underway for a conversation (list badges).
    pub fn is_generating(&self, conversation_id: &str) -> bool {
        self.sessions
            .get(conversation_id)
            .map(|s| s.is_generating())
            .unwrap_or(false)
    }

    /// Whether input should be disabled for a conversation.
    pub fn is_sending(&self, conversation_id: &str) -> bool {
        self.sending.contains(conversation_id)
    }

    /// Switch the visible conversation.
    ///
    /// The previous conversation's connection is closed, but its
    /// session keeps the accumulated turn state: the server keeps
    /// generating, events already queued on the channel still apply,
    /// and switching back shows the turn as it stands.
    pub fn set_active_conversation(&mut self, conversation_id: Option<&str>) {
        if self.active.as_deref() == conversation_id {
            return;
        }

        if let Some(previous) = self.active.take() {
            if self.connections.active_conversation() == Some(previous.as_str()) {
                self.connections.close();
            }
        }

        self.active = conversation_id.map(String::from);
    }

    /// Send a user message and open the response stream.
    ///
    /// Records an optimistic pending copy immediately; on a failed
    /// POST the pending copy is rolled back and the error returned.
    pub async fn send_message(
        &mut self,
        conversation_id: &str,
        content: &str,
    ) -> Result<Message, CoordinatorError> {
        if self.sending.contains(conversation_id) {
            return Err(CoordinatorError::SendInProgress);
        }
        self.sending.insert(conversation_id.to_string());

        let pending = Message::pending_user(conversation_id, content);
        let pending_id = pending.id.clone();
        self.cache.push_pending(pending);

        let persisted = match self.api.send_message(conversation_id, content).await {
            Ok(message) => message,
            Err(e) => {
                self.cache.remove_pending(conversation_id, &pending_id);
                self.sending.remove(conversation_id);
                return Err(e.into());
            }
        };

        // Fresh session for the new turn
        self.sessions
            .insert(conversation_id.to_string(), StreamingSession::new());
        self.cache.invalidate_messages(conversation_id);

        if let Err(e) = self.connections.open(conversation_id, &persisted.id) {
            self.sending.remove(conversation_id);
            return Err(e.into());
        }
        Ok(persisted)
    }

    /// Handle one message from the streaming transport.
    ///
    /// Returns the UI effects for the visible conversation; events for
    /// background conversations update state silently.
    pub fn handle_stream_message(&mut self, message: StreamMessage) -> Vec<UiEffect> {
        match message {
            StreamMessage::Event {
                conversation_id,
                event,
            } => {
                let session = self.sessions.entry(conversation_id.clone()).or_default();
                let signals = session.apply(&event);
                self.process_signals(&conversation_id, signals)
            }
            StreamMessage::TransportError {
                conversation_id,
                error,
            } => {
                debug!(conversation_id = %conversation_id, error = %error, "stream transport error");
                let session = self.sessions.entry(conversation_id.clone()).or_default();
                let signals = session.fail(&error);
                self.process_signals(&conversation_id, signals)
            }
            StreamMessage::Closed { conversation_id } => {
                // A close without a terminal event means the server
                // went away mid-turn
                let session = self.sessions.entry(conversation_id.clone()).or_default();
                let signals = if session.is_generating() {
                    session.fail("stream closed unexpectedly")
                } else {
                    Vec::new()
                };
                self.process_signals(&conversation_id, signals)
            }
        }
    }

    fn process_signals(
        &mut self,
        conversation_id: &str,
        signals: Vec<SessionSignal>,
    ) -> Vec<UiEffect> {
        let is_active = self.active.as_deref() == Some(conversation_id);
        let mut effects = Vec::new();

        for signal in &signals {
            self.apply_signal(conversation_id, signal);
            if !is_active {
                continue;
            }
            match signal {
                SessionSignal::ContentChanged => {
                    if !effects.contains(&UiEffect::ScrollToBottom) {
                        effects.push(UiEffect::ScrollToBottom);
                    }
                }
                SessionSignal::InvalidateMessages => effects.push(UiEffect::RefreshMessages),
                SessionSignal::InvalidateConversations => {
                    effects.push(UiEffect::RefreshConversations)
                }
                SessionSignal::Error(text) => effects.push(UiEffect::Notify(text.clone())),
            }
        }

        // The turn ended, input re-enables
        if self
            .sessions
            .get(conversation_id)
            .map(|s| s.phase().is_terminal())
            .unwrap_or(false)
        {
            self.sending.remove(conversation_id);
        }
        effects
    }

    /// Cache-side effect of one signal, regardless of visibility.
    fn apply_signal(&mut self, conversation_id: &str, signal: &SessionSignal) {
        match signal {
            SessionSignal::InvalidateMessages => self.cache.invalidate_messages(conversation_id),
            SessionSignal::InvalidateConversations => self.cache.invalidate_conversations(),
            SessionSignal::ContentChanged | SessionSignal::Error(_) => {}
        }
    }

    /// Refetch the conversation list into the cache.
    pub async fn refresh_conversations(&mut self, page: u32, page_size: u32) -> Result<(), ApiError> {
        let listing = self.api.list_conversations(page, page_size).await?;
        self.cache.set_conversations(listing.data);
        Ok(())
    }

    /// Refetch a conversation's messages into the cache. Pending
    /// copies that now exist server-side are superseded.
    pub async fn refresh_messages(
        &mut self,
        conversation_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<(), ApiError> {
        let listing = self
            .api
            .list_messages(conversation_id, page, page_size)
            .await?;
        self.cache.set_messages(conversation_id, listing.data);
        Ok(())
    }

    /// Rename a conversation and mark the list stale.
    pub async fn rename_conversation(
        &mut self,
        conversation_id: &str,
        title: &str,
    ) -> Result<(), ApiError> {
        self.api.rename_conversation(conversation_id, title).await?;
        self.cache.invalidate_conversations();
        Ok(())
    }

    /// Delete a conversation, dropping its connection and local state.
    pub async fn delete_conversation(&mut self, conversation_id: &str) -> Result<(), ApiError> {
        if self.connections.active_conversation() == Some(conversation_id) {
            self.connections.close();
        }
        self.api.delete_conversation(conversation_id).await?;
        self.sessions.remove(conversation_id);
        self.sending.remove(conversation_id);
        self.cache.remove_conversation(conversation_id);
        if self.active.as_deref() == Some(conversation_id) {
            self.active = None;
        }
        Ok(())
    }

    /// Tear down the streaming connection.
    pub fn close(&mut self) {
        self.connections.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthContext;
    use crate::session::SessionPhase;
    use crate::sse::StreamEvent;

    fn coordinator() -> ChatCoordinator {
        let auth = AuthContext::in_memory();
        auth.set_tokens("token".to_string(), None, Some(3600));
        let api = ApiClient::new("http://localhost:1", auth);
        ChatCoordinator::new(api).0
    }

    fn event(conversation_id: &str, event: StreamEvent) -> StreamMessage {
        StreamMessage::Event {
            conversation_id: conversation_id.to_string(),
            event,
        }
    }

    fn delta(conversation_id: &str, text: &str) -> StreamMessage {
        event(
            conversation_id,
            StreamEvent::ContentDelta {
                delta: text.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_active_conversation_gets_effects() {
        let mut coordinator = coordinator();
        coordinator.set_active_conversation(Some("c1"));

        coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::MessageStart { message_id: None },
        ));
        let effects = coordinator.handle_stream_message(delta("c1", "hello"));
        assert_eq!(effects, vec![UiEffect::ScrollToBottom]);
        assert_eq!(coordinator.session("c1").unwrap().content(), "hello");
    }

    #[tokio::test]
    async fn test_background_conversation_is_silent() {
        let mut coordinator = coordinator();
        coordinator.set_active_conversation(Some("c1"));

        // Events for c2 update its session but produce no effects
        coordinator.handle_stream_message(event(
            "c2",
            StreamEvent::MessageStart { message_id: None },
        ));
        let effects = coordinator.handle_stream_message(delta("c2", "background text"));
        assert!(effects.is_empty());
        assert!(coordinator.is_generating("c2"));
        assert_eq!(
            coordinator.session("c2").unwrap().content(),
            "background text"
        );
    }

    #[tokio::test]
    async fn test_background_terminal_still_invalidates_cache() {
        let mut coordinator = coordinator();
        coordinator.set_active_conversation(Some("c1"));
        coordinator.cache.set_conversations(vec![]);
        coordinator.cache.set_messages("c2", vec![]);

        coordinator.handle_stream_message(event(
            "c2",
            StreamEvent::MessageStart { message_id: None },
        ));
        let effects = coordinator.handle_stream_message(event(
            "c2",
            StreamEvent::MessageComplete { message_id: None },
        ));
        // Silent for the UI, but the mirror knows it is stale
        assert!(effects.is_empty());
        assert!(coordinator.cache().messages_stale("c2"));
        assert!(coordinator.cache().conversations_stale());
    }

    #[tokio::test]
    async fn test_terminal_event_produces_refresh_effects() {
        let mut coordinator = coordinator();
        coordinator.set_active_conversation(Some("c1"));

        coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::MessageStart { message_id: None },
        ));
        coordinator.handle_stream_message(delta("c1", "done."));
        let effects = coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::MessageComplete { message_id: None },
        ));
        assert_eq!(
            effects,
            vec![UiEffect::RefreshMessages, UiEffect::RefreshConversations]
        );

        // The trailing done is absorbed without further effects
        let effects = coordinator.handle_stream_message(event("c1", StreamEvent::Done));
        assert!(effects.is_empty());
    }

    #[tokio::test]
    async fn test_error_notifies_active_conversation() {
        let mut coordinator = coordinator();
        coordinator.set_active_conversation(Some("c1"));
        coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::MessageStart { message_id: None },
        ));

        let effects = coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::AiError {
                error: "model unavailable".to_string(),
            },
        ));
        assert_eq!(
            effects,
            vec![
                UiEffect::Notify("model unavailable".to_string()),
                UiEffect::RefreshMessages
            ]
        );
        assert_eq!(
            coordinator.session("c1").unwrap().phase(),
            SessionPhase::Errored
        );
    }

    #[tokio::test]
    async fn test_transport_error_fails_session() {
        let mut coordinator = coordinator();
        coordinator.set_active_conversation(Some("c1"));
        coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::MessageStart { message_id: None },
        ));

        let effects = coordinator.handle_stream_message(StreamMessage::TransportError {
            conversation_id: "c1".to_string(),
            error: "connection reset".to_string(),
        });
        assert!(effects.contains(&UiEffect::Notify("connection reset".to_string())));
        assert!(!coordinator.is_generating("c1"));
    }

    #[tokio::test]
    async fn test_unexpected_close_mid_turn() {
        let mut coordinator = coordinator();
        coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::MessageStart { message_id: None },
        ));
        assert!(coordinator.is_generating("c1"));

        coordinator.handle_stream_message(StreamMessage::Closed {
            conversation_id: "c1".to_string(),
        });
        assert!(!coordinator.is_generating("c1"));
        assert_eq!(
            coordinator.session("c1").unwrap().phase(),
            SessionPhase::Errored
        );
    }

    #[tokio::test]
    async fn test_close_after_terminal_is_quiet() {
        let mut coordinator = coordinator();
        coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::MessageStart { message_id: None },
        ));
        coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::MessageComplete { message_id: None },
        ));

        let effects = coordinator.handle_stream_message(StreamMessage::Closed {
            conversation_id: "c1".to_string(),
        });
        assert!(effects.is_empty());
        assert_eq!(
            coordinator.session("c1").unwrap().phase(),
            SessionPhase::Completed
        );
    }

    #[tokio::test]
    async fn test_switch_away_keeps_live_session_state() {
        let mut coordinator = coordinator();
        coordinator.set_active_conversation(Some("c1"));
        coordinator.connections.open("c1", "m1").unwrap();
        coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::MessageStart { message_id: None },
        ));
        coordinator.handle_stream_message(delta("c1", "P99 is 45ms."));

        // Switching away closes the connection but not the session
        coordinator.set_active_conversation(Some("c2"));
        assert!(coordinator.connections.active_conversation().is_none());
        assert!(coordinator.is_generating("c1"));

        coordinator.set_active_conversation(Some("c1"));
        assert_eq!(coordinator.session("c1").unwrap().content(), "P99 is 45ms.");

        // Events already queued before the close still apply
        let effects = coordinator.handle_stream_message(delta("c1", " Confirmed."));
        assert_eq!(effects, vec![UiEffect::ScrollToBottom]);
        assert_eq!(
            coordinator.session("c1").unwrap().content(),
            "P99 is 45ms. Confirmed."
        );
    }

    #[tokio::test]
    async fn test_switch_back_shows_session_state() {
        let mut coordinator = coordinator();
        coordinator.set_active_conversation(Some("c1"));
        coordinator.handle_stream_message(event(
            "c2",
            StreamEvent::MessageStart { message_id: None },
        ));
        coordinator.handle_stream_message(delta("c2", "still going"));

        // Switching to c2 exposes its accumulated session
        coordinator.set_active_conversation(Some("c2"));
        assert_eq!(coordinator.session("c2").unwrap().content(), "still going");
        let effects = coordinator.handle_stream_message(delta("c2", "..."));
        assert_eq!(effects, vec![UiEffect::ScrollToBottom]);
    }

    #[tokio::test]
    async fn test_title_update_refreshes_conversations() {
        let mut coordinator = coordinator();
        coordinator.set_active_conversation(Some("c1"));
        coordinator.cache.set_conversations(vec![]);
        coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::MessageStart { message_id: None },
        ));

        let effects = coordinator.handle_stream_message(event(
            "c1",
            StreamEvent::ConversationTitleUpdated {
                conversation_id: "c1".to_string(),
            },
        ));
        assert_eq!(effects, vec![UiEffect::RefreshConversations]);
        assert!(coordinator.cache().conversations_stale());
    }
}
