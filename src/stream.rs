//! Streaming connection lifecycle.
//!
//! A [`ConnectionManager`] owns at most one live SSE connection.
//! Opening a stream for a conversation closes any existing connection
//! first, so switching conversations can never leave two readers
//! racing. Events arrive on a single channel tagged with their
//! conversation id; late events for a background conversation are the
//! receiver's problem to route, not the transport's.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::sse::{SseParser, StreamEvent};

/// A message from the streaming transport.
#[derive(Debug)]
pub enum StreamMessage {
    /// A decoded event from the stream
    Event {
        conversation_id: String,
        event: StreamEvent,
    },
    /// The connection failed; the stream is over
    TransportError {
        conversation_id: String,
        error: String,
    },
    /// The server closed the stream normally
    Closed { conversation_id: String },
}

/// Owns the single live SSE connection.
#[derive(Debug)]
pub struct ConnectionManager {
    base_url: String,
    client: reqwest::Client,
    auth: AuthContext,
    tx: mpsc::UnboundedSender<StreamMessage>,
    current: Option<(String, JoinHandle<()>)>,
}

impl ConnectionManager {
    /// Create a manager and the receiving end of its event channel.
    pub fn new(
        base_url: impl Into<String>,
        client: reqwest::Client,
        auth: AuthContext,
    ) -> (Self, mpsc::UnboundedReceiver<StreamMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                base_url: base_url.into(),
                client,
                auth,
                tx,
                current: None,
            },
            rx,
        )
    }

    /// The conversation the live connection belongs to, if any.
    pub fn active_conversation(&self) -> Option<&str> {
        self.current.as_ref().map(|(id, _)| id.as_str())
    }

    /// Open the stream for a conversation, closing any prior
    /// connection first.
    ///
    /// The EventSource-style transport cannot set headers, so the
    /// bearer token travels as a query parameter.
    pub fn open(&mut self, conversation_id: &str, user_message_id: &str) -> Result<(), ApiError> {
        let token = self.auth.access_token().ok_or(ApiError::NotAuthenticated)?;

        self.close();

        let url = format!(
            "{}/conversations/{}/stream?userMessageId={}&token={}",
            self.base_url,
            urlencoding::encode(conversation_id),
            urlencoding::encode(user_message_id),
            urlencoding::encode(&token),
        );

        let client = self.client.clone();
        let tx = self.tx.clone();
        let conversation = conversation_id.to_string();
        let handle = tokio::spawn(async move {
            run_stream(client, url, conversation, tx).await;
        });
        self.current = Some((conversation_id.to_string(), handle));
        Ok(())
    }

    /// Close the live connection, if any. Idempotent. The server side
    /// treats the disconnect as cancellation of delivery, not of
    /// generation.
    pub fn close(&mut self) {
        if let Some((conversation_id, handle)) = self.current.take() {
            debug!(conversation_id = %conversation_id, "closing stream connection");
            handle.abort();
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

/// Read one SSE response to completion, forwarding decoded events.
async fn run_stream(
    client: reqwest::Client,
    url: String,
    conversation_id: String,
    tx: mpsc::UnboundedSender<StreamMessage>,
) {
    let response = match client
        .get(&url)
        .header("Accept", "text/event-stream")
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send(StreamMessage::TransportError {
                conversation_id,
                error: e.to_string(),
            });
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let _ = tx.send(StreamMessage::TransportError {
            conversation_id,
            error: format!("stream request failed ({}): {}", status, body),
        });
        return;
    }

    let mut bytes_stream = response.bytes_stream();
    let mut parser = SseParser::new();
    // Byte buffer: a UTF-8 character can be split across transport
    // chunks, so decoding happens per complete line, never per chunk
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        // Drain complete lines from the buffer first
        while let Some(line) = next_line(&mut buffer) {
            match parser.feed_line(&line) {
                Ok(Some(event)) => {
                    let done = event == StreamEvent::Done;
                    let _ = tx.send(StreamMessage::Event {
                        conversation_id: conversation_id.clone(),
                        event,
                    });
                    if done {
                        let _ = tx.send(StreamMessage::Closed { conversation_id });
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    // A bad frame never tears down the stream
                    warn!(
                        conversation_id = %conversation_id,
                        error = %e,
                        "dropping malformed SSE frame"
                    );
                }
            }
        }

        match bytes_stream.next().await {
            Some(Ok(chunk)) => {
                buffer.extend_from_slice(&chunk);
            }
            Some(Err(e)) => {
                let _ = tx.send(StreamMessage::TransportError {
                    conversation_id,
                    error: e.to_string(),
                });
                return;
            }
            None => {
                // Flush a trailing line without a final newline
                if !buffer.is_empty() {
                    buffer.push(b'\n');
                    if let Some(line) = next_line(&mut buffer) {
                        if let Ok(Some(event)) = parser.feed_line(&line) {
                            let _ = tx.send(StreamMessage::Event {
                                conversation_id: conversation_id.clone(),
                                event,
                            });
                        }
                    }
                }
                let _ = tx.send(StreamMessage::Closed { conversation_id });
                return;
            }
        }
    }
}

/// Pop the next complete line off the buffer, stripping the newline and
/// an optional carriage return. Returns `None` until a full line is
/// buffered.
fn next_line(buffer: &mut Vec<u8>) -> Option<String> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authed_context() -> AuthContext {
        let ctx = AuthContext::in_memory();
        ctx.set_tokens("test-token".to_string(), None, Some(3600));
        ctx
    }

    #[test]
    fn test_next_line_waits_for_newline() {
        let mut buffer = b"event: done".to_vec();
        assert_eq!(next_line(&mut buffer), None);
        buffer.extend_from_slice(b"\ndata: {}\n");
        assert_eq!(next_line(&mut buffer).as_deref(), Some("event: done"));
        assert_eq!(next_line(&mut buffer).as_deref(), Some("data: {}"));
        assert_eq!(next_line(&mut buffer), None);
    }

    #[test]
    fn test_next_line_strips_carriage_return() {
        let mut buffer = b"data: {}\r\n".to_vec();
        assert_eq!(next_line(&mut buffer).as_deref(), Some("data: {}"));
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        // Every possible chunk boundary, including ones falling inside
        // the two-byte "é", must reassemble the line intact
        let frame = "data: {\"delta\": \"caché hit\"}\n".as_bytes();
        for split in 1..frame.len() {
            let mut buffer: Vec<u8> = Vec::new();
            buffer.extend_from_slice(&frame[..split]);
            let mut lines = Vec::new();
            while let Some(line) = next_line(&mut buffer) {
                lines.push(line);
            }
            buffer.extend_from_slice(&frame[split..]);
            while let Some(line) = next_line(&mut buffer) {
                lines.push(line);
            }
            assert_eq!(lines, vec!["data: {\"delta\": \"caché hit\"}"]);
        }
    }

    #[tokio::test]
    async fn test_open_requires_token() {
        let (mut manager, _rx) = ConnectionManager::new(
            "http://localhost:1",
            reqwest::Client::new(),
            AuthContext::in_memory(),
        );
        let err = manager.open("c1", "m1").unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
        assert!(manager.active_conversation().is_none());
    }

    #[tokio::test]
    async fn test_at_most_one_connection() {
        let (mut manager, _rx) = ConnectionManager::new(
            "http://localhost:1",
            reqwest::Client::new(),
            authed_context(),
        );
        manager.open("c1", "m1").unwrap();
        assert_eq!(manager.active_conversation(), Some("c1"));

        // Opening a second conversation replaces the first connection
        manager.open("c2", "m2").unwrap();
        assert_eq!(manager.active_conversation(), Some("c2"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut manager, _rx) = ConnectionManager::new(
            "http://localhost:1",
            reqwest::Client::new(),
            authed_context(),
        );
        manager.open("c1", "m1").unwrap();
        manager.close();
        assert!(manager.active_conversation().is_none());
        manager.close();
        assert!(manager.active_conversation().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_transport_error() {
        let (mut manager, mut rx) = ConnectionManager::new(
            // Port 1 is never listening
            "http://127.0.0.1:1",
            reqwest::Client::new(),
            authed_context(),
        );
        manager.open("c1", "m1").unwrap();

        match rx.recv().await.unwrap() {
            StreamMessage::TransportError {
                conversation_id, ..
            } => assert_eq!(conversation_id, "c1"),
            other => panic!("expected TransportError, got {:?}", other),
        }
    }
}
