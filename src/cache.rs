//! Client-side mirror of server conversation state.
//!
//! The server is the source of truth; this cache is a read-through
//! mirror with explicit staleness. Entries are only ever replaced
//! wholesale by a refetch or marked stale by an invalidation, so a
//! reader always observes a fully-prior or fully-refreshed snapshot,
//! never a partial merge.

use std::collections::HashMap;

use crate::models::{Conversation, Message};

/// A cached value plus its staleness flag.
#[derive(Debug, Clone)]
pub struct CachedEntry<T> {
    /// Cached value
    pub value: T,
    /// Whether an invalidation has landed since the last refetch
    pub stale: bool,
}

impl<T> CachedEntry<T> {
    /// Create a fresh entry.
    pub fn new(value: T) -> Self {
        Self {
            value,
            stale: false,
        }
    }
}

/// Mirror of the conversation list and per-conversation message lists.
#[derive(Debug, Default)]
pub struct ConversationCache {
    conversations: Option<CachedEntry<Vec<Conversation>>>,
    messages: HashMap<String, CachedEntry<Vec<Message>>>,
    /// Optimistic user messages recorded at send time, keyed by
    /// conversation, shown until the persisted copy arrives
    pending: HashMap<String, Vec<Message>>,
}

impl ConversationCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached conversation list, if any (possibly stale).
    pub fn conversations(&self) -> Option<&[Conversation]> {
        self.conversations.as_ref().map(|e| e.value.as_slice())
    }

    /// Whether the conversation list needs a refetch.
    pub fn conversations_stale(&self) -> bool {
        self.conversations.as_ref().map(|e| e.stale).unwrap_or(true)
    }

    /// Replace the conversation list after a refetch.
    pub fn set_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = Some(CachedEntry::new(conversations));
    }

    /// Mark the conversation list stale.
    pub fn invalidate_conversations(&mut self) {
        if let Some(entry) = &mut self.conversations {
            entry.stale = true;
        }
    }

    /// Cached messages for a conversation, with any optimistic pending
    /// messages appended. A conversation that has never been fetched
    /// but has a pending send still shows that pending copy.
    pub fn messages(&self, conversation_id: &str) -> Option<Vec<&Message>> {
        let cached = self.messages.get(conversation_id);
        let pending = self.pending.get(conversation_id);
        if cached.is_none() && pending.is_none() {
            return None;
        }

        let mut all: Vec<&Message> = cached
            .map(|entry| entry.value.iter().collect())
            .unwrap_or_default();
        if let Some(pending) = pending {
            // Pending copies already persisted by the server are
            // superseded by their stored counterpart
            for msg in pending {
                let persisted = cached.is_some_and(|entry| {
                    entry
                        .value
                        .iter()
                        .any(|m| m.sender_type == msg.sender_type && m.content == msg.content)
                });
                if !persisted {
                    all.push(msg);
                }
            }
        }
        Some(all)
    }

    /// Whether a conversation's message list needs a refetch.
    pub fn messages_stale(&self, conversation_id: &str) -> bool {
        self.messages
            .get(conversation_id)
            .map(|e| e.stale)
            .unwrap_or(true)
    }

    /// Replace a conversation's message list after a refetch. Pending
    /// messages now present in the persisted list are dropped.
    pub fn set_messages(&mut self, conversation_id: &str, messages: Vec<Message>) {
        if let Some(pending) = self.pending.get_mut(conversation_id) {
            pending.retain(|p| {
                !messages
                    .iter()
                    .any(|m| m.sender_type == p.sender_type && m.content == p.content)
            });
            if pending.is_empty() {
                self.pending.remove(conversation_id);
            }
        }
        self.messages
            .insert(conversation_id.to_string(), CachedEntry::new(messages));
    }

    /// Mark a conversation's message list stale.
    pub fn invalidate_messages(&mut self, conversation_id: &str) {
        if let Some(entry) = self.messages.get_mut(conversation_id) {
            entry.stale = true;
        }
    }

    /// Record an optimistic pending message at send time.
    pub fn push_pending(&mut self, message: Message) {
        self.pending
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message);
    }

    /// Drop a pending message after a failed send (rollback).
    pub fn remove_pending(&mut self, conversation_id: &str, message_id: &str) {
        if let Some(pending) = self.pending.get_mut(conversation_id) {
            pending.retain(|m| m.id != message_id);
            if pending.is_empty() {
                self.pending.remove(conversation_id);
            }
        }
    }

    /// Drop all cached state for a conversation (after delete).
    pub fn remove_conversation(&mut self, conversation_id: &str) {
        self.messages.remove(conversation_id);
        self.pending.remove(conversation_id);
        self.invalidate_conversations();
    }
}
