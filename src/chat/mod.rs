//! Conversation data model and in-memory store.
//!
//! A [`Conversation`] is an ordered, append-only sequence of
//! [`ChatMessage`]s plus a recency timestamp and a derived title. The
//! [`ConversationStore`] maps opaque chat ids to conversations and backs
//! the sidebar listing; the whole map round-trips through JSON for the
//! storage port.

pub mod turn;

pub use turn::{Turn, TurnState};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

/// Title shown before one can be derived from the exchange.
pub const DEFAULT_TITLE: &str = "Nuova Conversazione";

/// Derived titles are cut to this many characters before the ellipsis.
const TITLE_MAX_CHARS: usize = 40;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The persona's assistant side.
    Ai,
    /// The human side.
    User,
}

/// Lifecycle of a message within a turn.
///
/// The transient states exist only on the single in-flight assistant
/// message; everything persisted is `Final` or `Error`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageState {
    /// Placeholder appended at send time, before any content arrived.
    Pending,
    /// Receiving content deltas.
    Streaming,
    /// Completed normally (including the no-response notice).
    #[default]
    Final,
    /// Replaced by the connection-error notice.
    Error,
}

/// One chat turn's worth of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Accumulated content; grows monotonically while streaming and is
    /// immutable once the turn terminates.
    pub text: String,
    pub sender: Sender,
    /// Display timestamp; empty until the message is finalized.
    pub time: String,
    #[serde(default)]
    pub state: MessageState,
}

impl ChatMessage {
    /// A finalized user message stamped with the current time.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            time: display_time(),
            state: MessageState::Final,
        }
    }

    /// A finalized assistant message (greetings, seeded history).
    #[must_use]
    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Ai,
            time: display_time(),
            state: MessageState::Final,
        }
    }

    /// The empty placeholder for an assistant reply being awaited.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            text: String::new(),
            sender: Sender::Ai,
            time: String::new(),
            state: MessageState::Pending,
        }
    }

    /// Whether this message is the turn's in-flight assistant message.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.sender == Sender::Ai
            && matches!(self.state, MessageState::Pending | MessageState::Streaming)
    }
}

/// Current wall-clock time as the display string stamped on messages.
#[must_use]
pub fn display_time() -> String {
    Local::now().format("%H:%M").to_string()
}

/// An ordered message sequence with sidebar metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub messages: Vec<ChatMessage>,
    /// Refreshed on every mutation; drives the recency ordering.
    pub last_updated: DateTime<Utc>,
    pub title: String,
}

impl Conversation {
    /// A fresh conversation opened by the persona's greeting.
    #[must_use]
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::ai(greeting)],
            last_updated: Utc::now(),
            title: DEFAULT_TITLE.to_string(),
        }
    }

    /// Append a message and refresh the recency timestamp.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.touch();
    }

    /// Mutable access to the in-flight assistant message, if one exists.
    /// By invariant it is always the last message of the sequence.
    pub fn in_flight_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages.last_mut().filter(|m| m.is_in_flight())
    }

    /// Refresh `last_updated` to now.
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Derive the sidebar title for this conversation.
    ///
    /// A backend-supplied `hint` wins verbatim. Otherwise the second user
    /// message (skipping the opening turn) when two or more exist, else the
    /// sole user message, truncated to 40 characters with an ellipsis; with
    /// no user messages the default placeholder stays.
    #[must_use]
    pub fn derive_title(&self, hint: Option<String>) -> String {
        if let Some(title) = hint {
            return title;
        }
        let user_messages: Vec<&ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.sender == Sender::User)
            .collect();
        match user_messages.as_slice() {
            [] => DEFAULT_TITLE.to_string(),
            [only] => truncate_title(&only.text),
            [_, second, ..] => truncate_title(&second.text),
        }
    }
}

/// Cut to [`TITLE_MAX_CHARS`] characters and append an ellipsis.
fn truncate_title(text: &str) -> String {
    let mut title: String = text.chars().take(TITLE_MAX_CHARS).collect();
    title.push_str("...");
    title
}

/// Thread-safe map of chat id to [`Conversation`].
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    inner: Arc<RwLock<HashMap<String, Conversation>>>,
}

impl ConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a conversation under `id`.
    pub fn insert(&self, id: impl Into<String>, conversation: Conversation) {
        let mut guard = self.inner.write().unwrap();
        guard.insert(id.into(), conversation);
    }

    /// Snapshot of the conversation under `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Conversation> {
        let guard = self.inner.read().unwrap();
        guard.get(id).cloned()
    }

    /// Whether `id` currently exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        let guard = self.inner.read().unwrap();
        guard.contains_key(id)
    }

    /// Mutate the conversation under `id`, if it exists, under the lock.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Conversation) -> R) -> Option<R> {
        let mut guard = self.inner.write().unwrap();
        guard.get_mut(id).map(f)
    }

    /// Remove the conversation under `id`.
    pub fn remove(&self, id: &str) -> Option<Conversation> {
        let mut guard = self.inner.write().unwrap();
        guard.remove(id)
    }

    /// All chat ids, in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.inner.read().unwrap().keys().cloned().collect()
    }

    /// Up to `limit` conversations, most recently updated first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<(String, Conversation)> {
        let guard = self.inner.read().unwrap();
        let mut entries: Vec<(String, Conversation)> = guard
            .iter()
            .map(|(id, conv)| (id.clone(), conv.clone()))
            .collect();
        entries.sort_by(|a, b| b.1.last_updated.cmp(&a.1.last_updated));
        entries.truncate(limit);
        entries
    }

    /// Number of conversations held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Whether the store holds no conversations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize the whole map for the storage port.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let guard = self.inner.read().unwrap();
        serde_json::to_string(&*guard)
    }

    /// Replace the whole map from its serialized form.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` does not deserialize to a conversation map.
    pub fn load_json(&self, json: &str) -> serde_json::Result<()> {
        let map: HashMap<String, Conversation> = serde_json::from_str(json)?;
        let mut guard = self.inner.write().unwrap();
        *guard = map;
        Ok(())
    }
}
