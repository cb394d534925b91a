//! Persona-scoped chat session.
//!
//! [`ChatSession`] ties one persona to its backend and storage: it restores
//! persisted conversations, hands the sidebar its recency-ordered listing,
//! and drives whole turns, yielding [`TurnUpdate`]s for the presentation
//! layer as content streams in.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chat::turn::CONNECTION_ERROR_NOTICE;
use crate::chat::{Conversation, ConversationStore, Turn, TurnState};
use crate::client::{ChatBackend, ChatRequest};
use crate::persona::Persona;
use crate::storage::Storage;

/// Presentation-layer updates emitted while a turn runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnUpdate {
    /// The turn opened: user message and placeholder are in place.
    Started {
        /// Id of the conversation the turn writes into.
        chat_id: String,
    },
    /// A content delta landed; `text` is the full accumulated value.
    Delta { text: String },
    /// The turn finalized; the conversation carries `title`.
    Completed { title: String },
    /// The turn failed in transport; `notice` replaced the reply.
    Failed { notice: String },
}

/// One persona's chat state and turn driver.
#[derive(Debug, Clone)]
pub struct ChatSession {
    persona: Persona,
    backend: Arc<dyn ChatBackend>,
    storage: Arc<dyn Storage>,
    chats: ConversationStore,
}

impl ChatSession {
    /// Create a session for `persona` over the given backend and storage.
    pub fn new(persona: Persona, backend: Arc<dyn ChatBackend>, storage: Arc<dyn Storage>) -> Self {
        Self {
            persona,
            backend,
            storage,
            chats: ConversationStore::new(),
        }
    }

    /// The persona this session serves.
    #[must_use]
    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// The conversation store backing this session.
    #[must_use]
    pub fn chats(&self) -> &ConversationStore {
        &self.chats
    }

    /// Restore the persisted conversation map, if any.
    ///
    /// A corrupt blob is logged and skipped rather than failing startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn load(&self) -> anyhow::Result<()> {
        if let Some(json) = self.storage.get(&self.persona.chats_key()).await? {
            match self.chats.load_json(&json) {
                Ok(()) => {
                    info!(
                        persona = %self.persona.id,
                        conversations = self.chats.len(),
                        "restored conversation history"
                    );
                }
                Err(err) => {
                    warn!(
                        persona = %self.persona.id,
                        error = %err,
                        "discarding unreadable conversation history"
                    );
                }
            }
        }
        Ok(())
    }

    /// The opaque backend session id, created lazily on first use and
    /// reused across turns.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn session_id(&self) -> anyhow::Result<String> {
        let key = self.persona.session_id_key();
        if let Some(id) = self.storage.get(&key).await? {
            return Ok(id);
        }
        let id = Uuid::new_v4().simple().to_string();
        self.storage.set(&key, &id).await?;
        Ok(id)
    }

    /// Whether the sidebar should be shown (defaults to visible).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn sidebar_visible(&self) -> anyhow::Result<bool> {
        let saved = self.storage.get(&self.persona.sidebar_key()).await?;
        Ok(saved.as_deref() != Some("false"))
    }

    /// Persist the sidebar visibility flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn set_sidebar_visible(&self, visible: bool) -> anyhow::Result<()> {
        self.storage
            .set(&self.persona.sidebar_key(), if visible { "true" } else { "false" })
            .await?;
        Ok(())
    }

    /// Open a fresh conversation seeded with the persona greeting and
    /// return its id.
    #[must_use]
    pub fn new_chat(&self) -> String {
        let mut id = format!("chat_{}", chrono::Utc::now().timestamp_millis());
        if self.chats.contains(&id) {
            id = format!("{id}_{}", Uuid::new_v4().simple());
        }
        self.chats
            .insert(id.clone(), Conversation::with_greeting(&self.persona.greeting));
        id
    }

    /// Remove a conversation and persist the change.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn delete_chat(&self, chat_id: &str) -> anyhow::Result<()> {
        if self.chats.remove(chat_id).is_some() {
            info!(persona = %self.persona.id, chat_id, "conversation deleted");
            self.persist().await?;
        }
        Ok(())
    }

    /// Up to `limit` conversations for the sidebar, most recent first.
    #[must_use]
    pub fn recent_chats(&self, limit: usize) -> Vec<(String, Conversation)> {
        self.chats.recent(limit)
    }

    /// Write the whole conversation map through the storage port.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the storage backend fails.
    pub async fn persist(&self) -> anyhow::Result<()> {
        let json = self.chats.to_json()?;
        self.storage.set(&self.persona.chats_key(), &json).await?;
        Ok(())
    }

    /// Drive one full turn, yielding updates as they happen.
    ///
    /// The generator appends the user message and placeholder, sends the
    /// request, folds decoded frames into the in-flight message in order,
    /// settles the turn exactly once, and persists keyed by the chat id
    /// captured here. If that conversation is deleted mid-stream the
    /// write is skipped instead of resurrecting it.
    pub fn send(&self, chat_id: &str, user_text: &str) -> impl Stream<Item = TurnUpdate> + Send {
        let session = self.clone();
        let chat_id = chat_id.to_string();
        let user_text = user_text.to_string();

        async_stream::stream! {
            if !session.chats.contains(&chat_id) {
                session.chats.insert(
                    chat_id.clone(),
                    Conversation::with_greeting(&session.persona.greeting),
                );
            }
            let Some(mut turn) =
                session.chats.update(&chat_id, |conv| Turn::begin(conv, user_text.clone()))
            else {
                return;
            };
            yield TurnUpdate::Started { chat_id: chat_id.clone() };

            info!(
                persona = %session.persona.id,
                chat_id = %chat_id,
                input_len = user_text.len(),
                "starting turn"
            );

            let request = match session.session_id().await {
                Ok(session_id) => ChatRequest {
                    chat_input: user_text,
                    session_id,
                    source: session.persona.source(),
                },
                Err(err) => {
                    error!(persona = %session.persona.id, error = %err, "session id unavailable");
                    session.settle_failed(&chat_id, &mut turn).await;
                    yield TurnUpdate::Failed { notice: CONNECTION_ERROR_NOTICE.to_string() };
                    return;
                }
            };

            let mut frames = match session.backend.send(request).await {
                Ok(frames) => frames,
                Err(err) => {
                    error!(persona = %session.persona.id, chat_id = %chat_id, error = %err, "request failed");
                    session.settle_failed(&chat_id, &mut turn).await;
                    yield TurnUpdate::Failed { notice: CONNECTION_ERROR_NOTICE.to_string() };
                    return;
                }
            };

            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(frame) => {
                        let before = turn.text().len();
                        if session
                            .chats
                            .update(&chat_id, |conv| turn.on_frame(conv, &frame))
                            .is_none()
                        {
                            warn!(chat_id = %chat_id, "conversation deleted mid-stream, dropping turn");
                            return;
                        }
                        if turn.text().len() > before {
                            yield TurnUpdate::Delta { text: turn.text().to_string() };
                        }
                    }
                    Err(err) => {
                        error!(persona = %session.persona.id, chat_id = %chat_id, error = %err, "stream interrupted");
                        session.settle_failed(&chat_id, &mut turn).await;
                        yield TurnUpdate::Failed { notice: CONNECTION_ERROR_NOTICE.to_string() };
                        return;
                    }
                }
            }

            let Some(title) = session.chats.update(&chat_id, |conv| {
                turn.finish(conv);
                conv.title.clone()
            }) else {
                warn!(chat_id = %chat_id, "conversation deleted mid-stream, dropping turn");
                return;
            };
            debug_assert_eq!(turn.state(), TurnState::Finalized);

            if let Err(err) = session.persist().await {
                error!(persona = %session.persona.id, error = %err, "failed to persist conversations");
            }
            debug!(persona = %session.persona.id, chat_id = %chat_id, title = %title, "turn finalized");
            yield TurnUpdate::Completed { title };
        }
    }

    /// Settle a turn on the failure path and persist what remains.
    async fn settle_failed(&self, chat_id: &str, turn: &mut Turn) {
        if self.chats.update(chat_id, |conv| turn.fail(conv)).is_none() {
            warn!(chat_id = %chat_id, "conversation deleted mid-stream, dropping turn");
            return;
        }
        if let Err(err) = self.persist().await {
            error!(persona = %self.persona.id, error = %err, "failed to persist conversations");
        }
    }
}
