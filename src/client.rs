//! Webhook backend driver.
//!
//! This module implements the [`ChatBackend`] trait for the n8n-style
//! automation webhook: one HTTP POST per turn, answered with a streamed
//! body in either SSE or line-delimited framing.

use async_trait::async_trait;
use futures::stream::BoxStream;
use reqwest::header::ACCEPT;

use crate::persona::Persona;
use crate::stream::frame_stream;

/// One outbound chat turn.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The user's message text.
    pub chat_input: String,
    /// Opaque per-persona session identifier, reused across turns.
    pub session_id: String,
    /// Persona source tag carried in the request metadata.
    pub source: String,
}

/// Transport seam for sending a turn and receiving raw frames.
///
/// Implementations return a lazy stream of decoded frame strings; frame
/// interpretation stays with the caller.
#[async_trait]
pub trait ChatBackend: Send + Sync + std::fmt::Debug {
    /// Send one turn and stream back raw frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers with a
    /// non-success status.
    async fn send(&self, req: ChatRequest)
    -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>>;
}

/// Backend driver for the webhook automation endpoint.
#[derive(Clone)]
pub struct WebhookBackend {
    http: reqwest::Client,
    endpoint: String,
}

impl std::fmt::Debug for WebhookBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookBackend")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl WebhookBackend {
    /// Create a backend for the given endpoint URL.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Backend pointed at a persona's configured endpoint.
    #[must_use]
    pub fn for_persona(persona: &Persona) -> Self {
        Self::new(persona.endpoint.clone())
    }
}

#[async_trait]
impl ChatBackend for WebhookBackend {
    async fn send(
        &self,
        req: ChatRequest,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
        let body = serde_json::json!({
            "action": "sendMessage",
            "chatInput": req.chat_input,
            "sessionId": req.session_id,
            "metadata": { "source": req.source }
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(Box::pin(frame_stream(resp.bytes_stream())))
    }
}
