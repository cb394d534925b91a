//! Protocol events carried by decoded frames.

/// One decoded protocol unit from the webhook stream.
///
/// Frames that are not valid JSON, or whose shape is not recognized, parse
/// to `None` and are dropped without interrupting the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A content delta to append to the in-flight assistant message.
    Delta(String),
    /// Stream completion, optionally carrying a backend-derived title.
    End {
        /// Conversation title supplied by the backend, if any.
        title: Option<String>,
    },
}

impl StreamEvent {
    /// Parse one raw frame into an event.
    ///
    /// Recognized shapes are `{"type":"item","content":<string>}` and
    /// `{"type":"end"}` with an optional `title` string. Anything else,
    /// including malformed JSON, yields `None`.
    #[must_use]
    pub fn parse(frame: &str) -> Option<Self> {
        let v: serde_json::Value = serde_json::from_str(frame).ok()?;
        match v.get("type").and_then(|t| t.as_str())? {
            "item" => {
                let content = v.get("content")?.as_str()?;
                Some(Self::Delta(content.to_string()))
            }
            "end" => {
                let title = v
                    .get("title")
                    .and_then(|t| t.as_str())
                    .map(ToString::to_string);
                Some(Self::End { title })
            }
            _ => None,
        }
    }
}
