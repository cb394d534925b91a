//! Per-turn state machine for a streamed assistant reply.
//!
//! One [`Turn`] drives a single user-message-in, assistant-message-out
//! exchange: it appends the user message and the pending assistant
//! placeholder, folds decoded frames into the in-flight message, and
//! settles the conversation exactly once on completion or failure.

use tracing::debug;

use super::{ChatMessage, Conversation, display_time};
use crate::stream::StreamEvent;

/// Shown when the stream completed without a single content delta.
pub const NO_RESPONSE_NOTICE: &str =
    "Mi dispiace, non ho ricevuto una risposta valida. Riprova per favore.";

/// Shown when the request failed before or during streaming.
pub const CONNECTION_ERROR_NOTICE: &str = "Errore di connessione. Riprova più tardi.";

/// Lifecycle of a turn.
///
/// Constructing a turn with [`Turn::begin`] is the `Idle → Sending`
/// transition; `Streaming` starts on the first content delta. Both
/// `Finalized` and `Failed` are terminal; a new turn is a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Sending,
    Streaming,
    Finalized,
    Failed,
}

/// State for one in-flight exchange.
#[derive(Debug)]
pub struct Turn {
    accumulated: String,
    title_hint: Option<String>,
    state: TurnState,
}

impl Turn {
    /// Open a turn on `conversation`: append the user message (stamped
    /// with the current time) and the pending assistant placeholder.
    pub fn begin(conversation: &mut Conversation, user_text: impl Into<String>) -> Self {
        conversation.push(ChatMessage::user(user_text));
        conversation.push(ChatMessage::pending());
        Self {
            accumulated: String::new(),
            title_hint: None,
            state: TurnState::Sending,
        }
    }

    /// Current state of the turn.
    #[must_use]
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Text accumulated so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.accumulated
    }

    /// Whether the turn reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TurnState::Finalized | TurnState::Failed)
    }

    /// Apply one decoded frame.
    ///
    /// Content deltas extend the accumulator and rewrite the in-flight
    /// message with the full accumulated text, in decode order. An `end`
    /// event records the title hint. Malformed or unrecognized frames are
    /// dropped silently; nothing here ever fails the turn.
    pub fn on_frame(&mut self, conversation: &mut Conversation, frame: &str) {
        if self.is_terminal() {
            return;
        }
        match StreamEvent::parse(frame) {
            Some(StreamEvent::Delta(content)) => {
                self.accumulated.push_str(&content);
                self.state = TurnState::Streaming;
                if let Some(message) = conversation.in_flight_mut() {
                    message.text.clone_from(&self.accumulated);
                    message.state = super::MessageState::Streaming;
                }
                conversation.touch();
            }
            Some(StreamEvent::End { title }) => {
                if title.is_some() {
                    self.title_hint = title;
                }
            }
            None => {
                debug!(frame_len = frame.len(), "discarding unrecognized frame");
            }
        }
    }

    /// Settle the turn after the stream completed.
    ///
    /// With zero accumulated content the in-flight message becomes the
    /// no-response notice; either way it is stamped with the completion
    /// time, the conversation title is derived, and the turn ends
    /// `Finalized`. Returns `false` (doing nothing) if the turn already
    /// reached a terminal state.
    pub fn finish(&mut self, conversation: &mut Conversation) -> bool {
        if self.is_terminal() {
            return false;
        }
        if let Some(message) = conversation.in_flight_mut() {
            if self.accumulated.is_empty() {
                message.text = NO_RESPONSE_NOTICE.to_string();
            }
            message.time = display_time();
            message.state = super::MessageState::Final;
        }
        conversation.title = conversation.derive_title(self.title_hint.take());
        conversation.touch();
        self.state = TurnState::Finalized;
        true
    }

    /// Settle the turn after a transport failure.
    ///
    /// The in-flight message becomes the connection-error notice with a
    /// timestamp; earlier messages stay untouched and the turn ends
    /// `Failed`. No-op if already terminal.
    pub fn fail(&mut self, conversation: &mut Conversation) {
        if self.is_terminal() {
            return;
        }
        if let Some(message) = conversation.in_flight_mut() {
            message.text = CONNECTION_ERROR_NOTICE.to_string();
            message.time = display_time();
            message.state = super::MessageState::Error;
        }
        conversation.title = conversation.derive_title(self.title_hint.take());
        conversation.touch();
        self.state = TurnState::Failed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{MessageState, Sender};

    fn item(content: &str) -> String {
        format!(r#"{{"type":"item","content":"{content}"}}"#)
    }

    #[test]
    fn test_begin_appends_user_and_placeholder() {
        let mut conv = Conversation::with_greeting("Ciao!");
        let turn = Turn::begin(&mut conv, "domanda");
        assert_eq!(turn.state(), TurnState::Sending);
        assert_eq!(conv.messages.len(), 3);
        assert_eq!(conv.messages[1].sender, Sender::User);
        assert!(!conv.messages[1].time.is_empty());
        let placeholder = &conv.messages[2];
        assert_eq!(placeholder.state, MessageState::Pending);
        assert!(placeholder.text.is_empty());
        assert!(placeholder.time.is_empty());
    }

    #[test]
    fn test_monotonic_accumulation() {
        let mut conv = Conversation::with_greeting("Ciao!");
        let mut turn = Turn::begin(&mut conv, "domanda");

        let mut observed = vec![conv.messages.last().unwrap().text.clone()];
        for delta in ["A", "B", "C"] {
            turn.on_frame(&mut conv, &item(delta));
            observed.push(conv.messages.last().unwrap().text.clone());
        }
        assert_eq!(observed, vec!["", "A", "AB", "ABC"]);
        assert_eq!(turn.state(), TurnState::Streaming);
    }

    #[test]
    fn test_malformed_frame_does_not_interrupt() {
        let mut conv = Conversation::with_greeting("Ciao!");
        let mut turn = Turn::begin(&mut conv, "domanda");

        turn.on_frame(&mut conv, &item("A"));
        turn.on_frame(&mut conv, "{broken json");
        turn.on_frame(&mut conv, r#"{"type":"mystery"}"#);
        turn.on_frame(&mut conv, &item("B"));
        assert!(turn.finish(&mut conv));
        assert_eq!(conv.messages.last().unwrap().text, "AB");
    }

    #[test]
    fn test_finish_stamps_time_and_state() {
        let mut conv = Conversation::with_greeting("Ciao!");
        let mut turn = Turn::begin(&mut conv, "domanda");
        turn.on_frame(&mut conv, &item("risposta"));
        assert!(turn.finish(&mut conv));

        let last = conv.messages.last().unwrap();
        assert_eq!(last.state, MessageState::Final);
        assert!(!last.time.is_empty());
        assert_eq!(turn.state(), TurnState::Finalized);
    }

    #[test]
    fn test_no_content_falls_back_to_notice_finalized() {
        let mut conv = Conversation::with_greeting("Ciao!");
        let mut turn = Turn::begin(&mut conv, "domanda");
        assert!(turn.finish(&mut conv));

        let last = conv.messages.last().unwrap();
        assert_eq!(last.text, NO_RESPONSE_NOTICE);
        assert_eq!(last.state, MessageState::Final);
        // Explicitly not a failure.
        assert_eq!(turn.state(), TurnState::Finalized);
    }

    #[test]
    fn test_fail_replaces_placeholder_and_keeps_history() {
        let mut conv = Conversation::with_greeting("Ciao!");
        let mut turn = Turn::begin(&mut conv, "domanda");
        turn.fail(&mut conv);

        assert_eq!(conv.messages.len(), 3);
        assert_eq!(conv.messages[1].text, "domanda");
        let last = conv.messages.last().unwrap();
        assert_eq!(last.text, CONNECTION_ERROR_NOTICE);
        assert_eq!(last.state, MessageState::Error);
        assert!(!last.time.is_empty());
        assert_eq!(turn.state(), TurnState::Failed);
    }

    #[test]
    fn test_end_title_wins_over_user_messages() {
        let mut conv = Conversation::with_greeting("Ciao!");
        conv.push(ChatMessage::user("prima domanda"));
        let mut turn = Turn::begin(&mut conv, "seconda domanda molto lunga davvero");
        turn.on_frame(&mut conv, &item("ok"));
        turn.on_frame(&mut conv, r#"{"type":"end","title":"Custom"}"#);
        assert!(turn.finish(&mut conv));
        assert_eq!(conv.title, "Custom");
    }

    #[test]
    fn test_title_from_second_user_message_without_hint() {
        let mut conv = Conversation::with_greeting("Ciao!");
        conv.push(ChatMessage::user("first"));
        let mut turn = Turn::begin(&mut conv, "second longer text that keeps going well past forty");
        turn.on_frame(&mut conv, &item("ok"));
        assert!(turn.finish(&mut conv));
        assert_eq!(
            conv.title,
            "second longer text that keeps going well..."
        );
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut conv = Conversation::with_greeting("Ciao!");
        let mut turn = Turn::begin(&mut conv, "domanda");
        turn.on_frame(&mut conv, &item("A"));
        assert!(turn.finish(&mut conv));
        let settled = conv.clone();

        assert!(!turn.finish(&mut conv));
        turn.fail(&mut conv);
        turn.on_frame(&mut conv, &item("late"));
        assert_eq!(conv.messages, settled.messages);
    }

    #[test]
    fn test_no_pending_sentinel_after_termination() {
        let mut conv = Conversation::with_greeting("Ciao!");
        let mut turn = Turn::begin(&mut conv, "domanda");
        turn.finish(&mut conv);
        assert!(conv.messages.iter().all(|m| !m.is_in_flight()));
    }
}
