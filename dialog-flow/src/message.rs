use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single exchanged message. Immutable once appended to a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, append-only message log for one conversation session.
///
/// Append order equals turn order; entries are never edited or removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages appended before the given index. Used to hand the model the
    /// history that preceded the current turn.
    pub fn before(&self, index: usize) -> &[Message] {
        &self.messages[..index.min(self.messages.len())]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut transcript = Transcript::new();
        transcript.push_user("hello");
        transcript.push_assistant("hi there");
        transcript.push_user("how are you");

        let roles: Vec<MessageRole> = transcript.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::User]
        );
        assert_eq!(transcript.messages()[0].text, "hello");
        assert_eq!(transcript.messages()[2].text, "how are you");
    }

    #[test]
    fn before_returns_prior_history() {
        let mut transcript = Transcript::new();
        transcript.push_user("first");
        transcript.push_assistant("second");
        transcript.push_user("third");

        let prior = transcript.before(2);
        assert_eq!(prior.len(), 2);
        assert_eq!(prior[1].text, "second");

        // out-of-range index clamps instead of panicking
        assert_eq!(transcript.before(10).len(), 3);
    }
}
