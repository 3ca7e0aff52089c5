//! The visible chat transcript.

use serde::{Deserialize, Serialize};

/// One line of the transcript: who said it and what they said.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Identity of the sender (an agent name, or `user`)
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Append-only, arrival-ordered list of chat messages.
///
/// Entries are never reordered, deduplicated, or removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
