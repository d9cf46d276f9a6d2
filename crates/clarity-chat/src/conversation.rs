//! In-session transcript

use clarity_core::{count_exchanges, Message};

/// Ordered messages of the live session. Index 0 is always the system
/// message built from the boot document.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new(system: &str) -> Self {
        Self {
            messages: vec![Message::system(system)],
        }
    }

    /// Drop everything and re-seed with `system`.
    pub fn reset(&mut self, system: &str) {
        self.messages.clear();
        self.messages.push(Message::system(system));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Everything after the system message.
    pub fn turns(&self) -> &[Message] {
        &self.messages[1..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns().is_empty()
    }

    pub fn exchanges(&self) -> usize {
        count_exchanges(&self.messages)
    }

    /// Record a completed exchange. Only called once the reply is in hand,
    /// so a failed call never leaves a dangling user message.
    pub fn push_exchange(&mut self, user: Message, assistant: Message) {
        self.messages.push(user);
        self.messages.push(assistant);
    }
}
