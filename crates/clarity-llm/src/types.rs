//! LLM types for requests and streaming responses

use clarity_core::{Message, Role};
use serde::{Deserialize, Serialize};

/// LLM request
#[derive(Clone, Debug, Serialize)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<LlmMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

impl Default for LlmRequest {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            messages: Vec::new(),
            max_tokens: Some(2000),
            temperature: None,
            system: None,
        }
    }
}

/// Message in LLM conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

impl From<&Message> for LlmMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }
    }
}

impl LlmRequest {
    /// Turns only; system messages go in `system`.
    pub fn with_turns<'a>(mut self, turns: impl IntoIterator<Item = &'a Message>) -> Self {
        self.messages.extend(
            turns
                .into_iter()
                .filter(|m| m.role != Role::System)
                .map(LlmMessage::from),
        );
        self
    }
}

/// Streaming delta from LLM
#[derive(Clone, Debug)]
pub enum StreamDelta {
    Text(String),
    Done {
        stop_reason: Option<String>,
        usage: Option<Usage>,
    },
    Error(String),
}

/// Token usage
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A finished, non-streaming completion.
#[derive(Clone, Debug)]
pub struct Completion {
    pub text: String,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}
