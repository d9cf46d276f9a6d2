//! MockProvider: deterministic LLM responses for testing
//!
//! Implements `LlmProvider` with canned behaviors so the chat loop and
//! the memory engine can be exercised without a network.

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta, Usage};
use async_stream::stream;
use tokio::sync::Mutex;

/// Mock behavior configuration
#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// Stream a text response
    Text(String),
    /// Fail the request before streaming starts
    Error(String),
    /// Start streaming, then fail mid-response
    StreamError { partial: String, message: String },
}

/// A sequence of behaviors. Each call to complete_stream pops the next one.
/// If the sequence is exhausted, the default behavior is used.
pub struct MockProvider {
    behaviors: Mutex<Vec<MockBehavior>>,
    default_behavior: MockBehavior,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    /// Create a mock that always returns the same behavior
    pub fn constant(behavior: MockBehavior) -> Self {
        Self {
            behaviors: Mutex::new(Vec::new()),
            default_behavior: behavior,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with a sequence of behaviors (consumed in order)
    pub fn sequence(behaviors: Vec<MockBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors),
            default_behavior: MockBehavior::Text("(mock: sequence exhausted)".into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::constant(MockBehavior::Text(text.into()))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::constant(MockBehavior::Error(message.into()))
    }

    /// Number of requests received so far
    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Every request received, oldest first
    pub async fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<LlmRequest> {
        self.requests.lock().await.last().cloned()
    }

    async fn next_behavior(&self) -> MockBehavior {
        let mut behaviors = self.behaviors.lock().await;
        if behaviors.is_empty() {
            self.default_behavior.clone()
        } else {
            behaviors.remove(0)
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str { "mock" }

    fn models(&self) -> &[&str] { &["mock"] }

    fn supports_model(&self, _model: &str) -> bool { true }

    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream> {
        self.requests.lock().await.push(request);
        let behavior = self.next_behavior().await;

        if let MockBehavior::Error(message) = behavior {
            return Err(LlmError::RequestFailed(message));
        }

        Ok(Box::pin(stream! {
            match behavior {
                MockBehavior::Text(text) => {
                    // Stream text in chunks like a real LLM
                    let chars: Vec<char> = text.chars().collect();
                    for chunk in chars.chunks(20) {
                        yield Ok(StreamDelta::Text(chunk.iter().collect()));
                    }
                    yield Ok(StreamDelta::Done {
                        stop_reason: Some("stop".into()),
                        usage: Some(Usage::default()),
                    });
                }
                MockBehavior::StreamError { partial, message } => {
                    yield Ok(StreamDelta::Text(partial));
                    yield Err(LlmError::StreamError(message));
                }
                MockBehavior::Error(_) => {}
            }
        }))
    }
}
