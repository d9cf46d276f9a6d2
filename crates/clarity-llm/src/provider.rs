//! LLM Provider trait

use crate::types::{Completion, LlmRequest, StreamDelta, Usage};
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn models(&self) -> &[&str];

    fn supports_model(&self, model: &str) -> bool {
        self.models()
            .iter()
            .any(|m| *m == model || model.starts_with(m))
    }

    /// Stream a completion response.
    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream>;

    /// Run a completion to the end and return the collected text.
    async fn complete(&self, request: LlmRequest) -> LlmResult<Completion> {
        let stream = self.complete_stream(request).await?;
        collect_text(stream).await
    }
}

/// Drain a delta stream into a single completion. The first stream error
/// aborts collection; an empty reply is an invalid response.
pub async fn collect_text(mut stream: LlmStream) -> LlmResult<Completion> {
    let mut text = String::new();
    let mut stop_reason = None;
    let mut usage: Option<Usage> = None;

    while let Some(delta) = stream.next().await {
        match delta? {
            StreamDelta::Text(t) => text.push_str(&t),
            StreamDelta::Done {
                stop_reason: reason,
                usage: u,
            } => {
                stop_reason = reason;
                usage = u;
                break;
            }
            StreamDelta::Error(e) => return Err(LlmError::StreamError(e)),
        }
    }

    if text.trim().is_empty() {
        return Err(LlmError::InvalidResponse("empty completion".into()));
    }
    Ok(Completion {
        text,
        stop_reason,
        usage,
    })
}
