//! Clarity LLM - Completion provider adapters with streaming support

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use mock::{MockBehavior, MockProvider};
pub use openai::OpenAiProvider;
pub use provider::{collect_text, LlmError, LlmProvider, LlmResult, LlmStream};
pub use types::*;

use clarity_core::ProviderKind;
use std::sync::Arc;

/// Build the provider for `kind` with the given credential.
pub fn provider_for(
    kind: ProviderKind,
    api_key: impl Into<String>,
    base_url: Option<&str>,
) -> Arc<dyn LlmProvider> {
    match kind {
        ProviderKind::OpenAi => {
            let mut p = OpenAiProvider::new(api_key);
            if let Some(url) = base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderKind::Anthropic => {
            let mut p = AnthropicProvider::new(api_key);
            if let Some(url) = base_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
    }
}
