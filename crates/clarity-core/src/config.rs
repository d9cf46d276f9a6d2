//! Chat client configuration
//!
//! Loaded from JSON (or TOML, by extension) at startup. A missing file
//! means defaults; a file that is present but malformed or out of range
//! is a fatal config error.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which remote completion API a model is served by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
}

impl ProviderKind {
    /// Guess the provider from a model name. Claude models go to
    /// Anthropic, everything else to the OpenAI-compatible endpoint.
    pub fn infer(model: &str) -> Self {
        if model.starts_with("claude") {
            ProviderKind::Anthropic
        } else {
            ProviderKind::OpenAi
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the API credential.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Boot document that becomes the system message.
    pub boot_doc_path: PathBuf,
    /// Chat model.
    pub model: String,
    /// Sampling temperature, 0.0 - 2.0.
    pub temperature: f32,
    /// Max output tokens per reply.
    pub max_tokens: u32,
    /// Chat provider. Inferred from `model` when unset.
    pub provider: Option<ProviderKind>,
    /// Override for the provider endpoint.
    pub base_url: Option<String>,
    /// Directory for per-session transcript logs.
    pub logs_dir: PathBuf,
    /// Long-term memory settings.
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub enable_long_term_memory: bool,
    /// Extraction model. Defaults to the chat model.
    pub model: Option<String>,
    /// Extraction provider. Inferred from the extraction model when unset.
    pub provider: Option<ProviderKind>,
    /// Seed new sessions with the tail of the previous one.
    pub enable_last_session_context: bool,
    pub max_last_session_turns: usize,
    /// Completed exchanges required before a periodic update fires.
    pub min_exchanges_between_updates: usize,
    pub extraction_temperature: f32,
    /// Max messages per archived conversation chunk.
    pub chunk_max_messages: usize,
    /// Directory holding `long_term.json` and `chunks/`.
    pub dir: PathBuf,
}

// ============================================================
// Defaults
// ============================================================

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            boot_doc_path: PathBuf::from("bootdocs/clarity_os_boot_v1.txt"),
            model: "gpt-4".into(),
            temperature: 0.7,
            max_tokens: 2000,
            provider: None,
            base_url: None,
            logs_dir: PathBuf::from("logs"),
            memory: MemoryConfig::default(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enable_long_term_memory: false,
            model: None,
            provider: None,
            enable_last_session_context: false,
            max_last_session_turns: 20,
            min_exchanges_between_updates: 2,
            extraction_temperature: 0.3,
            chunk_max_messages: 40,
            dir: PathBuf::from("memory"),
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl ChatConfig {
    /// Load config from `path`, resolving relative paths against `root`.
    pub fn load(path: &Path, root: &Path) -> Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(content) => {
                let is_toml = path.extension().is_some_and(|e| e == "toml");
                let config = Self::parse(&content, is_toml)
                    .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
                tracing::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                return Err(Error::config(format!("{}: {}", path.display(), e)));
            }
        };
        config.validate()?;
        Ok(config.resolve_paths(root))
    }

    /// Parse config text without touching the filesystem.
    pub fn parse(content: &str, is_toml: bool) -> Result<Self> {
        if is_toml {
            toml::from_str(content).map_err(|e| Error::config(e.to_string()))
        } else {
            serde_json::from_str(content).map_err(|e| Error::config(e.to_string()))
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature must be within 0.0-2.0, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(Error::config("max_tokens must be positive"));
        }
        let memory = &self.memory;
        if memory.max_last_session_turns == 0 {
            return Err(Error::config("memory.max_last_session_turns must be positive"));
        }
        if memory.min_exchanges_between_updates == 0 {
            return Err(Error::config(
                "memory.min_exchanges_between_updates must be positive",
            ));
        }
        if memory.chunk_max_messages == 0 {
            return Err(Error::config("memory.chunk_max_messages must be positive"));
        }
        if !(0.0..=2.0).contains(&memory.extraction_temperature) {
            return Err(Error::config(format!(
                "memory.extraction_temperature must be within 0.0-2.0, got {}",
                memory.extraction_temperature
            )));
        }
        Ok(())
    }

    /// Make every configured path absolute against `root`.
    pub fn resolve_paths(mut self, root: &Path) -> Self {
        self.boot_doc_path = resolve(root, &self.boot_doc_path);
        self.logs_dir = resolve(root, &self.logs_dir);
        self.memory.dir = resolve(root, &self.memory.dir);
        self
    }

    pub fn chat_provider(&self) -> ProviderKind {
        self.provider.unwrap_or_else(|| ProviderKind::infer(&self.model))
    }

    pub fn memory_model(&self) -> &str {
        self.memory.model.as_deref().unwrap_or(&self.model)
    }

    pub fn memory_provider(&self) -> ProviderKind {
        self.memory
            .provider
            .unwrap_or_else(|| ProviderKind::infer(self.memory_model()))
    }

    pub fn memory_enabled(&self) -> bool {
        self.memory.enable_long_term_memory
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
