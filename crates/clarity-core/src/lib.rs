//! Clarity Core - Message types, configuration, and error handling

pub mod config;
pub mod error;
pub mod types;

pub use config::{ChatConfig, MemoryConfig, ProviderKind};
pub use error::{Error, Result};
pub use types::*;
