//! Error types for Clarity

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("boot document error: {path}: {reason}")]
    BootDoc { path: PathBuf, reason: String },

    #[error("remote call failed: {provider} - {message}")]
    RemoteCall { provider: String, message: String },

    #[error("persistence error: {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn boot_doc(path: &Path, reason: impl ToString) -> Self {
        Self::BootDoc {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn remote_call(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteCall {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn persistence(path: &Path, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}
