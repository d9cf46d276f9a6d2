//! Boot document: the text file that becomes the system message

use chrono::{DateTime, Local};
use clarity_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct BootDocument {
    path: PathBuf,
    content: String,
}

impl BootDocument {
    /// Read the whole file. Missing or non-UTF-8 files are `BootDoc` errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = read(&path)?;
        info!("Loaded boot doc from {} ({} bytes)", path.display(), content.len());
        Ok(Self { path, content })
    }

    /// Re-read from disk. On failure the current content stays.
    pub fn reload(&mut self) -> Result<()> {
        match read(&self.path) {
            Ok(content) => {
                info!("Reloaded boot doc from {}", self.path.display());
                self.content = content;
                Ok(())
            }
            Err(e) => {
                warn!("Boot doc reload failed, keeping previous content: {}", e);
                Err(e)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Last-modified time of the file on disk.
    pub fn modified(&self) -> Result<DateTime<Local>> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| Error::boot_doc(&self.path, e))?;
        Ok(modified.into())
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::boot_doc(path, e))
}
