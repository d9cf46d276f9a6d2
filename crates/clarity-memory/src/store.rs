//! On-disk home of the memory record

use crate::record::MemoryRecord;
use clarity_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const RECORD_FILE: &str = "long_term.json";

pub struct MemoryStore {
    path: PathBuf,
}

impl MemoryStore {
    /// Store rooted at `dir`; the record lives in `dir/long_term.json`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(RECORD_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record. `Ok(None)` when no file exists yet.
    pub fn try_load(&self) -> Result<Option<MemoryRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut record: MemoryRecord = serde_json::from_str(&content)
            .map_err(|e| Error::parse(format!("{}: {}", self.path.display(), e)))?;
        record.normalize();
        Ok(Some(record))
    }

    /// Load the record, falling back to an empty one. A file that fails to
    /// parse is copied aside to `long_term.json.bak` before the fallback so
    /// the next persist cannot destroy it.
    pub fn load(&self) -> MemoryRecord {
        match self.try_load() {
            Ok(Some(record)) => {
                info!("Loaded long-term memory from {}", self.path.display());
                record
            }
            Ok(None) => {
                info!("No long-term memory at {}, starting empty", self.path.display());
                MemoryRecord::default()
            }
            Err(e) => {
                warn!("Failed to load long-term memory: {}; starting empty", e);
                let backup = self.path.with_extension("json.bak");
                if let Err(copy_err) = std::fs::copy(&self.path, &backup) {
                    error!("Failed to back up unreadable memory file: {}", copy_err);
                } else {
                    warn!("Unreadable memory file kept at {}", backup.display());
                }
                MemoryRecord::default()
            }
        }
    }

    /// Write the record atomically: serialize to a sibling temp file, then
    /// rename over the real one. The record is written as given.
    pub fn persist(&self, record: &MemoryRecord) -> Result<()> {
        let mut json = serde_json::to_string_pretty(record)?;
        json.push('\n');

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|e| Error::persistence(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            Error::persistence(&self.path, e)
        })?;

        info!("Saved long-term memory to {}", self.path.display());
        Ok(())
    }
}
