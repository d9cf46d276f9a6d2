//! Archived conversation chunks
//!
//! At session end the transcript is split into chunks of at most N
//! messages and each chunk is written once as
//! `<chunks dir>/<session_id>-<NNN>.json`. Session ids start with a
//! `YYYYMMDD-HHMMSS` prefix, so sorting file names sorts sessions
//! chronologically.

use chrono::{DateTime, Local, Utc};
use clarity_core::{Error, Message, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// New session id: `<YYYYMMDD-HHMMSS>-<8 hex chars>`.
pub fn new_session_id() -> String {
    let now = Local::now().format("%Y%m%d-%H%M%S");
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", now, &uuid[..8])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationChunk {
    pub session_id: String,
    /// 1-based position of this chunk within its session.
    pub sequence: u32,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

pub struct ChunkStore {
    dir: PathBuf,
}

impl ChunkStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn chunk_path(&self, session_id: &str, sequence: u32) -> PathBuf {
        self.dir.join(format!("{}-{:03}.json", session_id, sequence))
    }

    /// Split the user/assistant turns of `conversation` into chunks of at
    /// most `max_messages`.
    pub fn split(conversation: &[Message], session_id: &str, max_messages: usize) -> Vec<ConversationChunk> {
        let turns: Vec<Message> = conversation.iter().filter(|m| m.is_turn()).cloned().collect();
        let created_at = Utc::now();
        turns
            .chunks(max_messages.max(1))
            .enumerate()
            .map(|(i, messages)| ConversationChunk {
                session_id: session_id.to_string(),
                sequence: i as u32 + 1,
                created_at,
                messages: messages.to_vec(),
            })
            .collect()
    }

    /// Archive a finished session. Chunk files are created exclusively and
    /// never rewritten; archiving the same session twice is an error.
    pub fn chunk_and_archive(
        &self,
        conversation: &[Message],
        session_id: &str,
        max_messages: usize,
    ) -> Result<Vec<PathBuf>> {
        let chunks = Self::split(conversation, session_id, max_messages);
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        fs::create_dir_all(&self.dir).map_err(|e| Error::persistence(&self.dir, e))?;

        let mut written = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let path = self.chunk_path(session_id, chunk.sequence);
            let json = serde_json::to_string_pretty(chunk)?;
            let mut f = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .map_err(|e| Error::persistence(&path, e))?;
            f.write_all(json.as_bytes())
                .map_err(|e| Error::persistence(&path, e))?;
            written.push(path);
        }

        info!(
            "Archived session {} as {} chunk(s) in {}",
            session_id,
            written.len(),
            self.dir.display()
        );
        Ok(written)
    }

    /// Session id of the most recently archived session.
    pub fn latest_session_id(&self) -> Option<String> {
        let entries = fs::read_dir(&self.dir).ok()?;
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .filter_map(|p| {
                let stem = p.file_stem()?.to_str()?.to_string();
                let (session_id, seq) = stem.rsplit_once('-')?;
                seq.parse::<u32>().ok()?;
                Some(session_id.to_string())
            })
            .max()
    }

    /// Every readable chunk of `session_id`, in sequence order. Unreadable
    /// chunk files are skipped with a warning.
    pub fn load_session(&self, session_id: &str) -> Vec<ConversationChunk> {
        let mut chunks = Vec::new();
        let mut sequence = 1;
        loop {
            let path = self.chunk_path(session_id, sequence);
            if !path.exists() {
                break;
            }
            match fs::read_to_string(&path)
                .map_err(Error::from)
                .and_then(|s| serde_json::from_str::<ConversationChunk>(&s).map_err(Error::from))
            {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => warn!("Skipping unreadable chunk {}: {}", path.display(), e),
            }
            sequence += 1;
        }
        chunks
    }

    /// Up to `max_messages` trailing turns of the most recent archived
    /// session, oldest first.
    pub fn load_last_session_context(&self, max_messages: usize) -> Vec<Message> {
        let Some(session_id) = self.latest_session_id() else {
            info!("No archived sessions in {}", self.dir.display());
            return Vec::new();
        };

        let messages: Vec<Message> = self
            .load_session(&session_id)
            .into_iter()
            .flat_map(|c| c.messages)
            .filter(|m| m.is_turn())
            .collect();

        let start = messages.len().saturating_sub(max_messages);
        let tail = messages[start..].to_vec();
        info!(
            "Loaded {} message(s) of context from session {}",
            tail.len(),
            session_id
        );
        tail
    }
}
