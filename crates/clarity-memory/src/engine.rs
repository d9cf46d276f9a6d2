//! Long-term memory engine
//!
//! Owns the in-memory record for a session and drives it through
//! `Idle -> Accumulating -> Extracting -> Persisted -> Accumulating`.
//! A failed extraction drops back to `Accumulating` with the record and
//! the file on disk untouched.

use crate::chunk::ChunkStore;
use crate::extract::Extractor;
use crate::record::{merge, MemoryField, MemoryRecord, MergeSummary};
use crate::store::MemoryStore;
use crate::trigger::{UpdatePolicy, UpdateTrigger};
use clarity_core::{count_exchanges, ChatConfig, Message, Result};
use clarity_llm::LlmProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No exchanges since start, reset, or the last update.
    Idle,
    Accumulating,
    Extracting,
    Persisted,
}

/// Result of an update attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The trigger's policy did not fire.
    NotTriggered,
    /// No completed exchanges since the last update.
    NothingNew,
    /// The model found nothing that was not already remembered.
    Unchanged,
    Updated(MergeSummary),
}

pub struct MemoryEngine {
    store: MemoryStore,
    chunks: ChunkStore,
    extractor: Extractor,
    policy: UpdatePolicy,
    chunk_max_messages: usize,
    record: MemoryRecord,
    /// Conversation index up to which extraction has already run.
    updated_through: usize,
    /// Unextracted turns from before a conversation restart.
    carried: Vec<Message>,
    state: EngineState,
}

impl MemoryEngine {
    /// Engine over `dir`, loading whatever record is already there.
    pub fn new(
        dir: impl AsRef<Path>,
        extractor: Extractor,
        policy: UpdatePolicy,
        chunk_max_messages: usize,
    ) -> Self {
        let dir = dir.as_ref();
        let store = MemoryStore::new(dir);
        let record = store.load();
        Self {
            store,
            chunks: ChunkStore::new(dir.join("chunks")),
            extractor,
            policy,
            chunk_max_messages,
            record,
            updated_through: 0,
            carried: Vec::new(),
            state: EngineState::Idle,
        }
    }

    pub fn from_config(config: &ChatConfig, provider: Arc<dyn LlmProvider>) -> Self {
        let memory = &config.memory;
        let extractor = Extractor::new(provider, config.memory_model(), memory.extraction_temperature);
        Self::new(
            &memory.dir,
            extractor,
            UpdatePolicy::new(memory.min_exchanges_between_updates),
            memory.chunk_max_messages,
        )
    }

    pub fn record(&self) -> &MemoryRecord {
        &self.record
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    /// Messages not yet seen by extraction: carried turns first, then the
    /// tail of `conversation`.
    fn pending(&self, conversation: &[Message]) -> Vec<Message> {
        let start = self.updated_through.min(conversation.len());
        self.carried
            .iter()
            .chain(&conversation[start..])
            .cloned()
            .collect()
    }

    pub fn pending_exchanges(&self, conversation: &[Message]) -> usize {
        count_exchanges(&self.pending(conversation))
    }

    /// Whether `trigger` should run an update now. Pure.
    pub fn should_update(&self, conversation: &[Message], trigger: UpdateTrigger) -> bool {
        self.policy
            .should_update(self.pending_exchanges(conversation), trigger)
    }

    /// Run an update if `trigger` fires: extract from the messages added
    /// since the last update, merge, and persist.
    pub async fn update(
        &mut self,
        conversation: &[Message],
        trigger: UpdateTrigger,
    ) -> Result<UpdateOutcome> {
        let pending = self.pending(conversation);
        let exchanges = count_exchanges(&pending);

        if !self.policy.should_update(exchanges, trigger) {
            if exchanges > 0 {
                self.state = EngineState::Accumulating;
            }
            return Ok(UpdateOutcome::NotTriggered);
        }
        if exchanges == 0 {
            debug!("Memory update ({:?}) skipped: no new exchanges", trigger);
            return Ok(UpdateOutcome::NothingNew);
        }

        info!(
            "Updating long-term memory with {} ({:?}, {} exchanges)",
            self.extractor.model(),
            trigger,
            exchanges
        );
        self.state = EngineState::Extracting;

        let extracted = match self.extractor.extract(&pending).await {
            Ok(e) => e,
            Err(e) => {
                self.state = EngineState::Accumulating;
                return Err(e);
            }
        };

        let (mut merged, summary) = merge(&self.record, &extracted);
        self.updated_through = conversation.len();
        self.carried.clear();

        if summary.total() == 0 {
            info!("Memory update found nothing new");
            self.state = EngineState::Persisted;
            return Ok(UpdateOutcome::Unchanged);
        }

        merged.touch();
        self.record = merged;
        if let Err(e) = self.store.persist(&self.record) {
            self.state = EngineState::Accumulating;
            return Err(e);
        }
        self.state = EngineState::Persisted;
        info!(
            "Memory updated: +{} preferences, +{} work items, +{} open loops",
            summary.preferences, summary.work_in_progress, summary.open_loops
        );
        Ok(UpdateOutcome::Updated(summary))
    }

    /// `conversation` is about to be cleared. Its unextracted turns are
    /// carried into the next update and counting restarts at index 0.
    pub fn rewind(&mut self, conversation: &[Message]) {
        let start = self.updated_through.min(conversation.len());
        self.carried
            .extend(conversation[start..].iter().filter(|m| m.is_turn()).cloned());
        self.updated_through = 0;
        self.state = if self.carried.is_empty() {
            EngineState::Idle
        } else {
            EngineState::Accumulating
        };
    }

    pub fn set_profile(&mut self, profile: &str) -> Result<()> {
        self.record.user_profile = profile.trim().to_string();
        self.record.touch();
        self.store.persist(&self.record)
    }

    /// Add one item explicitly. Returns `false` for duplicates and blanks,
    /// which leave the file alone.
    pub fn add_item(&mut self, field: MemoryField, item: &str) -> Result<bool> {
        if !self.record.add_item(field, item) {
            return Ok(false);
        }
        self.record.touch();
        self.store.persist(&self.record)?;
        Ok(true)
    }

    pub fn clear(&mut self, field: MemoryField) -> Result<usize> {
        let removed = self.record.clear(field);
        if removed > 0 {
            self.record.touch();
            self.store.persist(&self.record)?;
        }
        Ok(removed)
    }

    /// Write the session's transcript as chunk files.
    pub fn archive(&self, conversation: &[Message], session_id: &str) -> Result<Vec<PathBuf>> {
        self.chunks
            .chunk_and_archive(conversation, session_id, self.chunk_max_messages)
    }

    pub fn last_session_context(&self, max_messages: usize) -> Vec<Message> {
        self.chunks.load_last_session_context(max_messages)
    }

    pub fn context_block(&self) -> Option<String> {
        self.record.context_block()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clarity_llm::MockProvider;

    const EMPTY: &str = r#"{"preferences": [], "work_in_progress": [], "open_loops": []}"#;

    fn engine(dir: &Path, provider: MockProvider) -> MemoryEngine {
        let extractor = Extractor::new(Arc::new(provider), "mock", 0.3);
        MemoryEngine::new(dir, extractor, UpdatePolicy::new(2), 40)
    }

    fn exchange(conversation: &mut Vec<Message>, n: usize) {
        conversation.push(Message::user(format!("question {}", n)));
        conversation.push(Message::assistant(format!("answer {}", n)));
    }

    #[tokio::test]
    async fn periodic_update_waits_for_threshold() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut engine = engine(
            tmp.path(),
            MockProvider::text(
                r#"{"preferences": ["tabs"], "work_in_progress": [], "open_loops": []}"#,
            ),
        );
        let mut conversation = vec![Message::system("boot")];

        exchange(&mut conversation, 1);
        let outcome = engine.update(&conversation, UpdateTrigger::Periodic).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::NotTriggered);
        assert_eq!(engine.state(), EngineState::Accumulating);

        exchange(&mut conversation, 2);
        let outcome = engine.update(&conversation, UpdateTrigger::Periodic).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::Updated(s) if s.preferences == 1));
        assert_eq!(engine.state(), EngineState::Persisted);
        assert!(engine.record().last_updated.is_some());

        // Counter restarts after an update.
        assert!(!engine.should_update(&conversation, UpdateTrigger::Periodic));
    }

    #[tokio::test]
    async fn explicit_update_with_nothing_new_skips_the_call() {
        let tmp = tempfile::TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::text(EMPTY));
        let extractor = Extractor::new(provider.clone(), "mock", 0.3);
        let mut engine = MemoryEngine::new(tmp.path(), extractor, UpdatePolicy::default(), 40);

        let conversation = vec![Message::system("boot")];
        let outcome = engine
            .update(&conversation, UpdateTrigger::ExplicitCommand)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NothingNew);
        assert_eq!(provider.call_count().await, 0);
    }

    #[tokio::test]
    async fn empty_extraction_leaves_file_absent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut engine = engine(tmp.path(), MockProvider::text(EMPTY));
        let mut conversation = vec![Message::system("boot")];
        exchange(&mut conversation, 1);

        let outcome = engine.update(&conversation, UpdateTrigger::SessionEnd).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Unchanged);
        assert!(!engine.store_path().exists());
    }

    #[tokio::test]
    async fn failed_extraction_returns_to_accumulating() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut engine = engine(tmp.path(), MockProvider::failing("503"));
        let mut conversation = vec![Message::system("boot")];
        exchange(&mut conversation, 1);
        exchange(&mut conversation, 2);

        let err = engine.update(&conversation, UpdateTrigger::Periodic).await.unwrap_err();
        assert!(matches!(err, clarity_core::Error::RemoteCall { .. }));
        assert_eq!(engine.state(), EngineState::Accumulating);
        // The same exchanges are retried next time.
        assert!(engine.should_update(&conversation, UpdateTrigger::Periodic));
    }

    #[test]
    fn rewind_restarts_the_exchange_count() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut engine = engine(tmp.path(), MockProvider::text(EMPTY));
        engine.updated_through = 9;
        engine.rewind(&[Message::system("boot")]);
        assert_eq!(engine.state(), EngineState::Idle);

        let mut conversation = vec![Message::system("boot")];
        exchange(&mut conversation, 1);
        exchange(&mut conversation, 2);
        assert!(engine.should_update(&conversation, UpdateTrigger::Periodic));
    }

    #[tokio::test]
    async fn turns_before_a_rewind_reach_the_next_update() {
        let tmp = tempfile::TempDir::new().unwrap();
        let provider = Arc::new(MockProvider::text(EMPTY));
        let extractor = Extractor::new(provider.clone(), "mock", 0.3);
        let mut engine = MemoryEngine::new(tmp.path(), extractor, UpdatePolicy::new(2), 40);

        let mut conversation = vec![Message::system("boot")];
        exchange(&mut conversation, 1);
        engine.rewind(&conversation);
        assert_eq!(engine.state(), EngineState::Accumulating);

        let mut conversation = vec![Message::system("boot")];
        assert_eq!(engine.pending_exchanges(&conversation), 1);
        exchange(&mut conversation, 2);
        assert!(engine.should_update(&conversation, UpdateTrigger::Periodic));

        engine.update(&conversation, UpdateTrigger::Periodic).await.unwrap();
        let prompt = &provider.last_request().await.unwrap().messages[0].content;
        assert!(prompt.contains("question 1"));
        assert!(prompt.contains("question 2"));
        assert_eq!(engine.pending_exchanges(&conversation), 0);
    }

    #[tokio::test]
    async fn failed_save_keeps_merge_for_the_session() {
        let tmp = tempfile::TempDir::new().unwrap();
        // A file where the memory directory should be makes every save fail.
        let blocked = tmp.path().join("memory");
        std::fs::write(&blocked, "").unwrap();
        let extractor = Extractor::new(
            Arc::new(MockProvider::text(
                r#"{"preferences": ["tabs"], "work_in_progress": [], "open_loops": []}"#,
            )),
            "mock",
            0.3,
        );
        let mut engine = MemoryEngine::new(&blocked, extractor, UpdatePolicy::new(1), 40);

        let mut conversation = vec![Message::system("boot")];
        exchange(&mut conversation, 1);
        let err = engine
            .update(&conversation, UpdateTrigger::ExplicitCommand)
            .await
            .unwrap_err();
        assert!(matches!(err, clarity_core::Error::Persistence { .. }));
        assert_eq!(engine.record().preferences, vec!["tabs"]);
        assert_eq!(engine.state(), EngineState::Accumulating);
    }

    #[test]
    fn explicit_mutators_persist_immediately() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut engine = engine(tmp.path(), MockProvider::text(EMPTY));

        assert!(engine.add_item(MemoryField::WorkInProgress, "API v2").unwrap());
        assert!(!engine.add_item(MemoryField::WorkInProgress, "API v2").unwrap());
        engine.set_profile("  Backend engineer ").unwrap();

        let stored = MemoryStore::new(tmp.path()).try_load().unwrap().unwrap();
        assert_eq!(stored.user_profile, "Backend engineer");
        assert_eq!(stored.work_in_progress, vec!["API v2"]);

        assert_eq!(engine.clear(MemoryField::WorkInProgress).unwrap(), 1);
        let stored = MemoryStore::new(tmp.path()).try_load().unwrap().unwrap();
        assert!(stored.work_in_progress.is_empty());
    }
}
