//! Tests for clarity-memory: merge rules, storage, triggers, chunks

use clarity_core::{Error, Message};
use clarity_llm::{MockBehavior, MockProvider};
use clarity_memory::*;
use std::sync::Arc;
use tempfile::TempDir;

fn extracted(prefs: &[&str], work: &[&str], loops: &[&str]) -> ExtractedMemory {
    let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
    ExtractedMemory {
        preferences: owned(prefs),
        work_in_progress: owned(work),
        open_loops: owned(loops),
    }
}

fn conversation(exchanges: usize) -> Vec<Message> {
    let mut messages = vec![Message::system("boot document")];
    for i in 0..exchanges {
        messages.push(Message::user(format!("question {}", i)));
        messages.push(Message::assistant(format!("answer {}", i)));
    }
    messages
}

fn engine_with(dir: &TempDir, provider: Arc<MockProvider>, min_exchanges: usize) -> MemoryEngine {
    let extractor = Extractor::new(provider, "mock", 0.3);
    MemoryEngine::new(dir.path(), extractor, UpdatePolicy::new(min_exchanges), 40)
}

// ===========================================================================
// merge
// ===========================================================================

#[test]
fn merge_is_idempotent() {
    let existing = MemoryRecord {
        user_profile: "Backend engineer".into(),
        preferences: vec!["concise answers".into()],
        work_in_progress: vec!["billing migration".into()],
        ..Default::default()
    };
    let e = extracted(
        &["concise answers", "Rust examples"],
        &["billing migration", "API v2"],
        &["pick a queue"],
    );

    let (once, summary) = merge(&existing, &e);
    let (twice, again) = merge(&once, &e);

    assert_eq!(once, twice);
    assert_eq!(summary.total(), 3);
    assert_eq!(again.total(), 0);
    assert_eq!(once.preferences, vec!["concise answers", "Rust examples"]);
    assert_eq!(once.work_in_progress, vec!["billing migration", "API v2"]);
}

#[test]
fn merge_never_touches_profile_or_timestamp() {
    let existing = MemoryRecord {
        user_profile: "Designer".into(),
        ..Default::default()
    };
    let (merged, _) = merge(&existing, &extracted(&["dark mode"], &[], &[]));
    assert_eq!(merged.user_profile, "Designer");
    assert!(merged.last_updated.is_none());
}

#[test]
fn merge_dedups_within_one_extraction() {
    let (merged, summary) = merge(
        &MemoryRecord::default(),
        &extracted(&["tea", "tea", " tea "], &[], &["", "  "]),
    );
    assert_eq!(merged.preferences, vec!["tea"]);
    assert!(merged.open_loops.is_empty());
    assert_eq!(summary.preferences, 1);
}

// ===========================================================================
// MemoryStore
// ===========================================================================

#[test]
fn persist_of_load_is_byte_identical() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new(tmp.path());

    let mut record = MemoryRecord {
        user_profile: "Backend engineer".into(),
        preferences: vec!["tabs".into()],
        open_loops: vec!["choose a DB".into()],
        ..Default::default()
    };
    record.touch();
    store.persist(&record).unwrap();
    let before = std::fs::read(store.path()).unwrap();

    store.persist(&store.load()).unwrap();
    let after = std::fs::read(store.path()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn missing_file_loads_empty() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new(tmp.path());
    assert_eq!(store.load(), MemoryRecord::default());
    assert!(store.try_load().unwrap().is_none());
}

#[test]
fn corrupt_file_loads_empty_and_is_backed_up() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new(tmp.path());
    std::fs::write(store.path(), "{not json").unwrap();

    assert_eq!(store.load(), MemoryRecord::default());
    let backup = tmp.path().join("long_term.json.bak");
    assert_eq!(std::fs::read_to_string(backup).unwrap(), "{not json");
}

#[test]
fn unknown_fields_ignored_and_duplicates_removed_on_load() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new(tmp.path());
    std::fs::write(
        store.path(),
        r#"{"preferences": ["a", "a", "b"], "mood": "sunny", "last_updated": null}"#,
    )
    .unwrap();

    let record = store.load();
    assert_eq!(record.preferences, vec!["a", "b"]);
    assert!(record.work_in_progress.is_empty());
    assert_eq!(record.user_profile, "");
}

// ===========================================================================
// Engine and triggers
// ===========================================================================

#[tokio::test]
async fn periodic_threshold_fires_at_min_exchanges() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(MockProvider::text(
        r#"{"preferences": [], "work_in_progress": ["API v2"], "open_loops": []}"#,
    ));
    let mut engine = engine_with(&tmp, provider.clone(), 3);

    for n in 1..3 {
        let outcome = engine
            .update(&conversation(n), UpdateTrigger::Periodic)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotTriggered);
    }
    assert_eq!(provider.call_count().await, 0);

    let outcome = engine
        .update(&conversation(3), UpdateTrigger::Periodic)
        .await
        .unwrap();
    assert!(matches!(outcome, UpdateOutcome::Updated(_)));
    assert_eq!(provider.call_count().await, 1);
    assert_eq!(engine.record().work_in_progress, vec!["API v2"]);
}

#[tokio::test]
async fn extraction_only_sees_new_turns() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(MockProvider::text(
        r#"{"preferences": [], "work_in_progress": [], "open_loops": []}"#,
    ));
    let mut engine = engine_with(&tmp, provider.clone(), 1);

    engine.update(&conversation(1), UpdateTrigger::Periodic).await.unwrap();
    engine.update(&conversation(2), UpdateTrigger::Periodic).await.unwrap();

    let prompt = &provider.last_request().await.unwrap().messages[0].content;
    assert!(prompt.contains("question 1"));
    assert!(!prompt.contains("question 0"));
    assert!(!prompt.contains("boot document"));
}

#[tokio::test]
async fn failed_extraction_leaves_disk_unchanged() {
    let tmp = TempDir::new().unwrap();
    let store = MemoryStore::new(tmp.path());
    store
        .persist(&MemoryRecord {
            preferences: vec!["tabs".into()],
            ..Default::default()
        })
        .unwrap();
    let before = std::fs::read(store.path()).unwrap();

    let provider = Arc::new(MockProvider::sequence(vec![
        MockBehavior::Error("connection reset".into()),
        MockBehavior::Text("I think the user likes spaces.".into()),
        MockBehavior::StreamError {
            partial: "{\"preferences\": [".into(),
            message: "stream closed".into(),
        },
    ]));
    let mut engine = engine_with(&tmp, provider, 1);
    let record_before = engine.record().clone();

    let err = engine
        .update(&conversation(1), UpdateTrigger::SessionEnd)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RemoteCall { .. }));

    let err = engine
        .update(&conversation(1), UpdateTrigger::SessionEnd)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Parse(_)));

    let err = engine
        .update(&conversation(1), UpdateTrigger::SessionEnd)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RemoteCall { .. }));

    assert_eq!(engine.record(), &record_before);
    assert_eq!(engine.state(), EngineState::Accumulating);
    assert_eq!(std::fs::read(store.path()).unwrap(), before);
}

#[tokio::test]
async fn extraction_never_sets_the_profile() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(MockProvider::text(
        r#"{"user_profile": "A cat", "preferences": ["naps"], "work_in_progress": [], "open_loops": []}"#,
    ));
    let mut engine = engine_with(&tmp, provider, 1);
    engine.set_profile("Backend engineer").unwrap();

    engine
        .update(&conversation(1), UpdateTrigger::ExplicitCommand)
        .await
        .unwrap();
    assert_eq!(engine.record().user_profile, "Backend engineer");
    assert_eq!(engine.record().preferences, vec!["naps"]);
}

// ===========================================================================
// Chunks and last-session context
// ===========================================================================

#[test]
fn archive_writes_numbered_chunks_once() {
    let tmp = TempDir::new().unwrap();
    let chunks = ChunkStore::new(tmp.path().join("chunks"));
    let messages = conversation(5);

    let paths = chunks
        .chunk_and_archive(&messages, "20250101-090000-aaaaaaaa", 4)
        .unwrap();
    assert_eq!(paths.len(), 3);
    assert!(paths[0].ends_with("20250101-090000-aaaaaaaa-001.json"));

    let loaded = chunks.load_session("20250101-090000-aaaaaaaa");
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.iter().map(|c| c.messages.len()).sum::<usize>(), 10);

    // Chunk files are never rewritten.
    assert!(chunks
        .chunk_and_archive(&messages, "20250101-090000-aaaaaaaa", 4)
        .is_err());
}

#[test]
fn last_session_context_reads_newest_session_tail() {
    let tmp = TempDir::new().unwrap();
    let chunks = ChunkStore::new(tmp.path());

    let old = vec![Message::user("old question"), Message::assistant("old answer")];
    chunks.chunk_and_archive(&old, "20240101-090000-11111111", 40).unwrap();
    chunks
        .chunk_and_archive(&conversation(3), "20250601-120000-22222222", 2)
        .unwrap();

    assert_eq!(
        chunks.latest_session_id().as_deref(),
        Some("20250601-120000-22222222")
    );

    let context = chunks.load_last_session_context(3);
    let contents: Vec<_> = context.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["answer 1", "question 2", "answer 2"]);
}

#[test]
fn last_session_context_skips_corrupt_chunks() {
    let tmp = TempDir::new().unwrap();
    let chunks = ChunkStore::new(tmp.path());
    chunks
        .chunk_and_archive(&conversation(2), "20250601-120000-33333333", 2)
        .unwrap();
    std::fs::write(tmp.path().join("20250601-120000-33333333-001.json"), "garbage").unwrap();

    let context = chunks.load_last_session_context(20);
    assert_eq!(context.len(), 2);
    assert_eq!(context[0].content, "question 1");
}

#[test]
fn no_archive_means_no_context() {
    let tmp = TempDir::new().unwrap();
    let chunks = ChunkStore::new(tmp.path().join("missing"));
    assert!(chunks.load_last_session_context(20).is_empty());
    assert!(chunks.latest_session_id().is_none());
}
