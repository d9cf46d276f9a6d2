//! Clarity Memory - durable long-term memory extracted from conversations
//!
//! The record lives in `<memory dir>/long_term.json`. It grows from two
//! sources: explicit user commands, persisted immediately, and model-driven
//! extraction over the transcript, which runs when a trigger fires (every
//! few exchanges, on an explicit command, and at session end). Finished
//! sessions are archived as immutable chunks under `<memory dir>/chunks/`
//! and the newest one can seed the next session's context.

pub mod chunk;
pub mod engine;
pub mod extract;
pub mod record;
pub mod store;
pub mod trigger;

pub use chunk::{new_session_id, ChunkStore, ConversationChunk};
pub use engine::{EngineState, MemoryEngine, UpdateOutcome};
pub use extract::{parse_extraction, ExtractedMemory, Extractor};
pub use record::{merge, MemoryField, MemoryRecord, MergeSummary};
pub use store::MemoryStore;
pub use trigger::{UpdatePolicy, UpdateTrigger};
