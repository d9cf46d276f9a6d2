//! Clarity Chat - the interactive session: boot document, transcript,
//! session log, slash commands and the per-turn flow that ties them to the
//! completion client and long-term memory.

pub mod bootdoc;
pub mod command;
pub mod conversation;
pub mod logger;
pub mod render;
pub mod session;

pub use bootdoc::BootDocument;
pub use command::{Command, Input, MemoryCommand};
pub use conversation::ConversationStore;
pub use logger::SessionLogger;
pub use session::{ChatSession, Notice, Turn};
