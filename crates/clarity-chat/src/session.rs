//! Chat session context
//!
//! `ChatSession` owns the whole state of one run: config, boot document,
//! transcript, log file, chat client and (when enabled) the memory engine.
//! `handle_input` processes one line and returns what to show; errors
//! inside a turn become notices and the session carries on.

use crate::bootdoc::BootDocument;
use crate::command::{Command, Input, MemoryCommand, MEMORY_USAGE};
use crate::conversation::ConversationStore;
use crate::logger::{LogHeader, SessionLogger};
use crate::render;
use clarity_core::{format_transcript, ChatConfig, Error, Message, Result, Role};
use clarity_llm::{LlmProvider, LlmRequest};
use clarity_memory::{new_session_id, MemoryEngine, UpdateOutcome, UpdateTrigger};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Something to show the user. The variant picks the styling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
    /// Assistant reply text.
    Reply(String),
}

impl Notice {
    pub fn text(&self) -> &str {
        match self {
            Notice::Info(s)
            | Notice::Success(s)
            | Notice::Warning(s)
            | Notice::Error(s)
            | Notice::Reply(s) => s,
        }
    }
}

/// Result of handling one input line.
#[derive(Debug, Default)]
pub struct Turn {
    pub notices: Vec<Notice>,
    pub exit: bool,
}

impl Turn {
    fn with(notices: Vec<Notice>) -> Self {
        Self { notices, exit: false }
    }
}

pub struct ChatSession {
    config: ChatConfig,
    boot: BootDocument,
    conversation: ConversationStore,
    /// Turns cleared by /reset or /reload, kept for the session archive.
    earlier_turns: Vec<Message>,
    logger: Option<SessionLogger>,
    log_error: Option<String>,
    chat: Arc<dyn LlmProvider>,
    memory: Option<MemoryEngine>,
    /// Tail of the previous session, shown to the model as background.
    previous: Vec<Message>,
    session_id: String,
    closed: bool,
}

impl ChatSession {
    /// Start a session. Only an unreadable boot document is fatal; a log
    /// file that cannot be opened is reported through `banner`.
    pub fn new(
        config: ChatConfig,
        chat: Arc<dyn LlmProvider>,
        memory: Option<MemoryEngine>,
    ) -> Result<Self> {
        let boot = BootDocument::load(&config.boot_doc_path)?;
        let conversation = ConversationStore::new(boot.content());

        let header = LogHeader {
            boot_doc: boot.path(),
            model: &config.model,
            temperature: config.temperature,
        };
        let (logger, log_error) = match SessionLogger::open(&config.logs_dir, header) {
            Ok(logger) => (Some(logger), None),
            Err(e) => {
                error!("Failed to open session log: {}", e);
                (None, Some(e.to_string()))
            }
        };

        let previous = match &memory {
            Some(engine) if config.memory.enable_last_session_context => {
                engine.last_session_context(config.memory.max_last_session_turns)
            }
            _ => Vec::new(),
        };

        let session_id = new_session_id();
        info!("Session {} started with model {}", session_id, config.model);

        Ok(Self {
            config,
            boot,
            conversation,
            earlier_turns: Vec::new(),
            logger,
            log_error,
            chat,
            memory,
            previous,
            session_id,
            closed: false,
        })
    }

    /// Startup lines for the terminal.
    pub fn banner(&self) -> Vec<Notice> {
        let mut notices = vec![
            Notice::Success(format!("Loaded boot doc from {}", self.boot.path().display())),
            Notice::Info(format!(
                "Model: {} (temp: {})",
                self.config.model, self.config.temperature
            )),
        ];
        match (&self.logger, &self.log_error) {
            (Some(logger), _) => {
                notices.push(Notice::Info(format!("Logging to {}", logger.path().display())))
            }
            (None, Some(e)) => notices.push(Notice::Warning(format!(
                "Session log unavailable, continuing without it: {}",
                e
            ))),
            (None, None) => {}
        }
        if !self.previous.is_empty() {
            notices.push(Notice::Info(format!(
                "Loaded context from last session ({} messages)",
                self.previous.len()
            )));
        }
        notices.push(Notice::Info(render::help_text(
            self.memory.as_ref().map(|m| m.record()),
        )));
        notices
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn boot(&self) -> &BootDocument {
        &self.boot
    }

    pub fn memory(&self) -> Option<&MemoryEngine> {
        self.memory.as_ref()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.logger.as_ref().map(|l| l.path())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn previous_context(&self) -> &[Message] {
        &self.previous
    }

    /// Boot document, then long-term memory, then the previous session.
    pub fn system_prompt(&self) -> String {
        let mut prompt = self.boot.content().to_string();
        if let Some(block) = self.memory.as_ref().and_then(|m| m.context_block()) {
            prompt.push_str("\n\n");
            prompt.push_str(&block);
        }
        if !self.previous.is_empty() {
            prompt.push_str("\n\nPREVIOUS SESSION (most recent messages, for background only):\n");
            prompt.push_str(&format_transcript(&self.previous));
        }
        prompt
    }

    fn request(&self, user: &Message) -> LlmRequest {
        LlmRequest {
            model: self.config.model.clone(),
            messages: Vec::new(),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            system: Some(self.system_prompt()),
        }
        .with_turns(self.conversation.turns().iter().chain(std::iter::once(user)))
    }

    pub async fn handle_input(&mut self, line: &str) -> Turn {
        match Input::parse(line) {
            Input::Empty => Turn::default(),
            Input::Chat(text) => Turn::with(self.chat_turn(text).await),
            Input::Command(command) => self.run_command(command).await,
        }
    }

    async fn chat_turn(&mut self, text: String) -> Vec<Notice> {
        let mut notices = Vec::new();
        notices.extend(self.log(Role::User, &text));

        let user = Message::user(text);
        let request = self.request(&user);
        debug!(
            "Chat request: {} messages, system prompt {} chars",
            request.messages.len(),
            request.system.as_ref().map_or(0, |s| s.len())
        );

        match self.chat.complete(request).await {
            Ok(completion) => {
                let reply = completion.text;
                self.conversation
                    .push_exchange(user, Message::assistant(reply.clone()));
                notices.push(Notice::Reply(reply.clone()));
                notices.extend(self.log(Role::Assistant, &reply));
                notices.extend(self.update_memory(UpdateTrigger::Periodic).await);
            }
            Err(e) => {
                let message = format!("Error getting response: {}", e);
                warn!("{}", message);
                notices.extend(self.log(Role::System, &message));
                notices.push(Notice::Error(message));
            }
        }
        notices
    }

    async fn run_command(&mut self, command: Command) -> Turn {
        let notices = match command {
            Command::Help => vec![Notice::Info(render::help_text(
                self.memory.as_ref().map(|m| m.record()),
            ))],
            Command::Exit => {
                let mut notices = self.shutdown().await;
                notices.push(Notice::Info("Goodbye!".into()));
                return Turn { notices, exit: true };
            }
            Command::Reset => {
                self.restart_conversation();
                vec![Notice::Warning(
                    "Conversation history cleared. Starting a new conversation.".into(),
                )]
            }
            Command::Reload => match self.boot.reload() {
                Ok(()) => {
                    self.restart_conversation();
                    vec![Notice::Success("Boot document reloaded".into())]
                }
                Err(e) => vec![Notice::Error(format!(
                    "Reload failed, keeping the current boot document: {}",
                    e
                ))],
            },
            Command::WhichBootDoc => {
                let modified = self
                    .boot
                    .modified()
                    .map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
                    .unwrap_or_else(|e| format!("unknown ({})", e));
                vec![Notice::Info(format!(
                    "Current boot document: {}\nLast modified: {}",
                    self.boot.path().display(),
                    modified
                ))]
            }
            Command::Memory(command) => self.memory_command(command).await,
            Command::MemoryUsage(reason) => {
                vec![Notice::Warning(format!("Invalid /memory command: {}\n{}", reason, MEMORY_USAGE))]
            }
            Command::Unknown(word) => vec![Notice::Error(format!(
                "Unknown command: /{}. Type /help for commands.",
                word
            ))],
        };
        Turn::with(notices)
    }

    fn restart_conversation(&mut self) {
        if let Some(engine) = self.memory.as_mut() {
            engine.rewind(self.conversation.messages());
        }
        self.earlier_turns
            .extend(self.conversation.turns().iter().cloned());
        self.conversation.reset(self.boot.content());
        self.previous.clear();
        info!("Conversation restarted");
    }

    async fn memory_command(&mut self, command: MemoryCommand) -> Vec<Notice> {
        let Some(engine) = self.memory.as_mut() else {
            return vec![Notice::Warning("Long-term memory is disabled in settings".into())];
        };

        let saved = |result: Result<String>| match result {
            Ok(message) => Notice::Success(message),
            Err(e) => {
                error!("Memory write failed: {}", e);
                Notice::Error(format!("Changed in this session only, save failed: {}", e))
            }
        };

        let notice = match command {
            MemoryCommand::Show => Notice::Info(render::memory_text(engine.record())),
            MemoryCommand::SetProfile(text) => {
                saved(engine.set_profile(&text).map(|_| "Updated user profile".into()))
            }
            MemoryCommand::Add(field, text) => match engine.add_item(field, &text) {
                Ok(false) => Notice::Info(format!("Already remembered {}: {}", field.label(), text)),
                result => saved(result.map(|_| format!("Added {}: {}", field.label(), text))),
            },
            MemoryCommand::Clear(field) => saved(
                engine
                    .clear(field)
                    .map(|n| format!("Cleared {} {}(s)", n, field.label())),
            ),
            MemoryCommand::Update => {
                let trigger = UpdateTrigger::ExplicitCommand;
                let result = engine.update(self.conversation.messages(), trigger).await;
                return match describe_update(result, trigger) {
                    notices if notices.is_empty() => {
                        vec![Notice::Info("Memory is up to date".into())]
                    }
                    notices => notices,
                };
            }
        };
        vec![notice]
    }

    async fn update_memory(&mut self, trigger: UpdateTrigger) -> Vec<Notice> {
        match self.memory.as_mut() {
            Some(engine) => {
                let result = engine.update(self.conversation.messages(), trigger).await;
                describe_update(result, trigger)
            }
            None => Vec::new(),
        }
    }

    /// End the session: final memory update, then archive the transcript.
    /// Runs once; later calls do nothing.
    pub async fn shutdown(&mut self) -> Vec<Notice> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;

        let mut notices = Vec::new();
        let pending = self
            .memory
            .as_ref()
            .map_or(0, |engine| engine.pending_exchanges(self.conversation.messages()));
        if pending > 0 {
            notices.push(Notice::Info("Saving conversation to memory...".into()));
            notices.extend(self.update_memory(UpdateTrigger::SessionEnd).await);
        }

        if let Some(engine) = &self.memory {
            let mut transcript = self.earlier_turns.clone();
            transcript.extend(self.conversation.turns().iter().cloned());
            if let Err(e) = engine.archive(&transcript, &self.session_id) {
                error!("Failed to archive session {}: {}", self.session_id, e);
                notices.push(Notice::Warning(format!("Failed to archive conversation: {}", e)));
            }
        }

        info!("Session {} closed", self.session_id);
        notices
    }

    /// Write to the session log. The first failure is reported and
    /// logging stops for the rest of the run.
    fn log(&mut self, role: Role, content: &str) -> Option<Notice> {
        let logger = self.logger.as_mut()?;
        match logger.append(role, content) {
            Ok(()) => None,
            Err(e) => {
                error!("Session log write failed: {}", e);
                self.logger = None;
                Some(Notice::Warning(format!(
                    "Session log write failed, logging stopped: {}",
                    e
                )))
            }
        }
    }
}

fn describe_update(result: Result<UpdateOutcome>, trigger: UpdateTrigger) -> Vec<Notice> {
    match result {
        Ok(UpdateOutcome::Updated(summary)) => vec![Notice::Success(format!(
            "Memory updated ({} new item{})",
            summary.total(),
            if summary.total() == 1 { "" } else { "s" }
        ))],
        Ok(UpdateOutcome::Unchanged) if trigger != UpdateTrigger::Periodic => {
            vec![Notice::Info("Memory checked, nothing new to remember".into())]
        }
        Ok(_) => Vec::new(),
        Err(e @ Error::Persistence { .. }) => {
            error!("Memory merged but not saved: {}", e);
            vec![Notice::Warning(format!(
                "Memory updated for this session only, save failed: {}",
                e
            ))]
        }
        Err(e) => {
            warn!("Memory update failed: {}", e);
            vec![Notice::Warning(format!(
                "Memory update failed, keeping previous memory: {}",
                e
            ))]
        }
    }
}
