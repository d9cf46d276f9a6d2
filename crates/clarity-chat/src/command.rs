//! Slash-command parsing
//!
//! Anything starting with `/` is a command; the command word is
//! case-insensitive. Everything else is a chat turn.

use clarity_memory::MemoryField;

pub const MEMORY_USAGE: &str = "Usage: /memory \
[set user_profile <text> | add preference|work|loop <text> | clear work|loops | update]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Chat(String),
    Command(Command),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Exit,
    Reset,
    Reload,
    WhichBootDoc,
    Memory(MemoryCommand),
    /// A `/memory` form that did not parse; carries what was wrong.
    MemoryUsage(String),
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryCommand {
    Show,
    SetProfile(String),
    Add(MemoryField, String),
    Clear(MemoryField),
    Update,
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        match line.strip_prefix('/') {
            Some(rest) => Input::Command(Command::parse(rest)),
            None => Input::Chat(line.to_string()),
        }
    }
}

impl Command {
    /// Parse the text after the leading `/`.
    pub fn parse(body: &str) -> Self {
        let (word, rest) = split_word(body);
        match word.to_lowercase().as_str() {
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            "reset" => Command::Reset,
            "reload" => Command::Reload,
            "which_bootdoc" | "bootdoc" => Command::WhichBootDoc,
            "memory" => match MemoryCommand::parse(rest) {
                Ok(cmd) => Command::Memory(cmd),
                Err(reason) => Command::MemoryUsage(reason),
            },
            _ => Command::Unknown(word.to_string()),
        }
    }
}

impl MemoryCommand {
    fn parse(args: &str) -> Result<Self, String> {
        let (action, rest) = split_word(args);
        match action.to_lowercase().as_str() {
            "" | "show" => Ok(MemoryCommand::Show),
            "update" if rest.is_empty() => Ok(MemoryCommand::Update),
            "set" => {
                let (field, value) = split_word(rest);
                if !field.eq_ignore_ascii_case("user_profile") {
                    return Err(format!("cannot set '{}'; only user_profile can be set", field));
                }
                let value = unquote(value);
                if value.is_empty() {
                    return Err("missing profile text".into());
                }
                Ok(MemoryCommand::SetProfile(value))
            }
            "add" => {
                let (kind, value) = split_word(rest);
                let field = match kind.to_lowercase().as_str() {
                    "preference" | "pref" => MemoryField::Preferences,
                    "work" => MemoryField::WorkInProgress,
                    "loop" => MemoryField::OpenLoops,
                    _ => return Err(format!("cannot add to '{}'", kind)),
                };
                let value = unquote(value);
                if value.is_empty() {
                    return Err(format!("missing {} text", field.label()));
                }
                Ok(MemoryCommand::Add(field, value))
            }
            "clear" => match split_word(rest) {
                (kind, "") if kind.eq_ignore_ascii_case("work") => {
                    Ok(MemoryCommand::Clear(MemoryField::WorkInProgress))
                }
                (kind, "") if kind.eq_ignore_ascii_case("loops") => {
                    Ok(MemoryCommand::Clear(MemoryField::OpenLoops))
                }
                (kind, _) => Err(format!("cannot clear '{}'", kind)),
            },
            other => Err(format!("unknown memory action '{}'", other)),
        }
    }
}

/// Split off the first whitespace-delimited word; the rest keeps its
/// inner spacing.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(line: &str) -> Command {
        match Input::parse(line) {
            Input::Command(c) => c,
            other => panic!("expected command, got {:?}", other),
        }
    }

    #[test]
    fn plain_text_is_chat() {
        assert_eq!(Input::parse("  hello there "), Input::Chat("hello there".into()));
        assert_eq!(Input::parse("   "), Input::Empty);
    }

    #[test]
    fn command_words_are_case_insensitive() {
        assert_eq!(cmd("/HELP"), Command::Help);
        assert_eq!(cmd("/Quit"), Command::Exit);
        assert_eq!(cmd("/exit"), Command::Exit);
        assert_eq!(cmd("/bootdoc"), Command::WhichBootDoc);
        assert_eq!(cmd("/which_bootdoc"), Command::WhichBootDoc);
        assert_eq!(cmd("/frobnicate now"), Command::Unknown("frobnicate".into()));
    }

    #[test]
    fn memory_forms() {
        assert_eq!(cmd("/memory"), Command::Memory(MemoryCommand::Show));
        assert_eq!(
            cmd(r#"/memory set user_profile "Backend engineer""#),
            Command::Memory(MemoryCommand::SetProfile("Backend engineer".into()))
        );
        assert_eq!(
            cmd("/memory add work 'migrate  billing'"),
            Command::Memory(MemoryCommand::Add(
                MemoryField::WorkInProgress,
                "migrate  billing".into()
            ))
        );
        assert_eq!(
            cmd("/memory ADD Loop pick a queue"),
            Command::Memory(MemoryCommand::Add(MemoryField::OpenLoops, "pick a queue".into()))
        );
        assert_eq!(
            cmd("/memory clear loops"),
            Command::Memory(MemoryCommand::Clear(MemoryField::OpenLoops))
        );
        assert_eq!(cmd("/memory update"), Command::Memory(MemoryCommand::Update));
    }

    #[test]
    fn malformed_memory_forms_ask_for_usage() {
        for line in [
            "/memory set preferences x",
            "/memory set user_profile",
            "/memory add mood happy",
            "/memory add preference \"\"",
            "/memory clear profile",
            "/memory update now",
            "/memory forget",
        ] {
            assert!(matches!(cmd(line), Command::MemoryUsage(_)), "{}", line);
        }
    }
}
