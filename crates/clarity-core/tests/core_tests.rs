//! Tests for clarity-core: message types, transcript helpers, config loading, errors

use clarity_core::*;
use std::path::Path;
use tempfile::TempDir;

// ===========================================================================
// Role / Message
// ===========================================================================

#[test]
fn role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
    let back: Role = serde_json::from_str(r#""user""#).unwrap();
    assert_eq!(back, Role::User);
}

#[test]
fn role_labels_are_uppercase() {
    assert_eq!(Role::User.label(), "USER");
    assert_eq!(Role::Assistant.label(), "ASSISTANT");
    assert_eq!(Role::System.label(), "SYSTEM");
}

#[test]
fn message_constructors_set_role() {
    assert_eq!(Message::system("s").role, Role::System);
    assert_eq!(Message::user("u").role, Role::User);
    assert_eq!(Message::assistant("a").role, Role::Assistant);
    assert!(!Message::system("s").is_turn());
    assert!(Message::user("u").is_turn());
}

#[test]
fn message_serde_keeps_timestamp() {
    let msg = Message::user("hello");
    let json = serde_json::to_string(&msg).unwrap();
    let back: Message = serde_json::from_str(&json).unwrap();
    assert_eq!(back, msg);
}

// ===========================================================================
// Exchange counting / transcript
// ===========================================================================

#[test]
fn count_exchanges_counts_user_assistant_pairs() {
    let messages = vec![
        Message::system("boot"),
        Message::user("a"),
        Message::assistant("b"),
        Message::user("c"),
        Message::assistant("d"),
        Message::user("dangling"),
    ];
    assert_eq!(count_exchanges(&messages), 2);
    assert_eq!(count_exchanges(&messages[3..]), 1);
    assert_eq!(count_exchanges(&[]), 0);
}

#[test]
fn format_transcript_skips_system() {
    let messages = vec![
        Message::system("boot"),
        Message::user("I prefer dark mode"),
        Message::assistant("Noted."),
    ];
    assert_eq!(
        format_transcript(&messages),
        "USER: I prefer dark mode\nASSISTANT: Noted."
    );
}

// ===========================================================================
// ChatConfig
// ===========================================================================

#[test]
fn missing_config_uses_defaults_resolved_against_root() {
    let tmp = TempDir::new().unwrap();
    let config = ChatConfig::load(&tmp.path().join("config/config.json"), tmp.path()).unwrap();
    assert_eq!(config.model, "gpt-4");
    assert_eq!(
        config.boot_doc_path,
        tmp.path().join("bootdocs/clarity_os_boot_v1.txt")
    );
    assert_eq!(config.logs_dir, tmp.path().join("logs"));
    assert_eq!(config.memory.dir, tmp.path().join("memory"));
    assert!(!config.memory_enabled());
}

#[test]
fn malformed_config_is_a_config_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = ChatConfig::load(&path, tmp.path()).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {:?}", err);
}

#[test]
fn out_of_range_temperature_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.json");
    std::fs::write(&path, r#"{"temperature": 3.5}"#).unwrap();
    let err = ChatConfig::load(&path, tmp.path()).unwrap_err();
    assert!(err.to_string().contains("temperature"));
}

#[test]
fn zero_max_tokens_is_rejected() {
    let config = ChatConfig {
        max_tokens: 0,
        ..Default::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn absolute_boot_doc_path_is_kept() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("config.json");
    std::fs::write(&path, r#"{"boot_doc_path": "/etc/boot.txt"}"#).unwrap();
    let config = ChatConfig::load(&path, Path::new("/somewhere")).unwrap();
    assert_eq!(config.boot_doc_path, Path::new("/etc/boot.txt"));
}

#[test]
fn unknown_config_keys_are_ignored() {
    let config = ChatConfig::parse(r#"{"model": "gpt-4o", "theme": "dark"}"#, false).unwrap();
    assert_eq!(config.model, "gpt-4o");
}

#[test]
fn explicit_provider_overrides_inference() {
    let config = ChatConfig::parse(r#"{"model": "claude-custom", "provider": "openai"}"#, false)
        .unwrap();
    assert_eq!(config.chat_provider(), ProviderKind::OpenAi);
    assert_eq!(config.chat_provider().api_key_var(), "OPENAI_API_KEY");
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_display_messages() {
    let e = Error::remote_call("openai", "timeout");
    assert_eq!(e.to_string(), "remote call failed: openai - timeout");

    let e = Error::boot_doc(Path::new("/x/boot.txt"), "not found");
    assert_eq!(e.to_string(), "boot document error: /x/boot.txt: not found");

    let e = Error::parse("missing preferences");
    assert_eq!(e.to_string(), "parse error: missing preferences");
}

#[test]
fn io_error_converts() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let e: Error = io.into();
    assert!(matches!(e, Error::Io(_)));
}
