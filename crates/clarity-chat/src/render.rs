//! Text shown to the user for help and memory display

use chrono::Local;
use clarity_memory::MemoryRecord;

const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show this help message"),
    ("/exit", "Exit the program (saves memory)"),
    ("/quit", "Alias for /exit"),
    ("/reset", "Clear conversation history"),
    ("/reload", "Reload the boot document"),
    ("/which_bootdoc", "Print current boot document path (alias: /bootdoc)"),
];

const MEMORY_COMMANDS: &[(&str, &str)] = &[
    ("/memory", "Show current memory state"),
    ("/memory set user_profile <text>", "Set your profile"),
    ("/memory add preference|work|loop <text>", "Remember an item"),
    ("/memory clear work|loops", "Forget all work items or open loops"),
    ("/memory update", "Extract memory from this conversation now"),
];

/// Command menu. Memory commands are listed only when memory is on.
pub fn help_text(memory: Option<&MemoryRecord>) -> String {
    let mut rows: Vec<(&str, &str)> = COMMANDS.to_vec();
    if memory.is_some() {
        rows.extend_from_slice(MEMORY_COMMANDS);
    }
    let width = rows.iter().map(|(c, _)| c.len()).max().unwrap_or(0);

    let mut out = String::from("Available commands:");
    for (command, description) in rows {
        out.push_str(&format!("\n  {:<width$}  - {}", command, description, width = width));
    }
    if let Some(record) = memory {
        out.push_str(&format!(
            "\n\nLong-term memory is enabled (last updated: {})",
            last_updated(record, "never")
        ));
    }
    out
}

/// `/memory` display.
pub fn memory_text(record: &MemoryRecord) -> String {
    if record.is_empty() {
        return "No long-term memory yet. Share something about yourself or your work, \
                or use /memory add."
            .into();
    }

    let mut out = String::from("=== Long-term Memory ===");
    out.push_str(&format!("\nLast updated: {}", last_updated(record, "unknown")));
    let profile = record.user_profile.trim();
    out.push_str(&format!(
        "\nUser profile: {}",
        if profile.is_empty() { "Not specified" } else { profile }
    ));
    list(&mut out, "Preferences", &record.preferences);
    list(&mut out, "Work in progress", &record.work_in_progress);
    list(&mut out, "Open loops", &record.open_loops);
    out
}

fn list(out: &mut String, title: &str, items: &[String]) {
    out.push_str(&format!("\n\n{}:", title));
    if items.is_empty() {
        out.push_str(" None");
    }
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("\n  {}. {}", i + 1, item));
    }
}

fn last_updated(record: &MemoryRecord, missing: &str) -> String {
    record
        .last_updated
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| missing.to_string())
}
