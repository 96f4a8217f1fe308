//! Shared CLI helpers — path expansion, conversation printing, banner.

use std::path::PathBuf;

use colored::Colorize;

use parlor_core::{ConversationRecord, Message, Role};

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Print the banner shown at REPL start.
pub fn print_banner(backend: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "💬 Parlor".cyan().bold(), version.dimmed());
    println!("{}", format!("Connected to {backend}").dimmed());
    println!(
        "{}",
        "Type a message, /help for commands, or \"exit\" to quit.".dimmed()
    );
    println!();
}

/// Print the catalog, marking the selected conversation.
pub fn print_catalog(conversations: &[ConversationRecord], selected: Option<&str>) {
    if conversations.is_empty() {
        println!("{}", "(no conversations)".dimmed());
        return;
    }
    for (i, record) in conversations.iter().enumerate() {
        let marker = if Some(record.id.as_str()) == selected {
            "▸".green().to_string()
        } else {
            " ".to_string()
        };
        let image = record
            .image
            .as_ref()
            .map(|image| format!(" 🖼 {}", image.name).dimmed().to_string())
            .unwrap_or_default();
        println!(
            "{} {:>2}. {}{}  {}",
            marker,
            i + 1,
            record.name.bold(),
            image,
            format!("{} messages", record.messages.len()).dimmed()
        );
    }
}

/// Print a conversation header followed by its messages.
pub fn print_conversation(record: &ConversationRecord) {
    println!();
    println!("{} {}", "Current chat:".bold(), record.name.cyan());
    if let Some(ref image) = record.image {
        println!("{} {}", "Associated image:".bold(), image.name);
    }
    println!();
    for message in &record.messages {
        print_message(message);
    }
}

pub fn print_message(message: &Message) {
    let time = message
        .timestamp
        .map(|t| t.format(parlor_core::utils::TIME_FORMAT).to_string())
        .unwrap_or_default();
    println!("{} {}", speaker(message.role), time.dimmed());
    println!("{}", message.content);
    println!();
}

/// Label printed before a message or a streamed reply.
pub fn speaker(role: Role) -> colored::ColoredString {
    match role {
        Role::User => "You".green().bold(),
        Role::Assistant => "Assistant".cyan().bold(),
    }
}

/// Print a "thinking" placeholder until the first fragment arrives.
pub fn print_thinking() {
    eprint!("{}", "⠿ thinking...".dimmed());
}

/// Clear the "thinking" placeholder.
pub fn clear_thinking() {
    eprint!("\r{}\r", " ".repeat(40));
}

pub fn print_error(err: &dyn std::fmt::Display) {
    eprintln!("\n❌ Error: {err}\n");
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
