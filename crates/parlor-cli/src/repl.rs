//! Interactive chat REPL.
//!
//! Uses `rustyline` for readline-style editing with persistent history.
//! Plain lines are submitted as user turns; lines starting with `/` manage
//! the conversation catalog.

use std::io::Write;

use anyhow::Result;
use colored::Colorize;
use rustyline::config::Configurer;
use rustyline::history::DefaultHistory;
use rustyline::{DefaultEditor, Editor};
use tracing::debug;

use parlor_client::SessionClient;
use parlor_core::{utils, Role};

use crate::helpers;

/// Exit commands (case-insensitive match).
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

const HELP: &str = "\
/new NAME            start a conversation
/image PATH NAME     start a conversation about an image (png, jpg, jpeg, webp, gif)
/list                show all conversations
/select N|ID         switch conversation (number from /list, or id)
/delete              delete the current conversation
/help                show this help
exit                 quit";

/// One parsed line of input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    New(&'a str),
    Image { path: &'a str, name: &'a str },
    List,
    Select(&'a str),
    Delete,
    Help,
    Exit,
    /// A `/command` that could not be parsed; carries the usage hint.
    Invalid(&'static str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if is_exit_command(line) {
        return Input::Exit;
    }
    if !line.starts_with('/') {
        return Input::Message(line);
    }

    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match command {
        "/new" if !rest.is_empty() => Input::New(rest),
        "/new" => Input::Invalid("usage: /new NAME"),
        "/image" => match rest.split_once(' ') {
            Some((path, name)) if !name.trim().is_empty() => Input::Image {
                path,
                name: name.trim(),
            },
            _ => Input::Invalid("usage: /image PATH NAME"),
        },
        "/list" => Input::List,
        "/select" if !rest.is_empty() => Input::Select(rest),
        "/select" => Input::Invalid("usage: /select N|ID"),
        "/delete" => Input::Delete,
        "/help" => Input::Help,
        _ => Input::Invalid("unknown command, try /help"),
    }
}

/// Run the interactive REPL loop on a loaded session.
pub async fn run(mut session: SessionClient) -> Result<()> {
    helpers::print_banner(&session.backend().describe());
    show_selected(&mut session).await;

    let mut editor = create_editor()?;

    loop {
        let input = match editor.readline("You: ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Interrupted) => {
                // Ctrl-C
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                // Ctrl-D
                break;
            }
            Err(e) => {
                eprintln!("Input error: {e}");
                break;
            }
        };

        if input.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(&input);

        match parse_input(&input) {
            Input::Exit => {
                println!("\nGoodbye! 👋");
                break;
            }
            Input::Message(text) => submit(&mut session, text).await,
            Input::New(name) => match session.create_conversation(name).await {
                Ok(_) => show_selected(&mut session).await,
                Err(e) => helpers::print_error(&e),
            },
            Input::Image { path, name } => create_with_image(&mut session, path, name).await,
            Input::List => helpers::print_catalog(session.conversations(), session.selected_id()),
            Input::Select(target) => {
                let id = resolve_target(&session, target);
                match session.select_conversation(&id) {
                    Ok(()) => show_selected(&mut session).await,
                    Err(e) => helpers::print_error(&e),
                }
            }
            Input::Delete => {
                if let Err(e) = session.delete_conversation().await {
                    helpers::print_error(&e);
                }
                show_selected(&mut session).await;
            }
            Input::Help => println!("{}\n", HELP.dimmed()),
            Input::Invalid(hint) => println!("{}\n", hint.yellow()),
        }
    }

    save_history(&mut editor);

    Ok(())
}

/// Submit a turn, printing fragments as they arrive.
async fn submit(session: &mut SessionClient, text: &str) {
    if session.selected_id().is_none() {
        println!("{}\n", "No chat selected. Use /new NAME to start one.".yellow());
        return;
    }

    debug!(input = text, "submitting turn");
    helpers::print_thinking();

    let mut printed = 0usize;
    let result = session
        .submit_user_turn(text, |reply| {
            if printed == 0 {
                helpers::clear_thinking();
                println!("{}", helpers::speaker(Role::Assistant));
            }
            print!("{}", &reply[printed..]);
            let _ = std::io::stdout().flush();
            printed = reply.len();
        })
        .await;

    if printed == 0 {
        helpers::clear_thinking();
    }
    match result {
        Ok(_) => println!("\n"),
        Err(e) => helpers::print_error(&e),
    }
}

async fn create_with_image(session: &mut SessionClient, path: &str, name: &str) {
    let path = helpers::expand_tilde(path);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let Some(content_type) = utils::image_content_type(&file_name) else {
        helpers::print_error(&format!("unsupported image type: {}", path.display()));
        return;
    };
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            helpers::print_error(&format!("cannot read {}: {e}", path.display()));
            return;
        }
    };

    match session
        .create_conversation_with_image(name, bytes, &file_name, content_type)
        .await
    {
        Ok(_) => show_selected(&mut *session).await,
        Err(e) => helpers::print_error(&e),
    }
}

/// Map a `/select` argument (1-based position or id) to an id.
fn resolve_target(session: &SessionClient, target: &str) -> String {
    target
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| session.conversations().get(i))
        .map(|record| record.id.clone())
        .unwrap_or_else(|| target.to_string())
}

/// Greet the selected conversation if it is empty, then print it.
async fn show_selected(session: &mut SessionClient) {
    if let Err(e) = session.ensure_greeting().await {
        helpers::print_error(&e);
    }
    match session.selected() {
        Some(record) => helpers::print_conversation(record),
        None => println!(
            "{}\n",
            "No chat selected. Use /new NAME or /image PATH NAME to start one.".dimmed()
        ),
    }
}

/// Create a rustyline editor with history.
fn create_editor() -> Result<Editor<(), DefaultHistory>> {
    let mut editor = DefaultEditor::new()?;
    editor.set_max_history_size(1000)?;

    let history_path = history_path();
    if history_path.exists() {
        let _ = editor.load_history(&history_path);
        debug!("loaded REPL history from {}", history_path.display());
    }

    Ok(editor)
}

/// Save history to disk.
fn save_history(editor: &mut Editor<(), DefaultHistory>) {
    let path = history_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = editor.save_history(&path) {
        debug!("failed to save history: {e}");
    }
}

/// Path to the history file.
fn history_path() -> std::path::PathBuf {
    utils::get_data_path().join("history").join("chat_history")
}

/// Check if input is an exit command.
fn is_exit_command(input: &str) -> bool {
    let lower = input.to_lowercase();
    EXIT_COMMANDS.contains(&lower.as_str())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
