//! Parlor CLI — entry point.
//!
//! # Commands
//!
//! - `parlor serve [--host H] [--port P]` — run the HTTP backend
//! - `parlor chat [--server URL | --local]` — interactive chat REPL
//! - `parlor list [--server URL | --local]` — print the conversation catalog
//! - `parlor onboard` — write default config and create storage dirs
//! - `parlor status` — show configuration and storage status

mod helpers;
mod onboard;
mod repl;
mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use parlor_client::{Backend, HttpBackend, LocalBackend, SessionClient};
use parlor_core::config::{load_config, Config};
use parlor_providers::{CompletionRelay, ScriptedRelay};
use parlor_server::AppState;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 💬 Parlor — conversational assistant with persistent chats
#[derive(Parser)]
#[command(name = "parlor", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP backend
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Answer every turn with TEXT instead of calling the provider
        #[arg(long, value_name = "TEXT")]
        scripted: Option<String>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Chat interactively
    Chat {
        /// Backend URL (overrides config)
        #[arg(short, long, conflicts_with = "local")]
        server: Option<String>,

        /// Use the stores and provider in-process instead of a server
        #[arg(long, default_value_t = false)]
        local: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Print the conversation catalog
    List {
        /// Backend URL (overrides config)
        #[arg(short, long, conflicts_with = "local")]
        server: Option<String>,

        /// Read the local stores instead of a server
        #[arg(long, default_value_t = false)]
        local: bool,
    },

    /// Write default configuration and create storage directories
    Onboard,

    /// Show configuration and storage status
    Status,
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            scripted,
            logs,
        } => {
            init_logging(logs, "info");
            run_serve(host, port, scripted).await
        }
        Commands::Chat {
            server,
            local,
            logs,
        } => {
            init_logging(logs, "warn");
            let session = open_session(server, local).await?;
            repl::run(session).await
        }
        Commands::List { server, local } => {
            init_logging(false, "warn");
            let session = open_session(server, local).await?;
            helpers::print_catalog(session.conversations(), None);
            Ok(())
        }
        Commands::Onboard => onboard::run(),
        Commands::Status => status::run(),
    }
}

// ─────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────

async fn run_serve(host: Option<String>, port: Option<u16>, scripted: Option<String>) -> Result<()> {
    let mut config = load_config(None);
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let state = match scripted {
        Some(text) => {
            let relay = ScriptedRelay::new(text.split_inclusive(' '));
            AppState::with_relay(&config, Arc::new(relay) as Arc<dyn CompletionRelay>)
        }
        None => {
            if !config.provider.is_configured() {
                tracing::warn!("No API key configured; completions will fail");
            }
            AppState::from_config(&config)
        }
    }
    .context("failed to open storage")?;

    let addr = config.server.bind_addr();
    info!(addr = %addr, data = %config.storage.data_path().display(), "Starting backend");
    parlor_server::run(state, &addr)
        .await
        .with_context(|| format!("server on {addr} failed"))
}

/// Build the backend and load the catalog once.
async fn open_session(server: Option<String>, local: bool) -> Result<SessionClient> {
    let config = load_config(None);
    let backend = build_backend(&config, server, local)?;

    let mut session = SessionClient::new(backend);
    session
        .load()
        .await
        .context("failed to load conversations")?;
    Ok(session)
}

fn build_backend(config: &Config, server: Option<String>, local: bool) -> Result<Arc<dyn Backend>> {
    if local {
        let backend = LocalBackend::from_config(config).context("failed to open local storage")?;
        return Ok(Arc::new(backend));
    }
    let url = server.unwrap_or_else(|| config.client.server_url.clone());
    let backend = HttpBackend::new(url).context("failed to create HTTP client")?;
    Ok(Arc::new(backend))
}

/// Initialize tracing/logging. `quiet` is the filter used without `--logs`.
fn init_logging(verbose: bool, quiet: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("parlor=debug,parlor_core=debug,parlor_providers=debug,parlor_server=debug,parlor_client=debug,tower_http=debug,info")
    } else {
        EnvFilter::new(quiet)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
