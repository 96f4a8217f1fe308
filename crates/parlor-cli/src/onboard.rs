//! `parlor onboard` — initialize configuration and storage.
//!
//! - Creates `~/.parlor/config.json` with defaults
//! - Creates the chat log, image and history directories

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use parlor_core::config::{get_config_path, load_config, save_config, Config};

/// Run the onboard command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "💬 Parlor — Setup".cyan().bold());
    println!();

    let config_path = get_config_path();
    let config = load_config(None);
    init(&config, &config_path)?;

    println!();
    println!(
        "{}",
        "  Setup complete! Run `parlor serve`, then `parlor chat`.".green()
    );
    println!();

    Ok(())
}

fn init(config: &Config, config_path: &Path) -> Result<()> {
    // 1. Create config if it doesn't exist
    if config_path.exists() {
        println!(
            "  {} config already exists at {}",
            "✓".green(),
            config_path.display()
        );
    } else {
        save_config(config, Some(config_path))
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        println!(
            "  {} created config at {}",
            "✓".green(),
            config_path.display()
        );
    }

    // 2. Storage directories
    let history_dir = config.storage.data_path().join("history");
    for (label, dir) in [
        ("chat logs", config.storage.chat_logs_path()),
        ("images", config.storage.images_path()),
        ("history", history_dir),
    ] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        println!("  {} {} at {}", "✓".green(), label, dir.display());
    }

    Ok(())
}
