//! `parlor status` — show configuration and storage status.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use parlor_core::config::{get_config_path, load_config};

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let config_path = get_config_path();

    println!();
    println!("{}", "💬 Parlor Status".cyan().bold());
    println!();

    print_path("Config:", &config_path);
    print_path("Chat logs:", &config.storage.chat_logs_path());
    print_path("Images:", &config.storage.images_path());

    // Models
    println!();
    println!("  {:<18} {}", "Model:".bold(), config.relay.model);
    println!("  {:<18} {}", "Vision model:".bold(), config.relay.vision_model);
    let max_tokens = config
        .relay
        .max_tokens
        .map(|n| n.to_string())
        .unwrap_or_else(|| "provider default".into());
    let temperature = config
        .relay
        .temperature
        .map(|t| t.to_string())
        .unwrap_or_else(|| "provider default".into());
    println!(
        "  {:<18} {} | {}",
        "Parameters:".bold(),
        format!("temp: {temperature}").dimmed(),
        format!("max_tokens: {max_tokens}").dimmed(),
    );

    // Provider
    println!();
    let key_status = if config.provider.is_configured() {
        format!("{} (key set)", "✓".green())
    } else {
        format!("{}", "· not configured".dimmed())
    };
    println!("  {:<18} {}", "API key:".bold(), key_status);
    println!(
        "  {:<18} {}",
        "API base:".bold(),
        config
            .provider
            .api_base
            .as_deref()
            .unwrap_or(parlor_providers::http_provider::DEFAULT_API_BASE)
    );

    // Network
    println!();
    println!("  {:<18} {}", "Server bind:".bold(), config.server.bind_addr());
    println!("  {:<18} {}", "Client target:".bold(), config.client.server_url);

    println!();

    Ok(())
}

fn print_path(label: &str, path: &Path) {
    println!(
        "  {:<18} {} {}",
        label.bold(),
        path.display(),
        if path.exists() {
            "✓".green().to_string()
        } else {
            "(not found)".red().to_string()
        }
    );
}
