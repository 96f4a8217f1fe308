//! Config loader — reads `~/.parlor/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.parlor/config.json`
//! 3. Environment variables `PARLOR_<SECTION>__<FIELD>` (override JSON)
//! 4. `OPENAI_API_KEY` when no API key was set by 2 or 3

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the given path (or the default one) + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    let config = load_config_from_path(&config_path);
    let fallback_key = std::env::var("OPENAI_API_KEY").ok();
    with_fallback_api_key(apply_env_overrides(config), fallback_key)
}

/// Load config from a specific file path (no env overrides).
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            Config::default()
        }
    }
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `PARLOR_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `PARLOR_PROVIDER__API_KEY` → `provider.api_key`
/// - `PARLOR_PROVIDER__API_BASE` → `provider.api_base`
/// - `PARLOR_RELAY__MODEL` → `relay.model`
/// - `PARLOR_RELAY__VISION_MODEL` → `relay.vision_model`
/// - `PARLOR_RELAY__MAX_TOKENS` → `relay.max_tokens`
/// - `PARLOR_RELAY__TEMPERATURE` → `relay.temperature`
/// - `PARLOR_STORAGE__DATA_DIR` → `storage.data_dir`
/// - `PARLOR_SERVER__HOST` → `server.host`
/// - `PARLOR_SERVER__PORT` → `server.port`
/// - `PARLOR_CLIENT__SERVER_URL` → `client.server_url`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("PARLOR_PROVIDER__API_KEY") {
        config.provider.api_key = val;
    }
    if let Ok(val) = std::env::var("PARLOR_PROVIDER__API_BASE") {
        config.provider.api_base = Some(val);
    }

    if let Ok(val) = std::env::var("PARLOR_RELAY__MODEL") {
        config.relay.model = val;
    }
    if let Ok(val) = std::env::var("PARLOR_RELAY__VISION_MODEL") {
        config.relay.vision_model = val;
    }
    if let Ok(val) = std::env::var("PARLOR_RELAY__MAX_TOKENS") {
        if let Ok(n) = val.parse::<u32>() {
            config.relay.max_tokens = Some(n);
        }
    }
    if let Ok(val) = std::env::var("PARLOR_RELAY__TEMPERATURE") {
        if let Ok(t) = val.parse::<f64>() {
            config.relay.temperature = Some(t);
        }
    }

    if let Ok(val) = std::env::var("PARLOR_STORAGE__DATA_DIR") {
        config.storage.data_dir = val;
    }

    if let Ok(val) = std::env::var("PARLOR_SERVER__HOST") {
        config.server.host = val;
    }
    if let Ok(val) = std::env::var("PARLOR_SERVER__PORT") {
        if let Ok(p) = val.parse::<u16>() {
            config.server.port = p;
        }
    }

    if let Ok(val) = std::env::var("PARLOR_CLIENT__SERVER_URL") {
        config.client.server_url = val;
    }

    config
}

/// Use `fallback` as the API key when none is configured.
fn with_fallback_api_key(mut config: Config, fallback: Option<String>) -> Config {
    if !config.provider.is_configured() {
        if let Some(key) = fallback.filter(|k| !k.is_empty()) {
            config.provider.api_key = key;
        }
    }
    config
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json"));
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.relay.model, "gpt-3.5-turbo");
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(
            r#"{
            "relay": { "model": "gpt-4o-mini", "maxTokens": 512 },
            "server": { "port": 8080 }
        }"#,
        );

        let config = load_config_from_path(file.path());
        assert_eq!(config.relay.model, "gpt-4o-mini");
        assert_eq!(config.relay.max_tokens, Some(512));
        assert_eq!(config.server.port, 8080);
        // Default preserved
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let file = write_temp_json("not valid json {{{");
        let config = load_config_from_path(file.path());
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.relay.vision_model = "gpt-4o-2024-08-06".to_string();
        config.provider.api_key = "sk-test".to_string();

        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_from_path(&path);
        assert_eq!(reloaded.relay.vision_model, "gpt-4o-2024-08-06");
        assert_eq!(reloaded.provider.api_key, "sk-test");
    }

    #[test]
    fn test_saved_json_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        save_config(&Config::default(), Some(&path)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw["relay"].get("visionModel").is_some());
        assert!(raw["relay"].get("vision_model").is_none());
    }

    #[test]
    fn test_env_override_vision_model() {
        std::env::set_var("PARLOR_RELAY__VISION_MODEL", "llava");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.relay.vision_model, "llava");
        std::env::remove_var("PARLOR_RELAY__VISION_MODEL");
    }

    #[test]
    fn test_env_override_server_port() {
        std::env::set_var("PARLOR_SERVER__PORT", "9999");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.server.port, 9999);
        std::env::remove_var("PARLOR_SERVER__PORT");
    }

    #[test]
    fn test_env_override_ignores_unparsable_numbers() {
        std::env::set_var("PARLOR_RELAY__MAX_TOKENS", "lots");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.relay.max_tokens, None);
        std::env::remove_var("PARLOR_RELAY__MAX_TOKENS");
    }

    #[test]
    fn test_fallback_api_key_only_when_unset() {
        let config = with_fallback_api_key(Config::default(), Some("sk-env".into()));
        assert_eq!(config.provider.api_key, "sk-env");

        let mut configured = Config::default();
        configured.provider.api_key = "sk-file".into();
        let config = with_fallback_api_key(configured, Some("sk-env".into()));
        assert_eq!(config.provider.api_key, "sk-file");

        let config = with_fallback_api_key(Config::default(), Some(String::new()));
        assert!(!config.provider.is_configured());
    }
}
