//! Configuration schema.
//!
//! Hierarchy: `Config` → `ProviderConfig`, `RelayConfig`, `StorageConfig`,
//! `ServerConfig`, `ClientConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration, loaded from `~/.parlor/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub relay: RelayConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

// ─────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────

/// Connection settings for the OpenAI-compatible completion endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for Bearer authentication.
    pub api_key: String,
    /// Custom API base URL (defaults to `https://api.openai.com/v1`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// Whether an API key is configured.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Relay
// ─────────────────────────────────────────────

/// Model selection and sampling for completion streams.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    /// Model for plain conversations.
    pub model: String,
    /// Model for conversations with an attached image.
    pub vision_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            vision_model: "gpt-4o".to_string(),
            max_tokens: None,
            temperature: None,
        }
    }
}

// ─────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────

/// Where conversations and images live. `~` is expanded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Overrides `<dataDir>/chat_logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_logs_dir: Option<String>,
    /// Overrides `<dataDir>/images`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.parlor".to_string(),
            chat_logs_dir: None,
            images_dir: None,
        }
    }
}

impl StorageConfig {
    pub fn data_path(&self) -> PathBuf {
        utils::expand_home(&self.data_dir)
    }

    pub fn chat_logs_path(&self) -> PathBuf {
        match &self.chat_logs_dir {
            Some(dir) => utils::expand_home(dir),
            None => self.data_path().join("chat_logs"),
        }
    }

    pub fn images_path(&self) -> PathBuf {
        match &self.images_dir {
            Some(dir) => utils::expand_home(dir),
            None => self.data_path().join("images"),
        }
    }
}

// ─────────────────────────────────────────────
// Server / Client
// ─────────────────────────────────────────────

/// HTTP backend bind address.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where the chat client finds the backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    pub server_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
