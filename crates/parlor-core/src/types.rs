//! Core types for Parlor — stored messages, conversations, and catalog rows.
//!
//! Messages are tagged by a [`Role`] enum instead of free-form role strings, so
//! a record with an unknown role fails to load instead of leaking through to the
//! provider.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils;

// ─────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────

/// Who authored a message.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored conversation message.
///
/// On disk: `{"role": "user", "content": "hi", "time": "2024-05-01 18:30:00"}`.
/// The timestamp is advisory; the store never checks ordering.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(
        rename = "time",
        default,
        skip_serializing_if = "Option::is_none",
        with = "local_time"
    )]
    pub timestamp: Option<NaiveDateTime>,
}

impl Message {
    /// Create a message without a timestamp.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
            timestamp: None,
        }
    }

    /// Create a user message stamped with the current local time.
    pub fn user(content: impl Into<String>) -> Self {
        Message::new(Role::User, content).stamped()
    }

    /// Create an assistant message stamped with the current local time.
    pub fn assistant(content: impl Into<String>) -> Self {
        Message::new(Role::Assistant, content).stamped()
    }

    fn stamped(mut self) -> Self {
        self.timestamp = Some(utils::now_local());
        self
    }

    /// Strip the timestamp, keeping what the provider needs.
    pub fn to_turn(&self) -> ChatTurn {
        ChatTurn {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// One turn of history as sent to the relay: role + content only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatTurn {
            role,
            content: content.into(),
        }
    }
}

/// Serde adapter for `"%Y-%m-%d %H:%M:%S"` timestamps.
///
/// Reading also accepts RFC 3339. An empty string is absent, and anything
/// unparsable is dropped with a warning so one bad stamp cannot hide a record.
mod local_time {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use tracing::warn;

    use crate::utils::TIME_FORMAT;

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => serializer.serialize_str(&t.format(TIME_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        let parsed = match &raw {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
            Some(Value::String(s)) => {
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, TIME_FORMAT)
                    .ok()
                    .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|t| t.naive_local()))
            }
            Some(_) => None,
        };
        if parsed.is_none() {
            warn!(time = ?raw, "Ignoring unparsable message timestamp");
        }
        Ok(parsed)
    }
}

// ─────────────────────────────────────────────
// Conversations
// ─────────────────────────────────────────────

/// Reference to an uploaded image: original filename + store reference.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageRef {
    /// Original filename as uploaded (e.g. `"beach.png"`).
    pub name: String,
    /// Reference returned by the image store (e.g. `"/images/<uuid>.png"`).
    pub url: String,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        ImageRef {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Build from the optional name/url pair used on the wire and in the index.
    ///
    /// A reference needs a url; a missing name falls back to an empty string.
    pub fn from_parts(name: Option<String>, url: Option<String>) -> Option<Self> {
        url.map(|url| ImageRef {
            name: name.unwrap_or_default(),
            url,
        })
    }
}

/// A named conversation, optionally bound to one image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationRecord {
    pub id: String,
    pub name: String,
    pub messages: Vec<Message>,
    pub image: Option<ImageRef>,
}

impl ConversationRecord {
    /// Create an empty conversation.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        ConversationRecord {
            id: id.into(),
            name: name.into(),
            messages: Vec::new(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    /// History in relay format (timestamps stripped).
    pub fn turns(&self) -> Vec<ChatTurn> {
        self.messages.iter().map(Message::to_turn).collect()
    }
}

// ─────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────

/// One row of `chats_index.json`.
///
/// Image fields are written as explicit `null` when absent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: String,
    pub name: String,
    pub file_path: PathBuf,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_name: Option<String>,
}

impl IndexEntry {
    pub fn image(&self) -> Option<ImageRef> {
        ImageRef::from_parts(self.image_name.clone(), self.image_url.clone())
    }
}

// ─────────────────────────────────────────────
// Images
// ─────────────────────────────────────────────

/// An image persisted by the image store. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAsset {
    /// Generated identifier (UUIDv4).
    pub id: String,
    /// Filename as uploaded.
    pub original_name: String,
    /// Reference handed back to callers (`/images/<id><ext>`).
    pub url: String,
    /// Where the bytes live on disk.
    pub path: PathBuf,
}

impl ImageAsset {
    pub fn image_ref(&self) -> ImageRef {
        ImageRef::new(self.original_name.clone(), self.url.clone())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
