//! Provider wire format — request shaping and server-sent event decoding.
//!
//! Requests follow the OpenAI chat completions format. Plain requests send
//! every turn as a text string; image-aware requests send user turns as
//! multipart content and attach the image to the last user turn only.

use serde::{Deserialize, Serialize};

use parlor_core::{ChatTurn, Role};

// ─────────────────────────────────────────────
// Request body
// ─────────────────────────────────────────────

/// A chat message in the provider's format.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ProviderMessage {
    User { content: MessageContent },
    Assistant { content: String },
}

/// User message content: plain text, or multipart for vision.
///
/// When serialized: text becomes a plain string, parts become an array of objects.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single part of a multipart message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    /// Image URL part (can be a URL or base64 data URI).
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

/// Image URL payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

/// Request body for a streaming chat completion.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ProviderMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Map history to provider messages, every turn as plain text.
pub fn plain_messages(history: &[ChatTurn]) -> Vec<ProviderMessage> {
    history
        .iter()
        .map(|turn| match turn.role {
            Role::User => ProviderMessage::User {
                content: MessageContent::Text(turn.content.clone()),
            },
            Role::Assistant => ProviderMessage::Assistant {
                content: turn.content.clone(),
            },
        })
        .collect()
}

/// Map history to provider messages with `image_url` attached to the last
/// user turn. Earlier user turns carry a single text part.
pub fn image_messages(history: &[ChatTurn], image_url: &str) -> Vec<ProviderMessage> {
    let last_user = history.iter().rposition(|turn| turn.role == Role::User);

    history
        .iter()
        .enumerate()
        .map(|(i, turn)| match turn.role {
            Role::User => {
                let mut parts = vec![ContentPart::Text {
                    text: turn.content.clone(),
                }];
                if Some(i) == last_user {
                    parts.push(ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_url.to_string(),
                        },
                    });
                }
                ProviderMessage::User {
                    content: MessageContent::Parts(parts),
                }
            }
            Role::Assistant => ProviderMessage::Assistant {
                content: turn.content.clone(),
            },
        })
        .collect()
}

// ─────────────────────────────────────────────
// Streaming response
// ─────────────────────────────────────────────

/// One `data:` payload of a streaming completion.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}

/// What one line of the event stream means for the consumer.
#[derive(Debug, PartialEq, Eq)]
pub enum SseEvent {
    /// A non-empty text delta to forward.
    Fragment(String),
    /// `data: [DONE]`.
    Done,
    /// The provider reported an error inside the stream.
    Error(String),
}

/// Interpret one line of a server-sent event stream.
///
/// Comments, blank lines, `event:` lines, role-only and empty deltas all map
/// to `None`.
pub fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let data = line.trim_end_matches('\r').strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    if data.is_empty() {
        return None;
    }

    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => return Some(SseEvent::Error(format!("malformed stream chunk: {e}"))),
    };

    if let Some(err) = chunk.error {
        return Some(SseEvent::Error(err.message));
    }

    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty())
        .map(SseEvent::Fragment)
}

/// Splits a byte stream into lines and decodes them as events.
///
/// Bytes are buffered until a full line arrives, so a multi-byte character
/// split across network chunks is decoded intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a network chunk, returning the events of every completed line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            events.extend(parse_sse_line(&line));
        }
        events
    }

    /// Flush a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        parse_sse_line(&line)
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
