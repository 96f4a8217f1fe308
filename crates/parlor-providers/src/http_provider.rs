//! Streaming HTTP relay for OpenAI-compatible `/chat/completions` APIs.
//!
//! The request is sent with `stream: true`; the response body is read chunk
//! by chunk in a spawned task that forwards every text delta into a
//! [`FragmentStream`] the moment it is decoded.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, warn};

use parlor_core::config::{ProviderConfig, RelayConfig};
use parlor_core::stream::FRAGMENT_BUFFER;
use parlor_core::utils::truncate_string;
use parlor_core::{fragment_channel, ChatTurn, Error, FragmentSender, FragmentStream, Result};

use crate::request::{image_messages, plain_messages, ChatCompletionRequest, SseDecoder, SseEvent};
use crate::traits::CompletionRelay;

/// API base used when none is configured.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

// ─────────────────────────────────────────────
// HttpRelay
// ─────────────────────────────────────────────

/// Relay that talks to any OpenAI-compatible HTTP API.
pub struct HttpRelay {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// API key for Bearer authentication.
    api_key: String,
    /// Model for plain requests.
    model: String,
    /// Model for image-aware requests.
    vision_model: String,
    max_tokens: Option<u32>,
    temperature: Option<f64>,
    /// Extra headers to send with each request.
    extra_headers: HeaderMap,
}

impl std::fmt::Debug for HttpRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRelay")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .finish()
    }
}

impl HttpRelay {
    /// Create a relay from the provider connection and model settings.
    pub fn new(provider: &ProviderConfig, relay: &RelayConfig) -> Result<Self> {
        let api_base = provider
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = provider.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}={}", key, value);
                }
            }
        }

        // No overall timeout: a completion stream runs until the provider ends it.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Relay(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpRelay {
            client,
            api_base,
            api_key: provider.api_key.clone(),
            model: relay.model.clone(),
            vision_model: relay.vision_model.clone(),
            max_tokens: relay.max_tokens,
            temperature: relay.temperature,
            extra_headers,
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    /// Shape the request body: plain, or image-aware with the vision model.
    fn build_request(&self, history: &[ChatTurn], image_url: Option<&str>) -> ChatCompletionRequest {
        let (model, messages) = match image_url {
            Some(url) => (&self.vision_model, image_messages(history, url)),
            None => (&self.model, plain_messages(history)),
        };
        ChatCompletionRequest {
            model: model.clone(),
            messages,
            stream: true,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl CompletionRelay for HttpRelay {
    async fn stream_completion(
        &self,
        history: &[ChatTurn],
        image_url: Option<&str>,
    ) -> Result<FragmentStream> {
        let body = self.build_request(history, image_url);

        debug!(
            model = %body.model,
            messages = body.messages.len(),
            image = image_url.is_some(),
            "Calling provider"
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .headers(self.extra_headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                Error::Relay(format!("error calling provider: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(status = %status, body = %truncate_string(&error_text, 500), "Provider API error");
            return Err(Error::Relay(format!(
                "provider returned {}: {}",
                status, error_text
            )));
        }

        let (tx, stream) = fragment_channel(FRAGMENT_BUFFER);
        tokio::spawn(pump(response, tx));
        Ok(stream)
    }

    fn display_name(&self) -> &str {
        "OpenAI-compatible"
    }
}

/// Read the response body and forward decoded fragments until the provider
/// finishes, fails, or the consumer goes away.
async fn pump(response: reqwest::Response, tx: FragmentSender) {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::default();
    let mut forwarded = 0usize;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, forwarded, "Provider stream broke");
                tx.fail(Error::Relay(format!("stream interrupted: {e}"))).await;
                return;
            }
        };

        for event in decoder.push(&chunk) {
            if !deliver(&tx, event, &mut forwarded).await {
                return;
            }
        }
    }

    if let Some(event) = decoder.finish() {
        deliver(&tx, event, &mut forwarded).await;
    }
    debug!(forwarded, "Provider stream finished");
}

/// Forward one event; returns `false` when pumping should stop.
async fn deliver(tx: &FragmentSender, event: SseEvent, forwarded: &mut usize) -> bool {
    match event {
        SseEvent::Fragment(text) => {
            if tx.send(text).await {
                *forwarded += 1;
                true
            } else {
                debug!(forwarded = *forwarded, "Consumer cancelled stream");
                false
            }
        }
        SseEvent::Done => false,
        SseEvent::Error(message) => {
            warn!(error = %message, "Provider reported stream error");
            tx.fail(Error::Relay(message)).await;
            false
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
