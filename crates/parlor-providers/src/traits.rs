//! Completion relay trait — the boundary to the language-model provider.
//!
//! `HttpRelay` in `http_provider.rs` covers every OpenAI-compatible API;
//! `ScriptedRelay` in `scripted.rs` replays canned fragments.

use async_trait::async_trait;
use parlor_core::{ChatTurn, FragmentStream, Result};

/// Forwards conversation history to a provider and streams the reply back.
///
/// One call produces one finite, non-restartable [`FragmentStream`]. The
/// caller is expected to have at most one call in flight per conversation.
#[async_trait]
pub trait CompletionRelay: Send + Sync {
    /// Start a completion.
    ///
    /// With `image_url = None` the history is sent as plain text. With an image
    /// the request is image-aware: the image is attached to the last user turn
    /// only.
    ///
    /// # Errors
    /// `Error::Relay` if the provider call fails before streaming starts.
    /// Failures during streaming arrive as an `Err` item on the stream.
    async fn stream_completion(
        &self,
        history: &[ChatTurn],
        image_url: Option<&str>,
    ) -> Result<FragmentStream>;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
