//! Shared handler state.

use std::sync::Arc;

use parlor_core::config::Config;
use parlor_core::{ConversationStore, ImageStore, Result};
use parlor_providers::{CompletionRelay, HttpRelay};

/// Everything a handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub conversations: Arc<ConversationStore>,
    pub images: Arc<ImageStore>,
    pub relay: Arc<dyn CompletionRelay>,
}

impl AppState {
    pub fn new(
        conversations: ConversationStore,
        images: ImageStore,
        relay: Arc<dyn CompletionRelay>,
    ) -> Self {
        AppState {
            conversations: Arc::new(conversations),
            images: Arc::new(images),
            relay,
        }
    }

    /// Open the stores from the storage section and build the HTTP relay.
    pub fn from_config(config: &Config) -> Result<Self> {
        let relay = HttpRelay::new(&config.provider, &config.relay)?;
        Self::with_relay(config, Arc::new(relay))
    }

    /// Open the stores from the storage section around a given relay.
    pub fn with_relay(config: &Config, relay: Arc<dyn CompletionRelay>) -> Result<Self> {
        let conversations = ConversationStore::new(config.storage.chat_logs_path())?;
        let images = ImageStore::new(config.storage.images_path())?;
        Ok(Self::new(conversations, images, relay))
    }
}
