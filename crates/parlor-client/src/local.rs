//! In-process backend — the stores and relay without an HTTP hop.

use std::sync::Arc;

use async_trait::async_trait;

use parlor_core::config::Config;
use parlor_core::{
    ChatTurn, ConversationRecord, ConversationStore, FragmentStream, ImageRef, ImageStore, Result,
};
use parlor_providers::{CompletionRelay, HttpRelay};

use crate::backend::Backend;

pub struct LocalBackend {
    conversations: ConversationStore,
    images: ImageStore,
    relay: Arc<dyn CompletionRelay>,
}

impl LocalBackend {
    pub fn new(
        conversations: ConversationStore,
        images: ImageStore,
        relay: Arc<dyn CompletionRelay>,
    ) -> Self {
        LocalBackend {
            conversations,
            images,
            relay,
        }
    }

    /// Stores from the storage section, HTTP relay from the provider section.
    pub fn from_config(config: &Config) -> Result<Self> {
        let relay = HttpRelay::new(&config.provider, &config.relay)?;
        Ok(Self::new(
            ConversationStore::new(config.storage.chat_logs_path())?,
            ImageStore::new(config.storage.images_path())?,
            Arc::new(relay),
        ))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn list_conversations(&self) -> Result<Vec<ConversationRecord>> {
        self.conversations.list_all().await
    }

    async fn save_conversation(&self, record: &ConversationRecord) -> Result<()> {
        self.conversations.save(record).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.conversations.delete(id).await
    }

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<ImageRef> {
        let asset = self.images.store(&bytes, content_type, file_name).await?;
        Ok(asset.image_ref())
    }

    async fn stream_completion(
        &self,
        history: &[ChatTurn],
        image_url: Option<&str>,
    ) -> Result<FragmentStream> {
        match image_url {
            Some(url) => {
                let url = self.images.provider_url(url).await?;
                self.relay.stream_completion(history, Some(url.as_str())).await
            }
            None => self.relay.stream_completion(history, None).await,
        }
    }

    fn describe(&self) -> String {
        format!(
            "local ({}, relay {})",
            self.conversations.logs_dir().display(),
            self.relay.display_name()
        )
    }
}
