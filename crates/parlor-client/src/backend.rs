//! Backend trait — what a session needs from wherever conversations live.

use async_trait::async_trait;

use parlor_core::{ChatTurn, ConversationRecord, FragmentStream, ImageRef, Result};

/// Persistence, upload and completion operations behind a session.
///
/// [`crate::HttpBackend`] talks to a running `parlor serve`;
/// [`crate::LocalBackend`] drives the stores and relay in-process.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Every stored conversation, catalog order.
    async fn list_conversations(&self) -> Result<Vec<ConversationRecord>>;

    /// Upsert one conversation.
    async fn save_conversation(&self, record: &ConversationRecord) -> Result<()>;

    /// Remove one conversation. `Error::NotFound` if the id is unknown.
    async fn delete_conversation(&self, id: &str) -> Result<()>;

    /// Store an image and return the reference to attach to a conversation.
    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<ImageRef>;

    /// Start a completion, image-aware when `image_url` is set.
    async fn stream_completion(
        &self,
        history: &[ChatTurn],
        image_url: Option<&str>,
    ) -> Result<FragmentStream>;

    /// Short description for status output.
    fn describe(&self) -> String;
}
