//! JSON bodies exchanged between the client and the backend.
//!
//! Field names follow the HTTP contract (`chat_id`, `chat_name`, `image_url`,
//! ...), which is why they differ from the internal [`ConversationRecord`].

use serde::{Deserialize, Serialize};

use crate::types::{ChatTurn, ConversationRecord, ImageAsset, ImageRef, Message};

/// Body of `POST /chat/`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatTurn>,
}

/// Body of `POST /image_recognition/`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageCompletionRequest {
    pub messages: Vec<ChatTurn>,
    pub image_url: String,
}

/// One element of the `GET /load_chat/` response.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConversationView {
    pub id: String,
    pub chat_name: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<ConversationRecord> for ConversationView {
    fn from(record: ConversationRecord) -> Self {
        let (image_name, image_url) = split_image(record.image);
        ConversationView {
            id: record.id,
            chat_name: record.name,
            messages: record.messages,
            image_name,
            image_url,
        }
    }
}

impl From<ConversationView> for ConversationRecord {
    fn from(view: ConversationView) -> Self {
        ConversationRecord {
            id: view.id,
            name: view.chat_name,
            messages: view.messages,
            image: ImageRef::from_parts(view.image_name, view.image_url),
        }
    }
}

/// Body of `POST /save_chat/`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SaveConversationRequest {
    pub chat_id: String,
    pub chat_name: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl SaveConversationRequest {
    pub fn from_record(record: &ConversationRecord) -> Self {
        let (image_name, image_url) = split_image(record.image.clone());
        SaveConversationRequest {
            chat_id: record.id.clone(),
            chat_name: record.name.clone(),
            messages: record.messages.clone(),
            image_name,
            image_url,
        }
    }

    pub fn image(&self) -> Option<ImageRef> {
        ImageRef::from_parts(self.image_name.clone(), self.image_url.clone())
    }
}

/// Body of `POST /delete_chat/`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeleteConversationRequest {
    pub chat_id: String,
}

/// Response of `POST /upload_image/`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadedImage {
    pub image_uuid: String,
    pub image_name: String,
    pub image_url: String,
}

impl UploadedImage {
    pub fn image_ref(&self) -> ImageRef {
        ImageRef::new(self.image_name.clone(), self.image_url.clone())
    }
}

impl From<ImageAsset> for UploadedImage {
    fn from(asset: ImageAsset) -> Self {
        UploadedImage {
            image_uuid: asset.id,
            image_name: asset.original_name,
            image_url: asset.url,
        }
    }
}

/// `{"message": "..."}` acknowledgement.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        StatusMessage {
            message: message.into(),
        }
    }
}

/// `{"detail": "..."}` error body.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub detail: String,
}

fn split_image(image: Option<ImageRef>) -> (Option<String>, Option<String>) {
    match image {
        Some(ImageRef { name, url }) => (Some(name), Some(url)),
        None => (None, None),
    }
}
