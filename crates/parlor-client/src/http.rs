//! HTTP backend — talks to a running `parlor serve` over its JSON API.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use tracing::{debug, warn};

use parlor_core::api::{
    CompletionRequest, ConversationView, DeleteConversationRequest, ErrorBody,
    ImageCompletionRequest, SaveConversationRequest, UploadedImage,
};
use parlor_core::stream::FRAGMENT_BUFFER;
use parlor_core::{
    fragment_channel, ChatTurn, ConversationRecord, Error, FragmentSender, FragmentStream,
    ImageRef, Result,
};

use crate::backend::Backend;

/// Client for the backend's HTTP API.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        // Completions stream for as long as the provider talks; only connecting is bounded.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Storage(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpBackend {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Storage(format!("backend unreachable: {e}")))?;
        check_status(response).await
    }
}

/// Turn a non-2xx response into the matching error kind.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.detail)
        .unwrap_or(text);
    warn!(status = %status, detail = %detail, "Backend request failed");

    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Error::Validation(detail),
        StatusCode::BAD_GATEWAY => Error::Relay(detail),
        _ => Error::Storage(format!("backend returned {status}: {detail}")),
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_conversations(&self) -> Result<Vec<ConversationRecord>> {
        let response = self.send(self.client.get(self.url("/load_chat/"))).await?;
        let views: Vec<ConversationView> = response
            .json()
            .await
            .map_err(|e| Error::Storage(format!("invalid catalog response: {e}")))?;
        debug!(count = views.len(), "Loaded conversations");
        Ok(views.into_iter().map(ConversationRecord::from).collect())
    }

    async fn save_conversation(&self, record: &ConversationRecord) -> Result<()> {
        let body = SaveConversationRequest::from_record(record);
        self.send(self.client.post(self.url("/save_chat/")).json(&body))
            .await?;
        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> Result<()> {
        let body = DeleteConversationRequest {
            chat_id: id.to_string(),
        };
        self.send(self.client.post(self.url("/delete_chat/")).json(&body))
            .await?;
        Ok(())
    }

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> Result<ImageRef> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| Error::Validation(format!("invalid content type '{content_type}': {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .send(self.client.post(self.url("/upload_image/")).multipart(form))
            .await?;
        let uploaded: UploadedImage = response
            .json()
            .await
            .map_err(|e| Error::Storage(format!("invalid upload response: {e}")))?;
        Ok(uploaded.image_ref())
    }

    async fn stream_completion(
        &self,
        history: &[ChatTurn],
        image_url: Option<&str>,
    ) -> Result<FragmentStream> {
        let request = match image_url {
            Some(url) => self.client.post(self.url("/image_recognition/")).json(
                &ImageCompletionRequest {
                    messages: history.to_vec(),
                    image_url: url.to_string(),
                },
            ),
            None => self.client.post(self.url("/chat/")).json(&CompletionRequest {
                messages: history.to_vec(),
            }),
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Relay(format!("backend unreachable: {e}")))?;
        let response = check_status(response).await?;

        let (tx, stream) = fragment_channel(FRAGMENT_BUFFER);
        tokio::spawn(pump(response, tx));
        Ok(stream)
    }

    fn describe(&self) -> String {
        format!("server at {}", self.base_url)
    }
}

/// Forward the chunked response body as text fragments.
async fn pump(response: reqwest::Response, tx: FragmentSender) {
    let mut body = response.bytes_stream();
    let mut pending = Utf8Buffer::default();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                let text = pending.push(&bytes);
                if !text.is_empty() && !tx.send(text).await {
                    debug!("Consumer cancelled stream");
                    return;
                }
            }
            Err(e) => {
                tx.fail(Error::Relay(format!("stream interrupted: {e}"))).await;
                return;
            }
        }
    }

    let rest = pending.finish();
    if !rest.is_empty() {
        tx.send(rest).await;
    }
}

/// Holds back the trailing bytes of an incomplete UTF-8 sequence until the
/// next chunk completes it.
#[derive(Debug, Default)]
struct Utf8Buffer {
    bytes: Vec<u8>,
}

impl Utf8Buffer {
    fn push(&mut self, chunk: &[u8]) -> String {
        self.bytes.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.bytes) {
            Ok(_) => self.bytes.len(),
            // An invalid sequence (not just a truncated one) is decoded lossily.
            Err(e) if e.error_len().is_some() => self.bytes.len(),
            Err(e) => e.valid_up_to(),
        };
        let ready: Vec<u8> = self.bytes.drain(..valid).collect();
        String::from_utf8_lossy(&ready).into_owned()
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.bytes).into_owned();
        self.bytes.clear();
        rest
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
