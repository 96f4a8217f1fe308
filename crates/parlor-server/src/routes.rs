//! HTTP routes.
//!
//! - `POST /chat/` - plain completion, streamed as `text/plain`
//! - `POST /image_recognition/` - image-aware completion, streamed
//! - `GET /load_chat/` - every conversation, catalog order
//! - `POST /save_chat/` - upsert one conversation
//! - `POST /delete_chat/` - remove one conversation
//! - `POST /upload_image/` - multipart upload, field `file`
//! - `GET /images/:file` - bytes of an uploaded image

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use parlor_core::api::{
    CompletionRequest, ConversationView, DeleteConversationRequest, ImageCompletionRequest,
    SaveConversationRequest, StatusMessage, UploadedImage,
};
use parlor_core::store::image::IMAGE_URL_PREFIX;
use parlor_core::{utils, ConversationRecord, Error, FragmentStream};

use crate::error::ApiResult;
use crate::state::AppState;

/// Build the backend router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat/", post(chat))
        .route("/image_recognition/", post(image_recognition))
        .route("/load_chat/", get(load_chat))
        .route("/save_chat/", post(save_chat))
        .route("/delete_chat/", post(delete_chat))
        // Uploads have no size cap.
        .route(
            "/upload_image/",
            post(upload_image).layer(DefaultBodyLimit::disable()),
        )
        .route("/images/:file", get(serve_image))
        .with_state(state)
}

// ─────────────────────────────────────────────
// Completions
// ─────────────────────────────────────────────

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<CompletionRequest>,
) -> ApiResult<Response> {
    debug!(turns = request.messages.len(), "Plain completion");
    let stream = state.relay.stream_completion(&request.messages, None).await?;
    Ok(text_stream(stream))
}

async fn image_recognition(
    State(state): State<AppState>,
    Json(request): Json<ImageCompletionRequest>,
) -> ApiResult<Response> {
    debug!(
        turns = request.messages.len(),
        image = %request.image_url,
        "Image-aware completion"
    );
    let image_url = state.images.provider_url(&request.image_url).await?;
    let stream = state
        .relay
        .stream_completion(&request.messages, Some(image_url.as_str()))
        .await?;
    Ok(text_stream(stream))
}

/// Stream fragments to the client as they arrive. A failure mid-stream
/// aborts the response body.
fn text_stream(stream: FragmentStream) -> Response {
    let stream = stream.inspect(|item| {
        if let Err(e) = item {
            warn!(error = %e, "Completion stream failed");
        }
    });
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response()
}

// ─────────────────────────────────────────────
// Conversations
// ─────────────────────────────────────────────

async fn load_chat(State(state): State<AppState>) -> ApiResult<Json<Vec<ConversationView>>> {
    let records = state.conversations.list_all().await?;
    Ok(Json(records.into_iter().map(ConversationView::from).collect()))
}

async fn save_chat(
    State(state): State<AppState>,
    Json(request): Json<SaveConversationRequest>,
) -> ApiResult<Json<StatusMessage>> {
    let record = ConversationRecord {
        image: request.image(),
        id: request.chat_id,
        name: request.chat_name,
        messages: request.messages,
    };
    state.conversations.save(&record).await?;
    Ok(Json(StatusMessage::new("Chat saved successfully")))
}

async fn delete_chat(
    State(state): State<AppState>,
    Json(request): Json<DeleteConversationRequest>,
) -> ApiResult<Json<StatusMessage>> {
    state.conversations.delete(&request.chat_id).await?;
    info!(id = %request.chat_id, "Conversation deleted");
    Ok(Json(StatusMessage::new("Chat deleted successfully")))
}

// ─────────────────────────────────────────────
// Images
// ─────────────────────────────────────────────

async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadedImage>> {
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(Error::Validation("Only image files allowed".into()).into());
        }

        let bytes = field.bytes().await.map_err(bad_multipart)?;
        let asset = state.images.store(&bytes, &content_type, &file_name).await?;
        info!(id = %asset.id, name = %asset.original_name, "Image uploaded");
        return Ok(Json(UploadedImage::from(asset)));
    }

    Err(Error::Validation("missing multipart field 'file'".into()).into())
}

async fn serve_image(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    let reference = format!("{IMAGE_URL_PREFIX}{file}");
    let bytes = state.images.read(&reference).await?;
    let mime = utils::image_content_type(&file).unwrap_or("application/octet-stream");
    Ok(([(header::CONTENT_TYPE, mime)], bytes).into_response())
}

fn bad_multipart(err: axum::extract::multipart::MultipartError) -> Error {
    Error::Validation(format!("malformed upload: {err}"))
}
