//! Endpoint handlers.
//!
//! Decoding, analysis and shaping run on the blocking pool; each request
//! builds its own analyzer through the factory in [`AppState`].

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use facembed_core::{decode_base64, embed_bytes, DetSize};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;
use crate::request::{parse_dimension, EmbeddingRequest, UploadForm};
use crate::response::{
    EmbeddingResponse, SoftMessages, WelcomeResponse, B64_MESSAGES, UPLOAD_MESSAGES,
    WELCOME_MESSAGE,
};

/// GET / - liveness check.
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}

/// POST /faceEmbeddingB64 - embed the first face of a base64-encoded image.
///
/// # Errors
/// - 500: the payload is not valid base64, or the analyzer failed
/// - 422: the JSON body lacks `img_b64` or has mistyped fields
pub async fn face_embedding_b64(
    State(state): State<AppState>,
    payload: Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let Json(request) = payload?;
    let det_size = request.det_size();
    tracing::debug!(
        det_width = det_size.width,
        det_height = det_size.height,
        payload_len = request.img_b64.len(),
        "faceEmbeddingB64 request"
    );

    let image_data = decode_base64(&request.img_b64)?;
    embed_blocking(&state, image_data, det_size, B64_MESSAGES).await
}

/// POST /faceEmbeddingImg - embed the first face of an uploaded image file.
///
/// Form fields: `img_file` (required), `img_width`, `img_height`.
pub async fn face_embedding_img(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let form = read_upload_form(multipart?).await?;
    tracing::debug!(
        det_width = form.det_size.width,
        det_height = form.det_size.height,
        size_bytes = form.img_file.len(),
        "faceEmbeddingImg request"
    );

    embed_blocking(&state, form.img_file, form.det_size, UPLOAD_MESSAGES).await
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut img_file = None;
    let mut det_size = DetSize::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("img_file") => img_file = Some(field.bytes().await?.to_vec()),
            Some("img_width") => det_size.width = parse_dimension("img_width", &field.text().await?)?,
            Some("img_height") => det_size.height = parse_dimension("img_height", &field.text().await?)?,
            other => tracing::debug!(field = ?other, "ignoring unknown form field"),
        }
    }

    let img_file =
        img_file.ok_or_else(|| ApiError::Unprocessable("img_file: field required".to_string()))?;
    Ok(UploadForm { img_file, det_size })
}

async fn embed_blocking(
    state: &AppState,
    bytes: Vec<u8>,
    det_size: DetSize,
    messages: SoftMessages,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let analyzers = Arc::clone(&state.analyzers);
    let response =
        tokio::task::spawn_blocking(move || embed_bytes(analyzers.as_ref(), &bytes, det_size, &messages))
            .await??;
    Ok(Json(response))
}
