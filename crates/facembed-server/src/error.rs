//! Hard failures and request-validation errors, rendered as `{"detail": ...}`.
//!
//! Soft failures (undecodable image, no face) are not errors here: they are
//! successful responses carrying an `error` field, see [`crate::response`].

use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use facembed_core::{DecodeError, EmbedError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Any failure while decoding base64 or running the analyzer.
    #[error("{0}")]
    Internal(String),
    /// Well-formed request whose fields are missing or mistyped.
    #[error("{0}")]
    Unprocessable(String),
    /// Request the framework could not parse at all.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Rejected { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        } else {
            tracing::warn!(%status, error = %self, "request rejected");
        }
        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}

impl From<DecodeError> for ApiError {
    fn from(err: DecodeError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<EmbedError> for ApiError {
    fn from(err: EmbedError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("embedding task failed: {err}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let message = rejection.body_text();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            ApiError::Unprocessable(message)
        } else {
            ApiError::Rejected { status, message }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Rejected {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Unprocessable("missing".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::Rejected { status: StatusCode::BAD_REQUEST, message: "bad".into() }.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_decode_error_is_internal_with_message() {
        let err: ApiError = facembed_core::decode_base64("@@@").unwrap_err().into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("invalid base64 payload"));
    }

    #[test]
    fn test_embed_error_keeps_inner_message() {
        let err: ApiError = EmbedError::from(DecodeError::EmptyBuffer).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "image buffer is empty");
    }

    #[tokio::test]
    async fn test_into_response_body_has_detail() {
        let response = ApiError::Internal("model exploded".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "detail": "model exploded" }));
    }
}
