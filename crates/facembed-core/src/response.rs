//! Embedding result payloads and the soft-failure wording of each entry point.

use crate::types::DetectedFace;
use serde::{Deserialize, Serialize};

/// Soft-failure wording, which differs between the base64 and upload paths.
#[derive(Debug, Clone, Copy)]
pub struct SoftMessages {
    pub undecodable: &'static str,
    pub no_face: &'static str,
}

pub const B64_MESSAGES: SoftMessages = SoftMessages {
    undecodable: "Could not decode the image. Check file format or base64 string.",
    no_face: "No face detected in the image.",
};

pub const UPLOAD_MESSAGES: SoftMessages = SoftMessages {
    undecodable: "Invalid image or file format.",
    no_face: "No face detected.",
};

/// The embedding, or a soft error the caller must check for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingResponse {
    Embedding { embedding: Vec<f32> },
    Error { error: String },
}

impl EmbeddingResponse {
    pub fn soft_error(message: &str) -> Self {
        EmbeddingResponse::Error {
            error: message.to_string(),
        }
    }
}

/// Take the first face's normalized embedding; no faces is a soft error.
pub fn shape(faces: &[DetectedFace], messages: &SoftMessages) -> EmbeddingResponse {
    match faces.first() {
        Some(face) => EmbeddingResponse::Embedding {
            embedding: face.normed_embedding().to_vec(),
        },
        None => EmbeddingResponse::soft_error(messages.no_face),
    }
}
