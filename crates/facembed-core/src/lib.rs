//! facembed-core — Face detection and embedding engine.
//!
//! Decodes request images, finds faces with SCRFD and embeds them with ArcFace,
//! both running via ONNX Runtime for CPU inference. [`embed_bytes`] is the
//! whole request path, shared by the HTTP server and the CLI.

pub mod alignment;
pub mod analyzer;
pub mod decode;
pub mod detector;
pub mod pipeline;
pub mod recognizer;
pub mod response;
pub mod types;

use std::path::PathBuf;

pub use analyzer::{AnalyzerError, AnalyzerFactory, FaceAnalyzer, ModelPaths, OnnxAnalyzerFactory, OnnxFaceAnalyzer};
pub use decode::{decode_base64, decode_image, DecodeError};
pub use detector::FaceDetector;
pub use pipeline::{analyze_bytes, embed_bytes, EmbedError};
pub use recognizer::FaceRecognizer;
pub use response::{shape, EmbeddingResponse, SoftMessages, B64_MESSAGES, UPLOAD_MESSAGES};
pub use types::{BoundingBox, DecodedImage, DetSize, DetectedFace, Embedding};

/// Default model pack location: `~/.insightface/models/buffalo_l`.
pub fn default_model_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".insightface/models/buffalo_l")
}
