use facembed_core::DetSize;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

fn default_dimension() -> u32 {
    DetSize::default().width
}

/// JSON body of `POST /faceEmbeddingB64`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Detection width; the detector resizes every image into this canvas.
    #[serde(default = "default_dimension")]
    pub img_width: u32,
    #[serde(default = "default_dimension")]
    pub img_height: u32,
    pub img_b64: String,
}

impl EmbeddingRequest {
    pub fn det_size(&self) -> DetSize {
        DetSize::new(self.img_width, self.img_height)
    }
}

/// Fields collected from the `POST /faceEmbeddingImg` multipart form.
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub img_file: Vec<u8>,
    pub det_size: DetSize,
}

/// Parse an integer form field the way the JSON body would accept it.
pub fn parse_dimension(field: &str, raw: &str) -> Result<u32, ApiError> {
    raw.trim().parse().map_err(|_| {
        ApiError::Unprocessable(format!(
            "{field}: input should be a valid non-negative integer, got {raw:?}"
        ))
    })
}
