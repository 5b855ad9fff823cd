//! Request payload decoding: base64 text and raw uploads into RGB rasters.

use crate::types::DecodedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("image buffer is empty")]
    EmptyBuffer,
    #[error("could not decode image: {0}")]
    Undecodable(#[from] image::ImageError),
}

/// Decode a standard-alphabet, padded base64 string into raw bytes.
///
/// ASCII whitespace anywhere in the input is skipped, so line-wrapped output
/// from `base64` or MIME encoders decodes as-is. Any other non-alphabet
/// symbol is still an error.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: Vec<u8> = encoded
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(STANDARD.decode(compact)?)
}

/// Decode an image container (JPEG, PNG, BMP, WebP, ...) into an RGB raster.
///
/// The format is sniffed from the leading bytes. Alpha and grayscale inputs are
/// converted to three 8-bit color channels.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyBuffer);
    }

    let image = image::load_from_memory(bytes)?.into_rgb8();
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        size_bytes = bytes.len(),
        "decoded image"
    );
    Ok(image)
}
