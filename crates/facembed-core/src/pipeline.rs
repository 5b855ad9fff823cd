//! End-to-end embedding of one encoded image: decode, analyze, shape.
//!
//! Shared by the HTTP handlers and the CLI so both report the same soft
//! failures for the same input.

use crate::analyzer::{AnalyzerError, AnalyzerFactory};
use crate::decode::{decode_image, DecodeError};
use crate::response::{shape, EmbeddingResponse, SoftMessages};
use crate::types::{DetSize, DetectedFace};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

/// Decode `bytes` and run a freshly built analyzer over them.
pub fn analyze_bytes(
    analyzers: &dyn AnalyzerFactory,
    bytes: &[u8],
    det_size: DetSize,
) -> Result<Vec<DetectedFace>, EmbedError> {
    let image = decode_image(bytes)?;

    let mut analyzer = analyzers.create()?;
    analyzer.prepare(det_size)?;
    let faces = analyzer.get(&image)?;

    tracing::info!(
        faces = faces.len(),
        width = image.width(),
        height = image.height(),
        det_width = det_size.width,
        det_height = det_size.height,
        "face analysis complete"
    );
    Ok(faces)
}

/// Embed the first face in `bytes`.
///
/// An image the decoder cannot read and an image without faces both come back
/// as [`EmbeddingResponse::Error`] with the given wording. An empty buffer and
/// analyzer failures are hard errors.
pub fn embed_bytes(
    analyzers: &dyn AnalyzerFactory,
    bytes: &[u8],
    det_size: DetSize,
    messages: &SoftMessages,
) -> Result<EmbeddingResponse, EmbedError> {
    match analyze_bytes(analyzers, bytes, det_size) {
        Ok(faces) => Ok(shape(&faces, messages)),
        Err(EmbedError::Decode(DecodeError::Undecodable(err))) => {
            tracing::info!(error = %err, size_bytes = bytes.len(), "payload is not a decodable image");
            Ok(EmbeddingResponse::soft_error(messages.undecodable))
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::FaceAnalyzer;
    use crate::response::{B64_MESSAGES, UPLOAD_MESSAGES};
    use crate::types::{BoundingBox, DecodedImage, Embedding};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns one face for non-uniform images, none for uniform ones.
    #[derive(Default)]
    struct StubFactory {
        created: Arc<AtomicUsize>,
    }

    struct StubAnalyzer {
        prepared: bool,
    }

    impl AnalyzerFactory for StubFactory {
        fn create(&self) -> Result<Box<dyn FaceAnalyzer>, AnalyzerError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubAnalyzer { prepared: false }))
        }
    }

    impl FaceAnalyzer for StubAnalyzer {
        fn prepare(&mut self, det_size: DetSize) -> Result<(), AnalyzerError> {
            if !det_size.is_valid() {
                return Err(AnalyzerError::InvalidDetSize(det_size));
            }
            self.prepared = true;
            Ok(())
        }

        fn get(&mut self, image: &DecodedImage) -> Result<Vec<DetectedFace>, AnalyzerError> {
            if !self.prepared {
                return Err(AnalyzerError::NotPrepared);
            }
            let first = image.get_pixel(0, 0);
            if image.pixels().all(|p| p == first) {
                return Ok(vec![]);
            }
            Ok(vec![DetectedFace {
                bbox: BoundingBox {
                    x: 0.0, y: 0.0, width: 4.0, height: 4.0,
                    confidence: 0.9, landmarks: None,
                },
                embedding: Embedding { values: vec![0.6, 0.8] },
            }])
        }
    }

    fn png(image: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_embed_bytes_returns_first_face() {
        let factory = StubFactory::default();
        let bytes = png(&RgbImage::from_fn(8, 8, |x, y| Rgb([x as u8, y as u8, 0])));
        let response = embed_bytes(&factory, &bytes, DetSize::default(), &B64_MESSAGES).unwrap();
        assert_eq!(response, EmbeddingResponse::Embedding { embedding: vec![0.6, 0.8] });
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_embed_bytes_no_face_is_soft() {
        let factory = StubFactory::default();
        let bytes = png(&RgbImage::from_pixel(8, 8, Rgb([9, 9, 9])));
        let response = embed_bytes(&factory, &bytes, DetSize::default(), &UPLOAD_MESSAGES).unwrap();
        assert_eq!(response, EmbeddingResponse::soft_error("No face detected."));
    }

    #[test]
    fn test_embed_bytes_undecodable_is_soft_and_skips_analyzer() {
        let factory = StubFactory::default();
        let response = embed_bytes(&factory, b"plain text", DetSize::default(), &B64_MESSAGES).unwrap();
        assert_eq!(
            response,
            EmbeddingResponse::soft_error("Could not decode the image. Check file format or base64 string.")
        );
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_embed_bytes_empty_buffer_is_hard() {
        let factory = StubFactory::default();
        let err = embed_bytes(&factory, &[], DetSize::default(), &B64_MESSAGES).unwrap_err();
        assert!(matches!(err, EmbedError::Decode(DecodeError::EmptyBuffer)));
        assert_eq!(err.to_string(), "image buffer is empty");
    }

    #[test]
    fn test_embed_bytes_invalid_det_size_is_hard() {
        let factory = StubFactory::default();
        let bytes = png(&RgbImage::from_fn(8, 8, |x, y| Rgb([x as u8, y as u8, 0])));
        let err = embed_bytes(&factory, &bytes, DetSize::new(0, 640), &B64_MESSAGES).unwrap_err();
        assert!(matches!(err, EmbedError::Analyzer(AnalyzerError::InvalidDetSize(_))));
    }

    #[test]
    fn test_analyze_bytes_propagates_undecodable() {
        let factory = StubFactory::default();
        let err = analyze_bytes(&factory, b"GIF89a-but-not-really", DetSize::default()).unwrap_err();
        assert!(matches!(err, EmbedError::Decode(DecodeError::Undecodable(_))));
    }
}
