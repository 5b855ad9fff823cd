use serde::{Deserialize, Serialize};

/// An 8-bit RGB raster decoded from a request payload.
pub type DecodedImage = image::RgbImage;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// L2 norm of the vector.
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Compute cosine similarity between two embeddings.
    ///
    /// Returns a value in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Detection resolution: the canvas the detector resizes every input into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetSize {
    pub width: u32,
    pub height: u32,
}

impl DetSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for DetSize {
    fn default() -> Self {
        Self::new(640, 640)
    }
}

/// A face found by the analyzer, with its unit-length embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

impl DetectedFace {
    /// The L2-normalized embedding values.
    pub fn normed_embedding(&self) -> &[f32] {
        &self.embedding.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: Vec<f32>) -> Embedding {
        Embedding { values }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = emb(vec![1.0, 0.0, 0.0]);
        let b = emb(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = emb(vec![0.0, 0.0]);
        let b = emb(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_euclidean_distance() {
        let a = emb(vec![0.0, 0.0]);
        let b = emb(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_norm() {
        assert!((emb(vec![3.0, 4.0]).norm() - 5.0).abs() < 1e-6);
        assert_eq!(emb(vec![]).norm(), 0.0);
    }

    #[test]
    fn test_det_size_default_and_validity() {
        assert_eq!(DetSize::default(), DetSize::new(640, 640));
        assert!(DetSize::new(320, 320).is_valid());
        assert!(!DetSize::new(0, 640).is_valid());
        assert!(!DetSize::new(640, 0).is_valid());
    }

    #[test]
    fn test_detected_face_serializes_embedding() {
        let face = DetectedFace {
            bbox: BoundingBox {
                x: 1.0, y: 2.0, width: 3.0, height: 4.0,
                confidence: 0.9, landmarks: None,
            },
            embedding: emb(vec![0.6, 0.8]),
        };
        let json = serde_json::to_value(&face).unwrap();
        assert_eq!(json["embedding"]["values"], serde_json::json!([0.6f32, 0.8f32]));
        assert_eq!(face.normed_embedding(), &[0.6, 0.8]);
    }
}
