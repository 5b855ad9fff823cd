//! Face analysis: detection followed by embedding extraction for every face.
//!
//! [`FaceAnalyzer`] is the seam the HTTP layer talks to. The ONNX-backed
//! implementation loads both models when constructed, so an [`AnalyzerFactory`]
//! that builds one per request re-initializes the models every time.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{DecodedImage, DetSize, DetectedFace};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DETECTION_MODEL_FILE: &str = "det_10g.onnx";
const RECOGNITION_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("invalid detection size {}x{}: both dimensions must be positive", .0.width, .0.height)]
    InvalidDetSize(DetSize),
    #[error("analyzer used before prepare()")]
    NotPrepared,
}

/// A face detection + embedding capability.
pub trait FaceAnalyzer: Send {
    /// Configure the detection resolution used by subsequent [`get`](Self::get) calls.
    fn prepare(&mut self, det_size: DetSize) -> Result<(), AnalyzerError>;

    /// Detect faces and compute a normalized embedding for each.
    ///
    /// Faces come back in detector order (highest confidence first). An empty
    /// vector means no face was found and is not an error.
    fn get(&mut self, image: &DecodedImage) -> Result<Vec<DetectedFace>, AnalyzerError>;
}

/// Builds analyzers on demand.
pub trait AnalyzerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn FaceAnalyzer>, AnalyzerError>;
}

/// Locations of the ONNX models in a model pack directory.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub detection: PathBuf,
    pub recognition: PathBuf,
}

impl ModelPaths {
    /// Standard file names inside an InsightFace `buffalo_l` directory.
    pub fn in_dir(model_dir: &Path) -> Self {
        Self {
            detection: model_dir.join(DETECTION_MODEL_FILE),
            recognition: model_dir.join(RECOGNITION_MODEL_FILE),
        }
    }
}

/// SCRFD + ArcFace analyzer running on the CPU execution provider.
pub struct OnnxFaceAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceAnalyzer {
    /// Load both models. Detection stays unusable until [`FaceAnalyzer::prepare`].
    pub fn load(paths: &ModelPaths, intra_threads: usize) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(&paths.detection.to_string_lossy(), intra_threads)?;
        let recognizer = FaceRecognizer::load(&paths.recognition.to_string_lossy(), intra_threads)?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn prepare(&mut self, det_size: DetSize) -> Result<(), AnalyzerError> {
        if !det_size.is_valid() {
            return Err(AnalyzerError::InvalidDetSize(det_size));
        }
        self.detector.set_input_size(det_size)?;
        Ok(())
    }

    fn get(&mut self, image: &DecodedImage) -> Result<Vec<DetectedFace>, AnalyzerError> {
        if self.detector.input_size().is_none() {
            return Err(AnalyzerError::NotPrepared);
        }

        let boxes = self.detector.detect(image)?;
        let mut faces = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            let embedding = self.recognizer.extract(image, &bbox)?;
            faces.push(DetectedFace { bbox, embedding });
        }
        Ok(faces)
    }
}

/// Creates a fresh [`OnnxFaceAnalyzer`] from disk on every call.
#[derive(Debug, Clone)]
pub struct OnnxAnalyzerFactory {
    paths: ModelPaths,
    intra_threads: usize,
}

impl OnnxAnalyzerFactory {
    pub fn new(paths: ModelPaths, intra_threads: usize) -> Self {
        Self {
            paths,
            intra_threads: intra_threads.max(1),
        }
    }

    pub fn paths(&self) -> &ModelPaths {
        &self.paths
    }
}

impl AnalyzerFactory for OnnxAnalyzerFactory {
    fn create(&self) -> Result<Box<dyn FaceAnalyzer>, AnalyzerError> {
        let analyzer = OnnxFaceAnalyzer::load(&self.paths, self.intra_threads)?;
        Ok(Box::new(analyzer))
    }
}
