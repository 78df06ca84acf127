//! The face engine: image in, face locations and embeddings out.
//!
//! Pipelines depend on the [`FaceEngine`] trait only; [`OnnxFaceEngine`] is the
//! SCRFD + ArcFace implementation.

use crate::detector::{DetectionModel, DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError, ARCFACE_MODEL_FILE};
use crate::types::{DetectedFace, Embedding};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Face location and encoding capability.
pub trait FaceEngine {
    /// Locate every face in the image.
    fn face_locations(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, EngineError>;

    /// One embedding per face, in the same order as `faces`.
    fn face_encodings(
        &mut self,
        image: &RgbImage,
        faces: &[DetectedFace],
    ) -> Result<Vec<Embedding>, EngineError>;
}

/// SCRFD detector + ArcFace recognizer on ONNX Runtime.
pub struct OnnxFaceEngine {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEngine {
    /// Load both models from `model_dir`. Fails fast if either file is missing.
    pub fn load(model_dir: &Path, model: DetectionModel) -> Result<Self, EngineError> {
        let detector = FaceDetector::load(&model_dir.join(model.file_name()))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(ARCFACE_MODEL_FILE))?;
        tracing::info!(dir = %model_dir.display(), %model, "face engine ready");
        Ok(Self { detector, recognizer })
    }
}

impl FaceEngine for OnnxFaceEngine {
    fn face_locations(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, EngineError> {
        Ok(self.detector.detect(image)?)
    }

    fn face_encodings(
        &mut self,
        image: &RgbImage,
        faces: &[DetectedFace],
    ) -> Result<Vec<Embedding>, EngineError> {
        faces
            .iter()
            .map(|face| self.recognizer.extract(image, face).map_err(EngineError::from))
            .collect()
    }
}

/// Decode an image file (any format the `image` crate reads) into RGB8.
pub fn load_image_file(path: &Path) -> Result<RgbImage, image::ImageError> {
    Ok(image::open(path)?.to_rgb8())
}
