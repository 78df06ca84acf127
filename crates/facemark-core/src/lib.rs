//! facemark-core — Face detection, encoding and matching.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime, and persists known faces in an encoding
//! database.

pub mod alignment;
pub mod database;
pub mod detector;
pub mod engine;
pub mod matcher;
pub mod recognizer;
pub mod types;

pub use database::{DatabaseError, EncodingDatabase, DEFAULT_ENCODINGS_PATH};
pub use detector::{DetectionModel, FaceDetector};
pub use engine::{load_image_file, EngineError, FaceEngine, OnnxFaceEngine};
pub use matcher::{MatchResult, Matcher, NearestMatcher, DEFAULT_TOLERANCE, UNKNOWN_LABEL};
pub use recognizer::FaceRecognizer;
pub use types::{DetectedFace, Embedding, EncodingRecord, FaceLocation, Prediction};

/// Directory the ONNX model files are looked up in when none is configured.
pub fn default_model_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("models")
}
