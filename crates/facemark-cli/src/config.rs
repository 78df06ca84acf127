use facemark_core::{DetectionModel, DEFAULT_ENCODINGS_PATH, DEFAULT_TOLERANCE};
use std::path::PathBuf;

pub(crate) const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf";

/// Run configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Known faces, one subdirectory per identity.
    pub training_dir: PathBuf,
    /// Images to recognize.
    pub validation_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Encoding database file.
    pub encodings_path: PathBuf,
    /// Where annotated validation images are written.
    pub annotated_dir: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    pub detection_model: DetectionModel,
    /// Euclidean distance at or below which two faces match.
    pub match_tolerance: f32,
    /// TrueType font for labels. Labels are skipped if it cannot be read.
    pub font_path: PathBuf,
}

impl Config {
    /// Load configuration from `FACEMARK_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let output_dir = env_path("FACEMARK_OUTPUT_DIR").unwrap_or_else(|| PathBuf::from("output"));

        let encodings_path = env_path("FACEMARK_ENCODINGS_PATH").unwrap_or_else(|| {
            if output_dir == PathBuf::from("output") {
                PathBuf::from(DEFAULT_ENCODINGS_PATH)
            } else {
                output_dir.join("encodings.pkl")
            }
        });

        let detection_model = match std::env::var("FACEMARK_DETECTION_MODEL") {
            Ok(v) => v.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "ignoring FACEMARK_DETECTION_MODEL");
                DetectionModel::default()
            }),
            Err(_) => DetectionModel::default(),
        };

        Self {
            training_dir: env_path("FACEMARK_TRAINING_DIR").unwrap_or_else(|| PathBuf::from("training")),
            validation_dir: env_path("FACEMARK_VALIDATION_DIR")
                .unwrap_or_else(|| PathBuf::from("validation")),
            annotated_dir: env_path("FACEMARK_ANNOTATED_DIR")
                .unwrap_or_else(|| output_dir.join("annotated")),
            model_dir: env_path("FACEMARK_MODEL_DIR").unwrap_or_else(facemark_core::default_model_dir),
            detection_model,
            match_tolerance: env_f32("FACEMARK_MATCH_TOLERANCE", DEFAULT_TOLERANCE),
            font_path: env_path("FACEMARK_FONT_PATH").unwrap_or_else(|| PathBuf::from(DEFAULT_FONT_PATH)),
            encodings_path,
            output_dir,
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
