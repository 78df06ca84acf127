//! Recognizer: label every face in the validation images against the
//! encoding database, then annotate and present each image.

use crate::annotate::Annotator;
use crate::layout;
use crate::present::Presenter;
use anyhow::{Context, Result};
use facemark_core::{
    load_image_file, DatabaseError, DetectionModel, EncodingDatabase, EncodingRecord, FaceEngine,
    Matcher, NearestMatcher, Prediction,
};
use std::path::{Path, PathBuf};

pub struct RecognizeOptions<'a> {
    pub validation_dir: &'a Path,
    pub encodings_path: &'a Path,
    pub model: DetectionModel,
    pub tolerance: f32,
}

/// Faces found in one validation image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReport {
    pub path: PathBuf,
    pub predictions: Vec<Prediction>,
}

impl ImageReport {
    pub fn labels(&self) -> Vec<&str> {
        self.predictions.iter().map(|p| p.label.as_str()).collect()
    }
}

#[derive(Debug)]
pub enum RecognizeOutcome {
    /// No encoding database at the given path; no image was processed.
    DatabaseMissing { path: PathBuf },
    /// Every validation image was processed.
    Finished { reports: Vec<ImageReport>, load_failures: usize },
    /// Stopped at the first error; `reports` holds the images already presented.
    Aborted { reports: Vec<ImageReport>, error: anyhow::Error },
}

/// Recognize faces in every image of the validation directory.
///
/// Unreadable images are skipped. Any other failure stops the run; images
/// presented before it stay presented.
pub fn recognize_faces<E: FaceEngine, P: Presenter>(
    engine: &mut E,
    annotator: &Annotator,
    presenter: &mut P,
    opts: &RecognizeOptions<'_>,
) -> RecognizeOutcome {
    let db = match EncodingDatabase::load(opts.encodings_path) {
        Ok(db) => db,
        Err(DatabaseError::NotFound(path)) => {
            tracing::error!(
                path = %path.display(),
                "encodings file not found; run the encoder first"
            );
            return RecognizeOutcome::DatabaseMissing { path };
        }
        Err(e) => {
            tracing::error!(path = %opts.encodings_path.display(), error = %e, "cannot read encodings");
            return RecognizeOutcome::Aborted {
                reports: Vec::new(),
                error: anyhow::Error::new(e).context("loading encodings"),
            };
        }
    };

    if let Some(stored) = db.detection_model.as_deref() {
        if stored != opts.model.as_str() {
            tracing::warn!(
                stored,
                selected = %opts.model,
                "encodings were built with a different detection model; locations may not line up"
            );
        }
    }
    tracing::info!(records = db.len(), labels = db.label_counts().len(), "known faces loaded");

    let mut pass = RecognitionPass {
        engine,
        annotator,
        presenter,
        matcher: NearestMatcher { tolerance: opts.tolerance },
        known: db.records(),
    };

    let entries = match layout::list_entries(opts.validation_dir)
        .with_context(|| format!("listing validation directory {}", opts.validation_dir.display()))
    {
        Ok(entries) => entries,
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "cannot list validation images");
            return RecognizeOutcome::Aborted { reports: Vec::new(), error };
        }
    };
    tracing::info!(dir = %opts.validation_dir.display(), entries = entries.len(), "validation directory contents");
    for entry in &entries {
        tracing::info!(path = %entry.display(), "  entry");
    }

    let mut reports = Vec::new();
    let mut load_failures = 0usize;

    for path in entries.iter().filter(|p| p.is_file()) {
        match pass.process(path) {
            Ok(Some(report)) => reports.push(report),
            Ok(None) => load_failures += 1,
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "error while recognizing faces; stopping");
                return RecognizeOutcome::Aborted { reports, error };
            }
        }
    }

    RecognizeOutcome::Finished { reports, load_failures }
}

struct RecognitionPass<'a, E, P> {
    engine: &'a mut E,
    annotator: &'a Annotator,
    presenter: &'a mut P,
    matcher: NearestMatcher,
    known: &'a [EncodingRecord],
}

impl<E: FaceEngine, P: Presenter> RecognitionPass<'_, E, P> {
    /// `Ok(None)` when the image cannot be loaded.
    fn process(&mut self, path: &Path) -> Result<Option<ImageReport>> {
        tracing::info!(path = %path.display(), "processing file");

        let image = match load_image_file(path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot load image; skipping");
                return Ok(None);
            }
        };
        tracing::info!(width = image.width(), height = image.height(), "loaded image");

        let faces = self
            .engine
            .face_locations(&image)
            .with_context(|| format!("detecting faces in {}", path.display()))?;
        tracing::info!(path = %path.display(), faces = faces.len(), "found faces");

        let encodings = self
            .engine
            .face_encodings(&image, &faces)
            .with_context(|| format!("encoding faces in {}", path.display()))?;

        let predictions: Vec<Prediction> = faces
            .iter()
            .zip(encodings.iter())
            .map(|(face, embedding)| {
                let result = self.matcher.identify(embedding, self.known);
                tracing::debug!(
                    label = %result.label,
                    distance = ?result.distance,
                    matched = result.matched,
                    "face identified"
                );
                Prediction { location: face.location, label: result.label }
            })
            .collect();

        let annotated = self.annotator.annotate(&image, &predictions);
        let file_name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let title = format!("Faces found in {file_name}");
        self.presenter
            .present(&title, path, &annotated)
            .with_context(|| format!("presenting {}", path.display()))?;

        Ok(Some(ImageReport { path: path.to_path_buf(), predictions }))
    }
}
