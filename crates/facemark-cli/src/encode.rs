//! Encoder: training images in, encoding database out.
//!
//! Labels come from the parent directory of each image. The expected layout
//! is one subdirectory per identity:
//!
//! ```text
//! training/
//!   alice/ 1.jpg 2.jpg
//!   bob/   1.jpg
//! ```
//!
//! Images placed directly in the training root are labelled with the root's
//! own directory name.

use crate::layout::{self, is_hidden};
use anyhow::{Context, Result};
use facemark_core::{load_image_file, DetectionModel, EncodingDatabase, FaceEngine};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct EncodeOptions<'a> {
    pub training_dir: &'a Path,
    pub encodings_path: &'a Path,
    pub model: DetectionModel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeOutcome {
    /// The training directory has no entries; nothing was written.
    EmptyTrainingDir,
    /// Images were processed but no face was encoded; nothing was written.
    NoEncodings { images: usize, load_failures: usize },
    /// The database was written.
    Saved {
        path: PathBuf,
        records: usize,
        identities: usize,
        load_failures: usize,
    },
}

/// Encode every face in the training directory and persist the database.
pub fn encode_known_faces<E: FaceEngine>(engine: &mut E, opts: &EncodeOptions<'_>) -> Result<EncodeOutcome> {
    let training_dir = opts.training_dir;

    let entries = layout::list_entries(training_dir)
        .with_context(|| format!("listing training directory {}", training_dir.display()))?;
    tracing::info!(dir = %training_dir.display(), entries = entries.len(), "training directory contents");
    for entry in &entries {
        tracing::info!(path = %entry.display(), "  entry");
    }

    let is_empty = layout::is_empty_dir(training_dir)
        .with_context(|| format!("reading training directory {}", training_dir.display()))?;
    if is_empty {
        tracing::warn!(dir = %training_dir.display(), "training directory is empty; nothing to encode");
        return Ok(EncodeOutcome::EmptyTrainingDir);
    }

    let mut db = EncodingDatabase::new().with_detection_model(opts.model.as_str());
    let mut images = 0usize;
    let mut load_failures = 0usize;

    for path in training_images(training_dir)? {
        tracing::info!(path = %path.display(), "processing file");
        let label = identity_label(&path, training_dir);

        let image = match load_image_file(&path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot load image; skipping");
                load_failures += 1;
                continue;
            }
        };
        images += 1;
        tracing::info!(width = image.width(), height = image.height(), "loaded image");

        let faces = engine
            .face_locations(&image)
            .with_context(|| format!("detecting faces in {}", path.display()))?;
        tracing::info!(path = %path.display(), faces = faces.len(), "found faces");

        let encodings = engine
            .face_encodings(&image, &faces)
            .with_context(|| format!("encoding faces in {}", path.display()))?;
        for embedding in encodings {
            db.push(label.clone(), embedding)
                .with_context(|| format!("storing encoding from {}", path.display()))?;
        }
    }

    if db.is_empty() {
        tracing::warn!(images, load_failures, "no encodings to save");
        return Ok(EncodeOutcome::NoEncodings { images, load_failures });
    }

    db.save(opts.encodings_path)
        .with_context(|| format!("saving encodings to {}", opts.encodings_path.display()))?;

    let identities = db.label_counts().len();
    tracing::info!(
        path = %opts.encodings_path.display(),
        records = db.len(),
        identities,
        "encodings saved"
    );

    Ok(EncodeOutcome::Saved {
        path: opts.encodings_path.to_path_buf(),
        records: db.len(),
        identities,
        load_failures,
    })
}

/// Files in the training root and one level of identity subdirectories,
/// sorted by name.
fn training_images(training_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(training_dir)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.path()))
    {
        let entry = entry.with_context(|| format!("walking {}", training_dir.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Name of the directory containing `path`.
fn identity_label(path: &Path, training_dir: &Path) -> String {
    let parent = path.parent().unwrap_or(training_dir);
    if parent == training_dir {
        tracing::warn!(
            path = %path.display(),
            "image is not inside an identity subdirectory; labelling it with the training directory name"
        );
    }
    parent
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
