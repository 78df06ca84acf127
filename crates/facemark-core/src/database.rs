//! Persisted face-encoding database.
//!
//! On disk: the 8-byte magic `FACEMARK` followed by a bincode-encoded body.
//! Records keep their label and embedding together, in insertion order.

use crate::types::{Embedding, EncodingRecord};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the encoding database, relative to the working directory.
pub const DEFAULT_ENCODINGS_PATH: &str = "output/encodings.pkl";

const MAGIC: &[u8; 8] = b"FACEMARK";
const FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("encodings file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("{}: not a facemark encodings file", .0.display())]
    BadMagic(PathBuf),
    #[error("{}: unsupported format version {version}", .path.display())]
    UnsupportedVersion { path: PathBuf, version: u32 },
    #[error("refusing to save an empty encoding database")]
    Empty,
    #[error("embedding for {label:?} has {found} dimensions, expected {expected}")]
    DimensionMismatch { label: String, expected: usize, found: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding: {0}")]
    Codec(#[from] bincode::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingDatabase {
    format_version: u32,
    /// Detector variant the faces were located with (e.g. "fast").
    pub detection_model: Option<String>,
    /// Embedding model the encodings came from (e.g. "w600k_r50").
    pub embedding_model: Option<String>,
    records: Vec<EncodingRecord>,
}

impl EncodingDatabase {
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            detection_model: None,
            embedding_model: None,
            records: Vec::new(),
        }
    }

    pub fn with_detection_model(mut self, model: impl Into<String>) -> Self {
        self.detection_model = Some(model.into());
        self
    }

    /// Append one known face. The first embedding carrying a model version
    /// sets the database's embedding model.
    ///
    /// Every embedding must be non-empty and match the dimension of the first
    /// record.
    pub fn push(&mut self, label: impl Into<String>, embedding: Embedding) -> Result<(), DatabaseError> {
        let label = label.into();
        check_dimension(self.dimension(), &label, &embedding)?;
        if self.embedding_model.is_none() {
            self.embedding_model = embedding.model_version.clone();
        }
        self.records.push(EncodingRecord { label, embedding });
        Ok(())
    }

    /// Embedding dimension of the stored records, if any.
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.len())
    }

    pub fn records(&self) -> &[EncodingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Labels in record order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.records.iter().map(|r| r.label.as_str())
    }

    /// Embeddings in record order, index-aligned with [`names`](Self::names).
    pub fn encodings(&self) -> impl Iterator<Item = &Embedding> + '_ {
        self.records.iter().map(|r| &r.embedding)
    }

    /// Distinct labels with their record counts, in first-seen order.
    pub fn label_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for name in self.names() {
            match counts.iter_mut().find(|(n, _)| *n == name) {
                Some((_, c)) => *c += 1,
                None => counts.push((name, 1)),
            }
        }
        counts
    }

    /// Write the database to `path`, replacing any existing file.
    ///
    /// The body goes to a sibling temporary file first and is renamed over
    /// the target, so a failed write leaves the previous file intact.
    pub fn save(&self, path: &Path) -> Result<(), DatabaseError> {
        if self.is_empty() {
            return Err(DatabaseError::Empty);
        }

        let tmp_path = path.with_extension("tmp");
        let written = self
            .write_body(&tmp_path)
            .and_then(|()| fs::rename(&tmp_path, path).map_err(DatabaseError::from));
        if let Err(e) = written {
            // Leave no partial file behind.
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        tracing::debug!(path = %path.display(), records = self.len(), "encoding database written");
        Ok(())
    }

    /// Read a database written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, DatabaseError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DatabaseError::NotFound(path.to_path_buf()),
            _ => DatabaseError::Io(e),
        })?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        if reader.read_exact(&mut magic).is_err() || &magic != MAGIC {
            return Err(DatabaseError::BadMagic(path.to_path_buf()));
        }

        let db: EncodingDatabase = bincode::deserialize_from(reader)?;
        if db.format_version != FORMAT_VERSION {
            return Err(DatabaseError::UnsupportedVersion {
                path: path.to_path_buf(),
                version: db.format_version,
            });
        }
        let expected = db.dimension();
        for record in &db.records {
            check_dimension(expected, &record.label, &record.embedding)?;
        }

        tracing::debug!(path = %path.display(), records = db.len(), "encoding database loaded");
        Ok(db)
    }
}

impl EncodingDatabase {
    fn write_body(&self, tmp_path: &Path) -> Result<(), DatabaseError> {
        let mut writer = BufWriter::new(File::create(tmp_path)?);
        writer.write_all(MAGIC)?;
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

fn check_dimension(expected: Option<usize>, label: &str, embedding: &Embedding) -> Result<(), DatabaseError> {
    let found = embedding.len();
    let expected = expected.unwrap_or(found);
    if found == 0 || found != expected {
        return Err(DatabaseError::DimensionMismatch {
            label: label.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

impl Default for EncodingDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn embedding(values: &[f32]) -> Embedding {
        Embedding {
            values: values.to_vec(),
            model_version: Some("w600k_r50".into()),
        }
    }

    fn sample() -> EncodingDatabase {
        let mut db = EncodingDatabase::new().with_detection_model("fast");
        db.push("alice", embedding(&[0.1, 0.2, 0.3])).unwrap();
        db.push("bob", embedding(&[0.9, -0.4, 0.0])).unwrap();
        db.push("alice", embedding(&[0.15, 0.25, 0.28])).unwrap();
        db
    }

    #[test]
    fn test_save_then_load_preserves_records_and_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encodings.pkl");
        let db = sample();

        db.save(&path).unwrap();
        let loaded = EncodingDatabase::load(&path).unwrap();

        assert_eq!(loaded, db);
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["alice", "bob", "alice"]);
        assert_eq!(loaded.detection_model.as_deref(), Some("fast"));
        assert_eq!(loaded.embedding_model.as_deref(), Some("w600k_r50"));
    }

    #[test]
    fn test_names_and_encodings_aligned() {
        let db = sample();
        assert_eq!(db.names().count(), db.encodings().count());
        let second = db.encodings().nth(1).unwrap();
        assert_eq!(second.values, vec![0.9, -0.4, 0.0]);
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encodings.pkl");
        fs::write(&path, b"stale contents").unwrap();

        let mut db = EncodingDatabase::new();
        db.push("carol", embedding(&[1.0])).unwrap();
        db.save(&path).unwrap();

        let loaded = EncodingDatabase::load(&path).unwrap();
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["carol"]);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_save_empty_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encodings.pkl");
        let err = EncodingDatabase::new().save(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::Empty));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.pkl");
        let err = EncodingDatabase::load(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_rejects_foreign_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encodings.pkl");
        fs::write(&path, b"\x80\x04\x95pickle data").unwrap();
        let err = EncodingDatabase::load(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::BadMagic(_)));
    }

    #[test]
    fn test_load_truncated_body() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encodings.pkl");
        sample().save(&path).unwrap();
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();
        let err = EncodingDatabase::load(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::Codec(_)));
    }

    #[test]
    fn test_load_rejects_newer_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encodings.pkl");
        let mut db = sample();
        db.format_version = FORMAT_VERSION + 1;
        db.save(&path).unwrap();
        let err = EncodingDatabase::load(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::UnsupportedVersion { version: 2, .. }));
    }

    #[test]
    fn test_push_rejects_other_dimensions() {
        let mut db = sample();
        let err = db.push("mallory", embedding(&[0.5, 0.5])).unwrap_err();
        assert!(matches!(err, DatabaseError::DimensionMismatch { expected: 3, found: 2, .. }));
        assert!(matches!(
            EncodingDatabase::new().push("nobody", embedding(&[])),
            Err(DatabaseError::DimensionMismatch { found: 0, .. })
        ));
        assert_eq!(db.len(), 3);
    }

    #[test]
    fn test_load_rejects_mixed_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("encodings.pkl");
        let mut db = sample();
        db.records.push(EncodingRecord {
            label: "mallory".into(),
            embedding: embedding(&[]),
        });
        db.save(&path).unwrap();

        let err = EncodingDatabase::load(&path).unwrap_err();
        assert!(matches!(err, DatabaseError::DimensionMismatch { ref label, expected: 3, found: 0 } if label == "mallory"));
    }

    #[test]
    fn test_failed_save_removes_temporary_file() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory at the target makes the final rename fail.
        let path = dir.path().join("encodings.pkl");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        assert!(sample().save(&path).is_err());
        assert!(!path.with_extension("tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn test_label_counts() {
        let db = sample();
        assert_eq!(db.label_counts(), vec![("alice", 2), ("bob", 1)]);
    }
}
