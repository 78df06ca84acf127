//! Working-directory layout: where training, validation and output live.

use crate::config::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct Layout {
    pub training: PathBuf,
    pub validation: PathBuf,
    pub output: PathBuf,
    pub annotated: PathBuf,
}

impl Layout {
    pub fn from_config(config: &Config) -> Self {
        Self {
            training: config.training_dir.clone(),
            validation: config.validation_dir.clone(),
            output: config.output_dir.clone(),
            annotated: config.annotated_dir.clone(),
        }
    }

    /// Create every directory that does not exist yet.
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.training, &self.validation, &self.output, &self.annotated] {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Immediate entries of `dir`, sorted by file name, hidden entries skipped.
pub fn list_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e.path()))
    {
        let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
        entries.push(entry.into_path());
    }
    Ok(entries)
}

/// True when `dir` has no entries at all, hidden ones included.
pub fn is_empty_dir(dir: &Path) -> Result<bool> {
    match WalkDir::new(dir).min_depth(1).max_depth(1).into_iter().next() {
        None => Ok(true),
        Some(entry) => {
            entry.with_context(|| format!("reading {}", dir.display()))?;
            Ok(false)
        }
    }
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_creates_missing_dirs() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout {
            training: tmp.path().join("training"),
            validation: tmp.path().join("validation"),
            output: tmp.path().join("output"),
            annotated: tmp.path().join("output/annotated"),
        };
        layout.ensure().unwrap();
        // Idempotent
        layout.ensure().unwrap();
        assert!(layout.training.is_dir());
        assert!(layout.validation.is_dir());
        assert!(layout.annotated.is_dir());
    }

    #[test]
    fn test_list_entries_sorted_without_hidden() {
        let tmp = TempDir::new().unwrap();
        for name in ["b.jpg", ".DS_Store", "a.png"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        fs::create_dir(tmp.path().join("carol")).unwrap();
        fs::write(tmp.path().join("carol/nested.jpg"), b"x").unwrap();

        let names: Vec<String> = list_entries(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg", "carol"]);
    }

    #[test]
    fn test_hidden_entries_make_dir_non_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(is_empty_dir(tmp.path()).unwrap());

        fs::write(tmp.path().join(".DS_Store"), b"x").unwrap();
        assert!(!is_empty_dir(tmp.path()).unwrap());
        assert!(list_entries(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_list_entries_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(list_entries(&tmp.path().join("nope")).is_err());
    }
}
