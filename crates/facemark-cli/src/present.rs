//! Presentation of annotated images.

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Receives each annotated validation image.
pub trait Presenter {
    fn present(&mut self, title: &str, source: &Path, image: &RgbImage) -> Result<()>;
}

/// Writes annotated images as PNG files into a directory.
pub struct DirectoryPresenter {
    dir: PathBuf,
}

impl DirectoryPresenter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<dir>/<source file name>.png`. The source extension stays in the
    /// name so `group.jpg` and `group.png` do not overwrite each other.
    pub fn target_for(&self, source: &Path) -> PathBuf {
        let name = source
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        self.dir.join(format!("{name}.png"))
    }
}

impl Presenter for DirectoryPresenter {
    fn present(&mut self, title: &str, source: &Path, image: &RgbImage) -> Result<()> {
        let target = self.target_for(source);
        image
            .save(&target)
            .with_context(|| format!("writing annotated image {}", target.display()))?;
        tracing::info!(title, path = %target.display(), "annotated image written");
        Ok(())
    }
}
