//! Test doubles for the pipelines: a colour-keyed face engine and a
//! presenter that records what it was shown.

use crate::present::Presenter;
use facemark_core::detector::DetectorError;
use facemark_core::{DetectedFace, Embedding, EngineError, FaceEngine, FaceLocation};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

pub const ALICE: Rgb<u8> = Rgb([200, 30, 30]);
pub const BOB: Rgb<u8> = Rgb([30, 30, 200]);
pub const STRANGER: Rgb<u8> = Rgb([30, 200, 30]);

/// Treats a uniformly coloured image as one face whose embedding is the
/// colour. Black images contain no face.
#[derive(Default)]
pub struct StubEngine {
    /// Colour that makes detection fail.
    pub fail_on: Option<Rgb<u8>>,
}

pub fn embedding_for(color: Rgb<u8>) -> Embedding {
    Embedding::new(color.0.iter().map(|&c| c as f32 / 255.0).collect())
}

impl FaceEngine for StubEngine {
    fn face_locations(&mut self, image: &RgbImage) -> Result<Vec<DetectedFace>, EngineError> {
        let color = *image.get_pixel(0, 0);
        if Some(color) == self.fail_on {
            return Err(DetectorError::InferenceFailed("stub failure".into()).into());
        }
        if color == Rgb([0, 0, 0]) {
            return Ok(Vec::new());
        }
        let (w, h) = image.dimensions();
        Ok(vec![DetectedFace {
            location: FaceLocation { top: h / 4, right: w * 3 / 4, bottom: h * 3 / 4, left: w / 4 },
            confidence: 0.99,
            landmarks: None,
        }])
    }

    fn face_encodings(
        &mut self,
        image: &RgbImage,
        faces: &[DetectedFace],
    ) -> Result<Vec<Embedding>, EngineError> {
        Ok(faces.iter().map(|_| embedding_for(*image.get_pixel(0, 0))).collect())
    }
}

/// Write a 32×32 PNG; `None` writes a faceless (black) image.
pub fn write_face(path: &Path, color: Option<Rgb<u8>>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(32, 32, color.unwrap_or(Rgb([0, 0, 0])))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}

pub fn write_garbage(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"this is not a valid image file").unwrap();
}

#[derive(Default)]
pub struct RecordingPresenter {
    pub shown: Vec<(String, PathBuf)>,
}

impl Presenter for RecordingPresenter {
    fn present(&mut self, title: &str, source: &Path, _image: &RgbImage) -> anyhow::Result<()> {
        self.shown.push((title.to_string(), source.to_path_buf()));
        Ok(())
    }
}
