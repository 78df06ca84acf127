//! Drawing predictions onto images.

use ab_glyph::{FontVec, PxScale};
use facemark_core::Prediction;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_SCALE: f32 = 20.0;
const LABEL_GAP: i32 = 4;

/// Draws one red box and one label per prediction.
pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl Annotator {
    /// Load the label font. If it cannot be read, boxes are still drawn and
    /// labels are skipped.
    pub fn load(font_path: &Path) -> Self {
        let font = std::fs::read(font_path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontVec::try_from_vec(bytes).map_err(|e| e.to_string()));

        match font {
            Ok(font) => Self::with_font(font),
            Err(error) => {
                tracing::warn!(path = %font_path.display(), %error, "cannot load label font; labels will not be drawn");
                Self::without_labels()
            }
        }
    }

    pub fn with_font(font: FontVec) -> Self {
        Self { font: Some(font), scale: PxScale::from(LABEL_SCALE) }
    }

    pub fn without_labels() -> Self {
        Self { font: None, scale: PxScale::from(LABEL_SCALE) }
    }

    pub fn draws_labels(&self) -> bool {
        self.font.is_some()
    }

    /// Return a copy of `image` with every prediction drawn on it.
    pub fn annotate(&self, image: &RgbImage, predictions: &[Prediction]) -> RgbImage {
        let mut canvas = image.clone();

        for prediction in predictions {
            let loc = prediction.location;
            let (w, h) = (loc.width(), loc.height());
            if w == 0 || h == 0 {
                continue;
            }

            // 2px outline: outer rect plus one inset
            draw_hollow_rect_mut(&mut canvas, Rect::at(loc.left as i32, loc.top as i32).of_size(w, h), BOX_COLOR);
            if w > 2 && h > 2 {
                draw_hollow_rect_mut(
                    &mut canvas,
                    Rect::at(loc.left as i32 + 1, loc.top as i32 + 1).of_size(w - 2, h - 2),
                    BOX_COLOR,
                );
            }

            if let Some(font) = &self.font {
                let (_, text_h) = text_size(self.scale, font, &prediction.label);
                let above = loc.top as i32 - text_h as i32 - LABEL_GAP;
                // No room above the box: put the label just inside it.
                let y = if above >= 0 { above } else { loc.top as i32 + LABEL_GAP };
                draw_text_mut(&mut canvas, BOX_COLOR, loc.left as i32, y, self.scale, font, &prediction.label);
            }
        }

        canvas
    }
}
