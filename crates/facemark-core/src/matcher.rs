//! Nearest-neighbour matching of a probe embedding against known faces.
//!
//! The decision rule is two-step: the match flags (`distance <= tolerance`)
//! and the distance vector are computed independently, the first index of the
//! minimum distance is selected, and the label at that index is assigned only
//! if its match flag is set.

use crate::types::{Embedding, EncodingRecord};

/// Label assigned to faces that do not match any known encoding.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Default Euclidean tolerance for L2-normalized ArcFace embeddings.
///
/// Equivalent to a cosine similarity of roughly 0.40.
pub const DEFAULT_TOLERANCE: f32 = 1.10;

/// Distance from `probe` to every known encoding, in gallery order.
pub fn face_distance(known: &[EncodingRecord], probe: &Embedding) -> Vec<f32> {
    known.iter().map(|r| r.embedding.distance(probe)).collect()
}

/// Match flag for every known encoding: `distance <= tolerance`.
pub fn compare_faces(known: &[EncodingRecord], probe: &Embedding, tolerance: f32) -> Vec<bool> {
    face_distance(known, probe)
        .into_iter()
        .map(|d| d <= tolerance)
        .collect()
}

/// Index of the smallest distance. Ties resolve to the first occurrence;
/// NaN entries are never selected.
pub fn best_match_index(distances: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &d) in distances.iter().enumerate() {
        if d.is_nan() {
            continue;
        }
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Result of matching one probe embedding against the known set.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Known label, or [`UNKNOWN_LABEL`].
    pub label: String,
    /// Index of the nearest known encoding.
    pub index: Option<usize>,
    pub distance: Option<f32>,
    /// Whether the match flag was set at `index`.
    pub matched: bool,
}

impl MatchResult {
    fn unknown(index: Option<usize>, distance: Option<f32>) -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            index,
            distance,
            matched: false,
        }
    }
}

/// Strategy for identifying a probe embedding among known faces.
pub trait Matcher {
    fn identify(&self, probe: &Embedding, known: &[EncodingRecord]) -> MatchResult;
}

/// Euclidean nearest-neighbour matcher with a fixed tolerance.
#[derive(Debug, Clone, Copy)]
pub struct NearestMatcher {
    pub tolerance: f32,
}

impl Default for NearestMatcher {
    fn default() -> Self {
        Self { tolerance: DEFAULT_TOLERANCE }
    }
}

impl Matcher for NearestMatcher {
    fn identify(&self, probe: &Embedding, known: &[EncodingRecord]) -> MatchResult {
        let matches = compare_faces(known, probe, self.tolerance);
        let distances = face_distance(known, probe);

        let Some(idx) = best_match_index(&distances) else {
            return MatchResult::unknown(None, None);
        };

        if matches[idx] {
            MatchResult {
                label: known[idx].label.clone(),
                index: Some(idx),
                distance: Some(distances[idx]),
                matched: true,
            }
        } else {
            MatchResult::unknown(Some(idx), Some(distances[idx]))
        }
    }
}
