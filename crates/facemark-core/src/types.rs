use serde::{Deserialize, Serialize};

/// Face bounding box in pixel coordinates, `(top, right, bottom, left)`.
///
/// `right` and `bottom` are exclusive edges, so `width = right - left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceLocation {
    /// Build a location from float corner coordinates, trimmed to an image of
    /// `width` × `height` pixels.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32, width: u32, height: u32) -> Self {
        let clamp = |v: f32, max: u32| -> u32 { v.round().clamp(0.0, max as f32) as u32 };
        let left = clamp(x1, width);
        let top = clamp(y1, height);
        let right = clamp(x2, width).max(left);
        let bottom = clamp(y2, height).max(top);
        Self { top, right, bottom, left }
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// A face found by the detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    pub location: FaceLocation,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    /// Euclidean distance between two embeddings. This is the distance the
    /// matcher ranks by. Embeddings of different dimensions are infinitely far
    /// apart.
    pub fn distance(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let (dot, norm_a, norm_b) = self.values.iter().zip(other.values.iter()).fold(
            (0.0f32, 0.0f32, 0.0f32),
            |(dot, na, nb), (a, b)| (dot + a * b, na + a * a, nb + b * b),
        );
        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One known face: an identity label and the embedding of one detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingRecord {
    pub label: String,
    pub embedding: Embedding,
}

/// A labelled face in a validation image.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub location: FaceLocation,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical() {
        let a = Embedding::new(vec![0.3, 0.4, 0.5]);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_distance_known_value() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_dimension_mismatch() {
        let a = Embedding::new(vec![0.3, 0.4, 0.5]);
        let empty = Embedding::new(Vec::new());
        assert_eq!(a.distance(&empty), f32::INFINITY);
        assert_eq!(a.distance(&Embedding::new(vec![0.3, 0.4])), f32::INFINITY);
    }

    #[test]
    fn test_similarity_orthogonal_and_opposite() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        let c = Embedding::new(vec![-1.0, 0.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
        assert!((a.similarity(&c) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_zero_vector() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_location_trimmed_to_image() {
        let loc = FaceLocation::from_corners(-12.4, -3.0, 130.6, 90.2, 120, 80);
        assert_eq!(loc, FaceLocation { top: 0, right: 120, bottom: 80, left: 0 });
        assert_eq!(loc.width(), 120);
        assert_eq!(loc.height(), 80);
    }

    #[test]
    fn test_location_inverted_corners_collapse() {
        let loc = FaceLocation::from_corners(50.0, 40.0, 30.0, 20.0, 100, 100);
        assert_eq!(loc.width(), 0);
        assert_eq!(loc.height(), 0);
    }
}
