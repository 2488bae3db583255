use serde::{Deserialize, Serialize};

/// A detected face: corner box in source-image pixels plus detector confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Detector score in [0, 1].
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Integer pixel rectangle `(x, y, w, h)` clipped to an image of the given size.
    ///
    /// Returns `None` when nothing of the box lies inside the image.
    pub fn clip_to(&self, img_width: u32, img_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x1 = self.x1.floor().clamp(0.0, img_width as f32) as u32;
        let y1 = self.y1.floor().clamp(0.0, img_height as f32) as u32;
        let x2 = self.x2.ceil().clamp(0.0, img_width as f32) as u32;
        let y2 = self.y2.ceil().clamp(0.0, img_height as f32) as u32;

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
///
/// Only the direction carries identity; magnitude is whatever the model emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Unit-L2 copy of this vector. A zero vector stays zero.
    pub fn normalized(&self) -> Embedding {
        let norm = self.norm();
        if norm > 0.0 {
            Embedding::new(self.values.iter().map(|v| v / norm).collect())
        } else {
            self.clone()
        }
    }

    /// Cosine similarity in [-1, 1]: the dot product of both vectors after
    /// unit-L2 normalization. Zero when either side is a zero vector.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            (dot / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Unweighted element-wise mean of raw (unnormalized) embeddings.
    ///
    /// Returns `None` for an empty slice or when dimensions disagree.
    pub fn mean(embeddings: &[Embedding]) -> Option<Embedding> {
        let first = embeddings.first()?;
        let dim = first.dim();
        if embeddings.iter().any(|e| e.dim() != dim) {
            return None;
        }

        let mut sum = vec![0.0f64; dim];
        for emb in embeddings {
            for (acc, v) in sum.iter_mut().zip(&emb.values) {
                *acc += f64::from(*v);
            }
        }
        let n = embeddings.len() as f64;
        Some(Embedding::new(sum.into_iter().map(|s| (s / n) as f32).collect()))
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_identical() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_opposite() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_zero_vector() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_similarity_scale_invariant() {
        let a = Embedding::new(vec![0.3, -1.2, 2.5, 0.01]);
        for k in [1e-3f32, 0.5, 7.0, 1e4] {
            let scaled = Embedding::new(a.values.iter().map(|v| v * k).collect());
            assert!(
                (a.similarity(&scaled) - 1.0).abs() < 1e-5,
                "k = {k}: {}",
                a.similarity(&scaled)
            );
        }
    }

    #[test]
    fn test_normalized_has_unit_norm() {
        let a = Embedding::new(vec![3.0, 4.0]);
        let n = a.normalized();
        assert!((n.norm() - 1.0).abs() < 1e-6);
        assert!((n.values[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_mean_of_raw_vectors() {
        let embs = vec![
            Embedding::new(vec![10.0, 0.0]),
            Embedding::new(vec![0.0, 1.0]),
        ];
        let mean = Embedding::mean(&embs).unwrap();
        assert_eq!(mean.values, vec![5.0, 0.5]);
    }

    #[test]
    fn test_mean_then_normalize_differs_from_normalize_then_mean() {
        // The larger vector dominates the raw mean; averaging unit vectors would
        // give a 45-degree direction instead.
        let embs = vec![
            Embedding::new(vec![10.0, 0.0]),
            Embedding::new(vec![0.0, 1.0]),
        ];
        let raw_mean = Embedding::mean(&embs).unwrap();
        let unit_mean =
            Embedding::mean(&embs.iter().map(Embedding::normalized).collect::<Vec<_>>()).unwrap();
        let diagonal = Embedding::new(vec![1.0, 1.0]);

        assert!((unit_mean.similarity(&diagonal) - 1.0).abs() < 1e-6);
        assert!(raw_mean.similarity(&diagonal) < 0.8);
    }

    #[test]
    fn test_mean_rejects_mixed_dimensions() {
        let embs = vec![Embedding::new(vec![1.0]), Embedding::new(vec![1.0, 2.0])];
        assert!(Embedding::mean(&embs).is_none());
        assert!(Embedding::mean(&[]).is_none());
    }

    #[test]
    fn test_clip_to_image() {
        let b = BoundingBox {
            x1: -5.0, y1: 10.2, x2: 50.5, y2: 300.0,
            confidence: 0.9, landmarks: None,
        };
        assert_eq!(b.clip_to(100, 200), Some((0, 10, 51, 190)));
    }

    #[test]
    fn test_clip_outside_image() {
        let b = BoundingBox {
            x1: 150.0, y1: 0.0, x2: 180.0, y2: 20.0,
            confidence: 0.9, landmarks: None,
        };
        assert!(b.clip_to(100, 100).is_none());
    }
}
