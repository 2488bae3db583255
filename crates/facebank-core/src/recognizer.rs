//! ArcFace face recognizer via ONNX Runtime.
//!
//! Turns a 112×112 RGB face crop into a 512-dimensional embedding using the
//! w600k_r50 model. The raw model output is returned as-is; callers
//! normalize at comparison time.

use crate::alignment::ALIGNED_SIZE;
use crate::types::Embedding;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // symmetric around zero, not 128
pub const ARCFACE_EMBEDDING_DIM: usize = 512;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("model file not found: {0}; download w600k_r50.onnx from insightface and place it in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("empty face crop")]
    EmptyCrop,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based face recognizer.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path, intra_threads: usize) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Embed a face crop. Crops that are not 112×112 are resized first.
    pub fn embed(&mut self, crop: &RgbImage) -> Result<Embedding, RecognizerError> {
        if crop.width() == 0 || crop.height() == 0 {
            return Err(RecognizerError::EmptyCrop);
        }

        let input = if crop.dimensions() == (ALIGNED_SIZE, ALIGNED_SIZE) {
            preprocess(crop)
        } else {
            preprocess(&imageops::resize(crop, ALIGNED_SIZE, ALIGNED_SIZE, FilterType::Triangle))
        };

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::new(raw.to_vec()))
    }
}

/// 112×112 RGB crop to normalized NCHW tensor.
fn preprocess(crop: &RgbImage) -> Array4<f32> {
    let size = ALIGNED_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, Rgb(px)) in crop.enumerate_pixels() {
        for (c, &value) in px.iter().enumerate() {
            tensor[[0, c, y as usize, x as usize]] = (value as f32 - ARCFACE_MEAN) / ARCFACE_STD;
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_output_shape() {
        let crop = RgbImage::from_pixel(ALIGNED_SIZE, ALIGNED_SIZE, Rgb([128, 128, 128]));
        let tensor = preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let crop = RgbImage::from_pixel(ALIGNED_SIZE, ALIGNED_SIZE, Rgb([0, 255, 128]));
        let tensor = preprocess(&crop);
        assert!((tensor[[0, 0, 5, 5]] + 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 5, 5]] - 1.0).abs() < 1e-6);
        let expected = (128.0 - ARCFACE_MEAN) / ARCFACE_STD;
        assert!((tensor[[0, 2, 5, 5]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_keeps_channel_order() {
        let mut crop = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);
        crop.put_pixel(3, 7, Rgb([255, 0, 0]));
        let tensor = preprocess(&crop);
        assert!(tensor[[0, 0, 7, 3]] > 0.99);
        assert!(tensor[[0, 1, 7, 3]] < -0.99);
        assert!(tensor[[0, 0, 3, 7]] < -0.99);
    }

    #[test]
    fn test_load_missing_model() {
        let err = FaceRecognizer::load(Path::new("/nonexistent/w600k_r50.onnx"), 1)
            .err()
            .unwrap();
        assert!(matches!(err, RecognizerError::ModelNotFound(_)));
    }
}
