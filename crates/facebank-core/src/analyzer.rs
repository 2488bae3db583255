//! The face capability: detection plus embedding behind one handle.
//!
//! Everything above this module (enrollment, matching, the live loop) talks to
//! a [`FaceAnalyzer`], so tests can substitute a scripted implementation.

use crate::alignment;
use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("face has no landmarks, cannot align")]
    NoLandmarks,
    #[error("degenerate landmarks {0:?}, cannot align")]
    Alignment([(f32, f32); 5]),
    #[error("{0}")]
    Other(String),
}

/// The best face found in an image, already embedded.
#[derive(Debug, Clone)]
pub struct BestFace {
    pub embedding: Embedding,
    /// Detector confidence of the chosen face.
    pub confidence: f32,
}

/// Face detection and embedding capability.
///
/// Two separate detection entry points: one that picks and embeds the single
/// best face, and one that reports every box so the caller can crop each.
pub trait FaceAnalyzer {
    /// Detect all faces, keep the most confident one, align and embed it.
    ///
    /// `Ok(None)` means no face was found.
    fn detect_and_embed_best(&mut self, image: &RgbImage) -> Result<Option<BestFace>, AnalyzerError>;

    /// Every detected face, highest confidence first.
    fn detect_all(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError>;

    /// Embed an unaligned face crop, resized to the canonical input size.
    fn embed_crop(&mut self, crop: &RgbImage) -> Result<Embedding, AnalyzerError>;
}

/// Box-level face detection.
pub trait DetectFaces {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError>;
}

/// Crop-level face embedding.
pub trait EmbedFaces {
    fn embed(&mut self, crop: &RgbImage) -> Result<Embedding, RecognizerError>;
}

impl DetectFaces for FaceDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        FaceDetector::detect(self, image)
    }
}

impl EmbedFaces for FaceRecognizer {
    fn embed(&mut self, crop: &RgbImage) -> Result<Embedding, RecognizerError> {
        FaceRecognizer::embed(self, crop)
    }
}

/// A detector and a recognizer combined into a [`FaceAnalyzer`].
pub struct FacePipeline<D, R> {
    detector: D,
    recognizer: R,
}

/// SCRFD + ArcFace, both via ONNX Runtime.
pub type OnnxFaceAnalyzer = FacePipeline<FaceDetector, FaceRecognizer>;

impl<D, R> FacePipeline<D, R> {
    pub fn new(detector: D, recognizer: R) -> Self {
        Self { detector, recognizer }
    }
}

impl OnnxFaceAnalyzer {
    /// Load both models. Fails fast if either file is missing.
    pub fn load(
        detector_path: &Path,
        recognizer_path: &Path,
        intra_threads: usize,
    ) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(detector_path, intra_threads)?;
        let recognizer = FaceRecognizer::load(recognizer_path, intra_threads)?;
        Ok(Self::new(detector, recognizer))
    }
}

impl<D: DetectFaces, R: EmbedFaces> FaceAnalyzer for FacePipeline<D, R> {
    fn detect_and_embed_best(&mut self, image: &RgbImage) -> Result<Option<BestFace>, AnalyzerError> {
        let faces = self.detector.detect(image)?;
        let Some(best) = faces.into_iter().max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        else {
            return Ok(None);
        };

        let landmarks = best.landmarks.ok_or(AnalyzerError::NoLandmarks)?;
        let aligned =
            alignment::align_face(image, &landmarks).ok_or(AnalyzerError::Alignment(landmarks))?;
        let embedding = self.recognizer.embed(&aligned)?;

        Ok(Some(BestFace {
            embedding,
            confidence: best.confidence,
        }))
    }

    fn detect_all(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
        Ok(self.detector.detect(image)?)
    }

    fn embed_crop(&mut self, crop: &RgbImage) -> Result<Embedding, AnalyzerError> {
        Ok(self.recognizer.embed(crop)?)
    }
}
