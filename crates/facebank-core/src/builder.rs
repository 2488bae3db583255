//! Enrollment: turn a labeled image collection into a [`PrototypeBank`].

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::bank::{BankError, LabelMap, PrototypeBank};
use crate::dataset::LabeledImage;
use crate::types::Embedding;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Minimum detector confidence for an enrollment face.
pub const DEFAULT_ENROLL_GATE: f32 = 0.9;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("no faces passed the quality gate; nothing to enroll")]
    EmptyBank,
    #[error("inconsistent embeddings: {0}")]
    Bank(#[from] BankError),
}

/// Why an enrollment image contributed nothing.
#[derive(Debug)]
pub enum SkipReason {
    /// The image could not be opened or decoded.
    Load(image::ImageError),
    /// The face capability failed internally.
    Detection(AnalyzerError),
    NoFace,
    /// A face was found but its confidence is under the gate.
    QualityGate { confidence: f32, threshold: f32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Load(e) => write!(f, "could not load image: {e}"),
            SkipReason::Detection(e) => write!(f, "face detection failed: {e}"),
            SkipReason::NoFace => f.write_str("no face detected"),
            SkipReason::QualityGate { confidence, threshold } => {
                write!(f, "low confidence {confidence:.3} < {threshold:.2}")
            }
        }
    }
}

#[derive(Debug)]
pub struct SkippedImage {
    pub label: String,
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Outcome of an enrollment run: the bank plus everything that was left out.
#[derive(Debug)]
pub struct BuildReport {
    pub bank: PrototypeBank,
    pub accepted: usize,
    pub skipped: Vec<SkippedImage>,
}

/// Single-pass bank construction with a detector-confidence quality gate.
#[derive(Debug, Clone, Copy)]
pub struct BankBuilder {
    pub quality_threshold: f32,
}

impl Default for BankBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ENROLL_GATE)
    }
}

impl BankBuilder {
    pub fn new(quality_threshold: f32) -> Self {
        Self { quality_threshold }
    }

    /// Build the bank. Per-image failures are logged and skipped; only an
    /// empty result is an error.
    pub fn build<A: FaceAnalyzer + ?Sized>(
        &self,
        analyzer: &mut A,
        images: &[LabeledImage],
    ) -> Result<PrototypeBank, BuildError> {
        self.build_with_report(analyzer, images).map(|report| report.bank)
    }

    pub fn build_with_report<A: FaceAnalyzer + ?Sized>(
        &self,
        analyzer: &mut A,
        images: &[LabeledImage],
    ) -> Result<BuildReport, BuildError> {
        let mut per_label: LabelMap<Vec<Embedding>> = LabelMap::new();
        let mut skipped = Vec::new();
        let mut accepted = 0usize;

        for item in images {
            match self.enroll_one(analyzer, item) {
                Ok(embedding) => {
                    match per_label.get_mut(&item.label) {
                        Some(embs) => embs.push(embedding),
                        None => per_label.insert(item.label.clone(), vec![embedding])?,
                    }
                    accepted += 1;
                }
                Err(reason) => {
                    match &reason {
                        SkipReason::Load(_) | SkipReason::Detection(_) => tracing::warn!(
                            label = %item.label,
                            path = %item.path.display(),
                            %reason,
                            "skipping image"
                        ),
                        SkipReason::NoFace | SkipReason::QualityGate { .. } => tracing::info!(
                            label = %item.label,
                            path = %item.path.display(),
                            %reason,
                            "skipping image"
                        ),
                    }
                    skipped.push(SkippedImage {
                        label: item.label.clone(),
                        path: item.path.clone(),
                        reason,
                    });
                }
            }
        }

        if per_label.is_empty() {
            return Err(BuildError::EmptyBank);
        }

        let bank = PrototypeBank::from_examples(per_label)?;
        for label in bank.labels() {
            tracing::info!(label, embeddings = bank.example_count(label), "enrolled label");
        }

        Ok(BuildReport {
            bank,
            accepted,
            skipped,
        })
    }

    fn enroll_one<A: FaceAnalyzer + ?Sized>(
        &self,
        analyzer: &mut A,
        item: &LabeledImage,
    ) -> Result<Embedding, SkipReason> {
        let image = image::open(&item.path).map_err(SkipReason::Load)?.to_rgb8();

        let face = analyzer
            .detect_and_embed_best(&image)
            .map_err(SkipReason::Detection)?
            .ok_or(SkipReason::NoFace)?;

        if face.confidence < self.quality_threshold {
            return Err(SkipReason::QualityGate {
                confidence: face.confidence,
                threshold: self.quality_threshold,
            });
        }
        Ok(face.embedding)
    }
}
