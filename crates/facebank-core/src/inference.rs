//! Single-image classification.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::bank::PrototypeBank;
use crate::matcher::{Classification, Matcher};
use image::RgbImage;

/// Minimum detector confidence for single-image inference.
pub const DEFAULT_INFER_GATE: f32 = 0.9;

/// What a single image produced.
#[derive(Debug, Clone, PartialEq)]
pub enum InferOutcome {
    Classified {
        classification: Classification,
        /// Detector confidence of the classified face.
        confidence: f32,
    },
    /// No face, or the best face was under the gate. A result, not a failure.
    NoConfidentFace,
}

/// Classify the most confident face in `image`.
pub fn infer_image<A, M>(
    analyzer: &mut A,
    matcher: &M,
    bank: &PrototypeBank,
    image: &RgbImage,
    gate: f32,
) -> Result<InferOutcome, AnalyzerError>
where
    A: FaceAnalyzer + ?Sized,
    M: Matcher + ?Sized,
{
    let Some(face) = analyzer.detect_and_embed_best(image)? else {
        tracing::debug!("no face detected");
        return Ok(InferOutcome::NoConfidentFace);
    };

    if face.confidence < gate {
        tracing::debug!(confidence = face.confidence, gate, "face below confidence gate");
        return Ok(InferOutcome::NoConfidentFace);
    }

    let classification = matcher.predict(&face.embedding, bank);
    tracing::debug!(
        identity = %classification.identity,
        similarity = classification.similarity,
        confidence = face.confidence,
        "classified image"
    );

    Ok(InferOutcome::Classified {
        classification,
        confidence: face.confidence,
    })
}
