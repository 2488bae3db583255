//! facebank-core — Face enrollment and recognition against a prototype bank.
//!
//! Uses SCRFD for face detection and ArcFace for embeddings, both via ONNX
//! Runtime. Identities are enrolled as the mean of their raw embeddings and
//! matched by cosine similarity with an "Unknown" threshold.

pub mod alignment;
pub mod analyzer;
pub mod annotate;
pub mod bank;
pub mod builder;
pub mod dataset;
pub mod detector;
pub mod inference;
pub mod live;
pub mod matcher;
pub mod recognizer;
pub mod types;

pub use analyzer::{
    AnalyzerError, BestFace, DetectFaces, EmbedFaces, FaceAnalyzer, FacePipeline, OnnxFaceAnalyzer,
};
pub use bank::{BankError, LabelMap, PrototypeBank};
pub use builder::{BankBuilder, BuildError, BuildReport, SkipReason};
pub use dataset::{list_labeled_images, LabeledImage};
pub use inference::{infer_image, InferOutcome};
pub use live::{FaceAnnotation, FaceVerdict, FrameSink, FrameSource, LiveLoop, LiveSummary};
pub use matcher::{Classification, Identity, Matcher, PrototypeMatcher};
pub use types::{BoundingBox, Embedding};

use std::path::PathBuf;

/// Default location of the ONNX model files: `$XDG_DATA_HOME/facebank/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facebank/models")
}
