//! Threshold-gated nearest-prototype classification.

use crate::bank::PrototypeBank;
use crate::types::Embedding;
use std::fmt;

/// Default cosine threshold for accepting the nearest prototype.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.55;

/// Who a face was classified as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn is_known(&self) -> bool {
        matches!(self, Identity::Known(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Identity::Known(label) => label,
            Identity::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub identity: Identity,
    /// Best cosine similarity found, in [-1, 1]. Carried even when the
    /// identity is [`Identity::Unknown`].
    pub similarity: f32,
}

/// Strategy for classifying a probe embedding against a prototype bank.
pub trait Matcher {
    fn predict(&self, probe: &Embedding, bank: &PrototypeBank) -> Classification;
}

/// Cosine nearest-prototype matcher.
///
/// Both the probe and every prototype are compared after unit-L2
/// normalization (see [`Embedding::similarity`]). Exact ties go to the label
/// that comes first in bank order.
#[derive(Debug, Clone, Copy)]
pub struct PrototypeMatcher {
    pub threshold: f32,
}

impl PrototypeMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for PrototypeMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl Matcher for PrototypeMatcher {
    fn predict(&self, probe: &Embedding, bank: &PrototypeBank) -> Classification {
        let mut best: Option<(&str, f32)> = None;
        for (label, proto) in bank.prototypes().iter() {
            let sim = probe.similarity(proto);
            // Strict `>` keeps the earliest label on an exact tie.
            if best.map_or(true, |(_, best_sim)| sim > best_sim) {
                best = Some((label, sim));
            }
        }

        match best {
            Some((label, sim)) if sim >= self.threshold => Classification {
                identity: Identity::Known(label.to_string()),
                similarity: sim,
            },
            Some((_, sim)) => Classification {
                identity: Identity::Unknown,
                similarity: sim,
            },
            // A bank always holds at least one label.
            None => Classification {
                identity: Identity::Unknown,
                similarity: -1.0,
            },
        }
    }
}
