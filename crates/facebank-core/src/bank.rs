//! The prototype bank: one mean embedding per enrolled identity, plus every
//! raw embedding that went into it.
//!
//! Persisted as a JSON object with exactly two fields, `prototypes` and
//! `examples`. Label order in the file is the bank order, which the matcher
//! uses to break exact ties.

use crate::types::Embedding;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BankError {
    #[error("bank has no labels")]
    Empty,
    #[error("label {0:?} has no example embeddings")]
    NoExamples(String),
    #[error("prototypes and examples disagree on labels")]
    LabelMismatch,
    #[error("duplicate label {0:?}")]
    DuplicateLabel(String),
    #[error("label {label:?} has a {actual}-dim vector, bank dimension is {expected}")]
    DimensionMismatch {
        label: String,
        expected: usize,
        actual: usize,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Insertion-ordered `label → value` map, serialized as a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> LabelMap<V> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&V> {
        self.entries.iter().find(|(l, _)| l == label).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, label: &str) -> Option<&mut V> {
        self.entries.iter_mut().find(|(l, _)| l == label).map(|(_, v)| v)
    }

    /// Append a new label. Fails if the label is already present.
    pub fn insert(&mut self, label: String, value: V) -> Result<(), BankError> {
        if self.get(&label).is_some() {
            return Err(BankError::DuplicateLabel(label));
        }
        self.entries.push((label, value));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(l, v)| (l.as_str(), v))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }
}

impl<V> Default for LabelMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for LabelMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (label, value) in &self.entries {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for LabelMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = LabelMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of label to value")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = LabelMap::new();
                while let Some((label, value)) = access.next_entry::<String, V>()? {
                    map.insert(label, value).map_err(serde::de::Error::custom)?;
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Enrolled identities. Immutable once built; safe to share across threads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrototypeBank {
    prototypes: LabelMap<Embedding>,
    examples: LabelMap<Vec<Embedding>>,
}

/// Wire shape, validated before it becomes a [`PrototypeBank`].
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBank {
    prototypes: LabelMap<Embedding>,
    examples: LabelMap<Vec<Embedding>>,
}

impl<'de> Deserialize<'de> for PrototypeBank {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawBank::deserialize(deserializer)?;
        PrototypeBank::from_parts(raw.prototypes, raw.examples).map_err(serde::de::Error::custom)
    }
}

impl PrototypeBank {
    /// Build a bank from per-label raw embeddings, in the given label order.
    ///
    /// Each prototype is the plain mean of the raw embeddings; nothing is
    /// normalized here.
    pub fn from_examples(examples: LabelMap<Vec<Embedding>>) -> Result<Self, BankError> {
        let mut prototypes = LabelMap::new();
        for (label, embs) in examples.iter() {
            check_dims(label, embs, examples_dim(&examples))?;
            let mean = Embedding::mean(embs).ok_or_else(|| BankError::NoExamples(label.to_string()))?;
            prototypes.insert(label.to_string(), mean)?;
        }
        Self::from_parts(prototypes, examples)
    }

    /// Assemble and validate a bank from both halves.
    pub fn from_parts(
        prototypes: LabelMap<Embedding>,
        examples: LabelMap<Vec<Embedding>>,
    ) -> Result<Self, BankError> {
        if prototypes.is_empty() {
            return Err(BankError::Empty);
        }
        if !prototypes.labels().eq(examples.labels()) {
            return Err(BankError::LabelMismatch);
        }

        let dim = prototypes.entries[0].1.dim();
        for (label, proto) in prototypes.iter() {
            check_dims(label, std::slice::from_ref(proto), Some(dim))?;
        }
        for (label, embs) in examples.iter() {
            if embs.is_empty() {
                return Err(BankError::NoExamples(label.to_string()));
            }
            check_dims(label, embs, Some(dim))?;
        }

        Ok(Self { prototypes, examples })
    }

    pub fn prototypes(&self) -> &LabelMap<Embedding> {
        &self.prototypes
    }

    pub fn examples(&self) -> &LabelMap<Vec<Embedding>> {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// Embedding dimension shared by every vector in the bank.
    pub fn dim(&self) -> usize {
        self.prototypes.entries[0].1.dim()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.prototypes.labels()
    }

    /// Number of raw embeddings stored for `label`.
    pub fn example_count(&self, label: &str) -> usize {
        self.examples.get(label).map_or(0, Vec::len)
    }

    /// Write the bank as JSON.
    pub fn save(&self, path: &Path) -> Result<(), BankError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        tracing::info!(
            path = %path.display(),
            labels = self.len(),
            dim = self.dim(),
            "saved face bank"
        );
        Ok(())
    }

    /// Read and validate a bank written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, BankError> {
        let reader = BufReader::new(File::open(path)?);
        let bank: Self = serde_json::from_reader(reader)?;
        tracing::info!(
            path = %path.display(),
            labels = bank.len(),
            dim = bank.dim(),
            "loaded face bank"
        );
        Ok(bank)
    }
}

fn examples_dim(examples: &LabelMap<Vec<Embedding>>) -> Option<usize> {
    examples
        .iter()
        .find_map(|(_, embs)| embs.first().map(Embedding::dim))
}

fn check_dims(label: &str, embs: &[Embedding], expected: Option<usize>) -> Result<(), BankError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match embs.iter().find(|e| e.dim() != expected) {
        Some(bad) => Err(BankError::DimensionMismatch {
            label: label.to_string(),
            expected,
            actual: bad.dim(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(v: &[f32]) -> Embedding {
        Embedding::new(v.to_vec())
    }

    fn examples(entries: &[(&str, Vec<Embedding>)]) -> LabelMap<Vec<Embedding>> {
        let mut map = LabelMap::new();
        for (label, embs) in entries {
            map.insert(label.to_string(), embs.clone()).unwrap();
        }
        map
    }

    #[test]
    fn test_prototype_is_raw_mean() {
        let bank = PrototypeBank::from_examples(examples(&[(
            "alice",
            vec![emb(&[2.0, 0.0]), emb(&[0.0, 4.0])],
        )]))
        .unwrap();
        assert_eq!(bank.prototypes().get("alice").unwrap().values, vec![1.0, 2.0]);
        assert_eq!(bank.example_count("alice"), 2);
        assert_eq!(bank.dim(), 2);
    }

    #[test]
    fn test_label_order_preserved() {
        let bank = PrototypeBank::from_examples(examples(&[
            ("zed", vec![emb(&[1.0])]),
            ("amy", vec![emb(&[2.0])]),
            ("max", vec![emb(&[3.0])]),
        ]))
        .unwrap();
        assert_eq!(bank.labels().collect::<Vec<_>>(), vec!["zed", "amy", "max"]);
    }

    #[test]
    fn test_empty_bank_rejected() {
        let err = PrototypeBank::from_examples(LabelMap::new()).unwrap_err();
        assert!(matches!(err, BankError::Empty));
    }

    #[test]
    fn test_label_without_examples_rejected() {
        let err = PrototypeBank::from_examples(examples(&[("a", vec![])])).unwrap_err();
        assert!(matches!(err, BankError::NoExamples(l) if l == "a"));
    }

    #[test]
    fn test_mixed_dimensions_rejected() {
        let err = PrototypeBank::from_examples(examples(&[
            ("a", vec![emb(&[1.0, 0.0])]),
            ("b", vec![emb(&[1.0, 0.0, 0.0])]),
        ]))
        .unwrap_err();
        assert!(matches!(err, BankError::DimensionMismatch { expected: 2, actual: 3, .. }));
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let mut map: LabelMap<u32> = LabelMap::new();
        map.insert("a".into(), 1).unwrap();
        assert!(matches!(map.insert("a".into(), 2), Err(BankError::DuplicateLabel(_))));
    }

    #[test]
    fn test_json_has_exactly_two_fields_in_order() {
        let bank = PrototypeBank::from_examples(examples(&[
            ("zed", vec![emb(&[1.0, 0.0])]),
            ("amy", vec![emb(&[0.0, 1.0]), emb(&[0.0, 3.0])]),
        ]))
        .unwrap();

        let json = serde_json::to_string(&bank).unwrap();
        assert_eq!(
            json,
            r#"{"prototypes":{"zed":[1.0,0.0],"amy":[0.0,2.0]},"examples":{"zed":[[1.0,0.0]],"amy":[[0.0,1.0],[0.0,3.0]]}}"#
        );
    }

    #[test]
    fn test_load_keeps_file_order() {
        let json = r#"{"prototypes":{"b":[1.0],"a":[2.0]},"examples":{"b":[[1.0]],"a":[[2.0]]}}"#;
        let bank: PrototypeBank = serde_json::from_str(json).unwrap();
        assert_eq!(bank.labels().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_load_rejects_inconsistent_file() {
        let mismatched = r#"{"prototypes":{"a":[1.0]},"examples":{"b":[[1.0]]}}"#;
        assert!(serde_json::from_str::<PrototypeBank>(mismatched).is_err());

        let extra = r#"{"prototypes":{"a":[1.0]},"examples":{"a":[[1.0]]},"meta":1}"#;
        assert!(serde_json::from_str::<PrototypeBank>(extra).is_err());

        let duplicate = r#"{"prototypes":{"a":[1.0],"a":[2.0]},"examples":{"a":[[1.0]]}}"#;
        assert!(serde_json::from_str::<PrototypeBank>(duplicate).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face_bank.json");

        let bank = PrototypeBank::from_examples(examples(&[
            ("alice", vec![emb(&[0.25, -1.5, 3.0]), emb(&[0.5, -1.0, 2.0])]),
            ("bob", vec![emb(&[-0.1, 0.2, 0.3])]),
        ]))
        .unwrap();
        bank.save(&path).unwrap();

        let loaded = PrototypeBank::load(&path).unwrap();
        assert_eq!(loaded, bank);
    }
}
