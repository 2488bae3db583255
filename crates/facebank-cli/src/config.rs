use anyhow::{Context, Result};
use facebank_core::builder::DEFAULT_ENROLL_GATE;
use facebank_core::inference::DEFAULT_INFER_GATE;
use facebank_core::live::DEFAULT_LIVE_GATE;
use facebank_core::matcher::DEFAULT_MATCH_THRESHOLD;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI configuration: defaults, then an optional TOML file named by
/// `FACEBANK_CONFIG`, then `FACEBANK_*` environment variables. Command-line
/// flags override all of these.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// SCRFD detector file name inside `model_dir`.
    pub detector_model: String,
    /// ArcFace recognizer file name inside `model_dir`.
    pub recognizer_model: String,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
    /// Where `build` writes the bank and `infer`/`cam` read it.
    pub bank_path: PathBuf,
    /// Cosine similarity needed to accept the nearest identity.
    pub match_threshold: f32,
    /// Detector confidence needed for an enrollment image.
    pub enroll_gate: f32,
    /// Detector confidence needed for single-image inference.
    pub infer_gate: f32,
    /// Detector confidence needed for a face in the live loop.
    pub live_gate: f32,
    /// If set, every annotated live frame is written here as JPEG.
    pub preview_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: facebank_core::default_model_dir(),
            detector_model: "det_10g.onnx".to_string(),
            recognizer_model: "w600k_r50.onnx".to_string(),
            intra_threads: 2,
            bank_path: PathBuf::from("face_bank.json"),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            enroll_gate: DEFAULT_ENROLL_GATE,
            infer_gate: DEFAULT_INFER_GATE,
            live_gate: DEFAULT_LIVE_GATE,
            preview_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the optional file and the process environment.
    pub fn load() -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let mut config = match lookup("FACEBANK_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(lookup);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `FACEBANK_*` variables. Unparseable values are
    /// ignored with a warning.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FACEBANK_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEBANK_DETECTOR_MODEL") {
            self.detector_model = v;
        }
        if let Some(v) = lookup("FACEBANK_RECOGNIZER_MODEL") {
            self.recognizer_model = v;
        }
        if let Some(v) = lookup("FACEBANK_BANK_PATH") {
            self.bank_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEBANK_PREVIEW_PATH") {
            self.preview_path = Some(PathBuf::from(v));
        }
        parse_env(&lookup, "FACEBANK_INTRA_THREADS", &mut self.intra_threads);
        parse_env(&lookup, "FACEBANK_MATCH_THRESHOLD", &mut self.match_threshold);
        parse_env(&lookup, "FACEBANK_ENROLL_GATE", &mut self.enroll_gate);
        parse_env(&lookup, "FACEBANK_INFER_GATE", &mut self.infer_gate);
        parse_env(&lookup, "FACEBANK_LIVE_GATE", &mut self.live_gate);
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.detector_model)
    }

    /// Path to the ArcFace recognition model.
    pub fn recognizer_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.recognizer_model)
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.match_threshold, 0.55);
        assert_eq!(config.enroll_gate, 0.9);
        assert_eq!(config.infer_gate, 0.9);
        assert_eq!(config.live_gate, 0.8);
        assert_eq!(config.bank_path, PathBuf::from("face_bank.json"));
        assert!(config.detector_model_path().ends_with("det_10g.onnx"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("FACEBANK_MODEL_DIR", "/opt/models"),
            ("FACEBANK_MATCH_THRESHOLD", "0.6"),
            ("FACEBANK_LIVE_GATE", " 0.75 "),
            ("FACEBANK_INTRA_THREADS", "4"),
        ]));
        assert_eq!(config.match_threshold, 0.6);
        assert_eq!(config.live_gate, 0.75);
        assert_eq!(config.intra_threads, 4);
        assert_eq!(config.recognizer_model_path(), PathBuf::from("/opt/models/w600k_r50.onnx"));
        // Untouched gates keep their defaults.
        assert_eq!(config.infer_gate, 0.9);
    }

    #[test]
    fn test_bad_env_value_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("FACEBANK_ENROLL_GATE", "high")]));
        assert_eq!(config.enroll_gate, 0.9);
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facebank.toml");
        std::fs::write(
            &path,
            "bank_path = \"/data/bank.json\"\nmatch_threshold = 0.5\npreview_path = \"/tmp/p.jpg\"\n",
        )
        .unwrap();

        let mut config = Config::from_file(&path).unwrap();
        assert_eq!(config.bank_path, PathBuf::from("/data/bank.json"));
        assert_eq!(config.match_threshold, 0.5);
        assert_eq!(config.live_gate, 0.8);

        config.apply_env(env(&[("FACEBANK_MATCH_THRESHOLD", "0.7")]));
        assert_eq!(config.match_threshold, 0.7);
        assert_eq!(config.preview_path, Some(PathBuf::from("/tmp/p.jpg")));
    }

    #[test]
    fn test_unknown_file_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facebank.toml");
        std::fs::write(&path, "threshold = 0.5\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }
}
