// src/classify.rs
//! Relevance gate: the narrow classifier contract plus the default
//! keyword-weight implementation.
//!
//! The pipeline only depends on the [`RelevanceClassifier`] trait; the
//! concrete classifier is constructed once at startup and injected. A
//! classifier is treated as effectively single-threaded (shared model
//! state is not assumed reentrant), so callers serialize access to it.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

pub const DEFAULT_RELEVANCE_CONFIG_PATH: &str = "config/relevance.toml";
pub const ENV_RELEVANCE_CONFIG_PATH: &str = "RELEVANCE_CONFIG_PATH";
pub const ENV_RELEVANCE_THRESHOLD: &str = "RELEVANCE_THRESHOLD";

/// Classifier output: a boolean gate decision plus a continuous
/// relevance score in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub relevant: bool,
    pub score: f64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassifyError {
    #[error("classifier backend unavailable: {0}")]
    Unavailable(String),
    #[error("classifier produced malformed output: {0}")]
    Malformed(String),
}

pub trait RelevanceClassifier: Send {
    fn classify(&self, text: &str) -> Result<Verdict, ClassifyError>;
    fn name(&self) -> &'static str {
        "classifier"
    }
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct RelevanceRoot {
    relevance: RelevanceSection,
    weights: HashMap<String, i32>,
}

#[derive(Debug, Clone, Deserialize)]
struct RelevanceSection {
    threshold: f64,
    /// Weighted-sum value at which the score saturates to 1.0.
    #[serde(default = "default_saturation")]
    saturation: f64,
}

fn default_saturation() -> f64 {
    6.0
}

/// Weighted-keyword relevance gate. Terms and threshold come from TOML;
/// the score is the term-weight sum scaled into `[0, 1]` by the
/// saturation constant.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    weights: HashMap<String, i32>,
    threshold: f64,
    saturation: f64,
}

impl KeywordClassifier {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        let root: RelevanceRoot = toml::from_str(raw)?;
        let threshold = env_threshold().unwrap_or(root.relevance.threshold);
        Ok(Self {
            weights: root
                .weights
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            threshold: threshold.clamp(0.0, 1.0),
            saturation: root.relevance.saturation.max(1.0),
        })
    }

    pub fn from_toml_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let c = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), terms = c.weights.len(), threshold = c.threshold,
            "loaded relevance config");
        Ok(c)
    }

    /// Load from `$RELEVANCE_CONFIG_PATH`, then `config/relevance.toml`,
    /// then the compiled-in default.
    pub fn from_toml() -> anyhow::Result<Self> {
        if let Ok(p) = std::env::var(ENV_RELEVANCE_CONFIG_PATH) {
            return Self::from_toml_path(Path::new(&p));
        }
        let default = Path::new(DEFAULT_RELEVANCE_CONFIG_PATH);
        if default.exists() {
            return Self::from_toml_path(default);
        }
        Self::from_toml_str(include_str!("../config/relevance.toml"))
    }
}

impl RelevanceClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Result<Verdict, ClassifyError> {
        let mut sum: i64 = 0;
        for tok in tokenize(text) {
            if let Some(w) = self.weights.get(&tok) {
                sum += *w as i64;
            }
        }
        let score = (sum.max(0) as f64 / self.saturation).min(1.0);
        Ok(Verdict {
            relevant: score >= self.threshold,
            score,
        })
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

/// Alphanumeric tokens, lower-cased.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

// parse optional float env and clamp to <0.0..=1.0>
fn env_threshold() -> Option<f64> {
    std::env::var(ENV_RELEVANCE_THRESHOLD)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .map(|v| v.clamp(0.0, 1.0))
}

// --- Test helper ---

/// Scripted classifier: pops one response per call, then keeps returning
/// the fallback.
pub struct MockClassifier {
    script: std::sync::Mutex<std::collections::VecDeque<Result<Verdict, ClassifyError>>>,
    fallback: Result<Verdict, ClassifyError>,
}

impl MockClassifier {
    pub fn always(relevant: bool, score: f64) -> Self {
        Self {
            script: std::sync::Mutex::new(Default::default()),
            fallback: Ok(Verdict { relevant, score }),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: std::sync::Mutex::new(Default::default()),
            fallback: Err(ClassifyError::Unavailable("mock outage".into())),
        }
    }

    pub fn scripted(
        responses: Vec<Result<Verdict, ClassifyError>>,
        fallback: Result<Verdict, ClassifyError>,
    ) -> Self {
        Self {
            script: std::sync::Mutex::new(responses.into()),
            fallback,
        }
    }
}

impl RelevanceClassifier for MockClassifier {
    fn classify(&self, _text: &str) -> Result<Verdict, ClassifyError> {
        let mut script = self.script.lock().expect("mock classifier mutex poisoned");
        script.pop_front().unwrap_or_else(|| self.fallback.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
