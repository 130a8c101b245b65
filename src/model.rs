// src/model.rs
//! Canonical item shapes shared by fetchers, pipeline, and store.
//!
//! A `CandidateItem` is a raw item proposed for ingestion; it becomes a
//! `StoredEvent` only after it passes the relevance gate and both dedup
//! checks. Timestamps are UTC everywhere; an unparsable `published_at`
//! is a validation error at the boundary, never a silent default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A standardized news item from any source, prior to relevance/dedup
/// decisions. `score` is meaningless until the pipeline overwrites it with
/// the classifier's relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: String,
    pub source: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub score: f64,
}

/// A candidate that passed both gates and is durably persisted.
/// Immutable once written; the only mutations a store supports are
/// append and clear-all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    #[serde(flatten)]
    pub item: CandidateItem,
    pub content_fingerprint: String,
    pub ingested_at: DateTime<Utc>,
}

/// Public projection of a stored event for API consumers. Internal
/// bookkeeping fields (`content_fingerprint`, `ingested_at`) never leak
/// through this shape.
#[derive(Debug, Clone, Serialize)]
pub struct PublicEvent {
    pub id: String,
    pub source: String,
    pub title: String,
    pub body: Option<String>,
    pub published_at: DateTime<Utc>,
    pub score: f64,
    pub url: String,
}

impl From<&StoredEvent> for PublicEvent {
    fn from(ev: &StoredEvent) -> Self {
        Self {
            id: ev.item.id.clone(),
            source: ev.item.source.clone(),
            title: ev.item.title.clone(),
            body: ev.item.body.clone(),
            published_at: ev.item.published_at,
            score: ev.item.score,
            url: ev.item.url.clone(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed candidate record: {0}")]
    Malformed(String),
    #[error("title must be non-empty")]
    EmptyTitle,
}

impl CandidateItem {
    /// Validate a loosely-shaped JSON object into a typed candidate.
    /// Unknown-shaped input is rejected here, per item, so one bad record
    /// never fails a whole batch.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ValidationError> {
        let item: CandidateItem = serde_json::from_value(value)
            .map_err(|e| ValidationError::Malformed(e.to_string()))?;
        if item.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(item)
    }

    /// Text handed to the relevance classifier: title plus, if present,
    /// a newline and the body.
    pub fn classification_text(&self) -> String {
        match self.body.as_deref() {
            Some(b) if !b.is_empty() => format!("{}\n{}", self.title, b),
            _ => self.title.clone(),
        }
    }
}

/// Deterministic fingerprint over `title` + `body`, used to collapse
/// content-identical items that arrive under different ids/sources.
pub fn content_fingerprint(title: &str, body: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    if let Some(b) = body {
        hasher.update(b.as_bytes());
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
