// src/pipeline.rs
//! Ingestion pipeline: id gate, relevance gate, then one batched insert.
//!
//! The id check runs first because it is the cheapest and skips a
//! classifier call. Classification runs on a blocking worker under a
//! mutex (the classifier is not assumed reentrant) with a timeout; any
//! classifier fault fails closed — the item is treated as not relevant
//! and the batch continues. A storage fault, in contrast, fails the whole
//! call: the store guarantees no partial durable state, and dedup makes a
//! full retry idempotent.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::RelevanceClassifier;
use crate::model::CandidateItem;
use crate::store::{EventStore, StoreError};

pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-call ingestion statistics. `filtered` items leave no trace beyond
/// this count (a known scope choice); `failed` counts classifier faults,
/// which are a distinct condition from a genuine "not relevant" verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub received: usize,
    pub added: usize,
    pub duplicate_by_id: usize,
    pub duplicate_by_content: usize,
    pub filtered: usize,
    pub failed: usize,
    pub invalid: usize,
}

pub struct IngestPipeline {
    store: Arc<EventStore>,
    classifier: Arc<Mutex<Box<dyn RelevanceClassifier>>>,
    classify_timeout: Duration,
}

impl IngestPipeline {
    pub fn new(store: Arc<EventStore>, classifier: Box<dyn RelevanceClassifier>) -> Self {
        Self {
            store,
            classifier: Arc::new(Mutex::new(classifier)),
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
        }
    }

    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    /// Ingest loosely-shaped JSON records. Malformed records are skipped
    /// and counted per item; they never abort the batch.
    pub async fn ingest_raw(
        &self,
        records: Vec<serde_json::Value>,
    ) -> Result<IngestReport, StoreError> {
        let received = records.len();
        let mut invalid = 0usize;
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            match CandidateItem::from_value(record) {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!(error = %e, "rejected malformed candidate");
                    invalid += 1;
                }
            }
        }

        let mut report = self.ingest(items).await?;
        report.received = received;
        report.invalid = invalid;
        Ok(report)
    }

    /// Ingest typed candidates, in input order.
    pub async fn ingest(&self, items: Vec<CandidateItem>) -> Result<IngestReport, StoreError> {
        let mut report = IngestReport {
            received: items.len(),
            ..Default::default()
        };
        let mut to_store = Vec::new();

        for mut item in items {
            // Cheapest check first: a known id never reaches the classifier.
            if self.store.exists_by_id(&item.id) {
                report.duplicate_by_id += 1;
                debug!(id = %item.id, "already present, skipping");
                continue;
            }

            match self.classify_off_thread(item.classification_text()).await {
                ClassifyOutcome::Relevant(score) => {
                    item.score = score.clamp(0.0, 1.0);
                    debug!(id = %item.id, score = item.score, "passed relevance gate");
                    to_store.push(item);
                }
                ClassifyOutcome::NotRelevant(score) => {
                    debug!(id = %item.id, score, "filtered out");
                    report.filtered += 1;
                }
                ClassifyOutcome::Failed(reason) => {
                    // Fail closed: drop the item, keep the batch going.
                    warn!(id = %item.id, reason = %reason, "classifier fault, treating as not relevant");
                    counter!("ingest_classifier_faults_total").increment(1);
                    report.failed += 1;
                }
            }
        }

        let insert = self.store.insert_batch(to_store)?;
        report.added = insert.added;
        report.duplicate_by_id += insert.duplicate_by_id;
        report.duplicate_by_content = insert.duplicate_by_content;

        counter!("ingest_received_total").increment(report.received as u64);
        counter!("ingest_filtered_total").increment(report.filtered as u64);
        info!(
            received = report.received,
            added = report.added,
            dup_id = report.duplicate_by_id,
            dup_content = report.duplicate_by_content,
            filtered = report.filtered,
            failed = report.failed,
            invalid = report.invalid,
            "ingest completed"
        );
        Ok(report)
    }

    async fn classify_off_thread(&self, text: String) -> ClassifyOutcome {
        let classifier = Arc::clone(&self.classifier);
        let task = tokio::task::spawn_blocking(move || {
            let guard = classifier.lock().expect("classifier mutex poisoned");
            guard.classify(&text)
        });

        match tokio::time::timeout(self.classify_timeout, task).await {
            Ok(Ok(Ok(v))) if v.relevant => ClassifyOutcome::Relevant(v.score),
            Ok(Ok(Ok(v))) => ClassifyOutcome::NotRelevant(v.score),
            Ok(Ok(Err(e))) => ClassifyOutcome::Failed(e.to_string()),
            Ok(Err(join_err)) => ClassifyOutcome::Failed(format!("worker panicked: {join_err}")),
            Err(_) => ClassifyOutcome::Failed("classification timed out".to_string()),
        }
    }
}

enum ClassifyOutcome {
    Relevant(f64),
    NotRelevant(f64),
    Failed(String),
}
