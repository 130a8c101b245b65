// src/store/mod.rs
//! # Event Store
//! Durable, deduplicated, queryable log of stored events.
//!
//! The store keeps an append log plus two hash indexes (`id -> position`,
//! `content_fingerprint -> position`) behind one `RwLock`. Mutations take
//! the write lock, so the check-then-append sequence can never race; reads
//! take the read lock and observe a consistent snapshot.
//!
//! Durability is a whole-log JSON file written via temp-file + atomic
//! rename. A failed write rolls the in-memory appends back, so the store is
//! never partially updated and a caller can safely retry the whole batch
//! (dedup makes the retry idempotent).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info};

use crate::model::{content_fingerprint, CandidateItem, StoredEvent};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("event log I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("event log encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-batch insertion statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    pub received: usize,
    pub added: usize,
    pub duplicate_by_id: usize,
    pub duplicate_by_content: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    PublishedAt,
    IngestedAt,
}

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub sort: SortField,
    pub descending: bool,
    pub limit: Option<usize>,
    pub source_filter: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            sort: SortField::PublishedAt,
            descending: true,
            limit: None,
            source_filter: None,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    log: Vec<StoredEvent>,
    by_id: HashMap<String, usize>,
    by_fingerprint: HashMap<String, usize>,
}

impl Inner {
    fn index(&mut self, pos: usize) {
        let ev = &self.log[pos];
        self.by_id.insert(ev.item.id.clone(), pos);
        self.by_fingerprint.insert(ev.content_fingerprint.clone(), pos);
    }
}

#[derive(Debug)]
pub struct EventStore {
    path: Option<PathBuf>,
    inner: RwLock<Inner>,
}

impl EventStore {
    /// Open a store backed by a JSON log file. A missing file is an empty
    /// store; an existing one is loaded and both indexes are rebuilt.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut inner = Inner::default();
        if path.exists() {
            let raw = fs::read_to_string(&path)?;
            inner.log = serde_json::from_str(&raw)?;
            for pos in 0..inner.log.len() {
                inner.index(pos);
            }
        }
        info!(path = %path.display(), events = inner.log.len(), "opened event store");

        Ok(Self {
            path: Some(path),
            inner: RwLock::new(inner),
        })
    }

    /// Volatile store with no backing file. Used by tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Insert a batch of scored candidates, in input order. Each item is
    /// checked against the current state *including earlier items of the
    /// same batch*, so batch-internal duplicates are caught too.
    pub fn insert_batch(&self, items: Vec<CandidateItem>) -> Result<InsertReport, StoreError> {
        let mut report = InsertReport {
            received: items.len(),
            ..Default::default()
        };

        let mut inner = self.inner.write().expect("event store lock poisoned");
        let mark = inner.log.len();

        for mut item in items {
            let fingerprint = content_fingerprint(&item.title, item.body.as_deref());

            if inner.by_id.contains_key(&item.id) {
                report.duplicate_by_id += 1;
                debug!(id = %item.id, "skipped id duplicate");
                continue;
            }
            if inner.by_fingerprint.contains_key(&fingerprint) {
                report.duplicate_by_content += 1;
                debug!(id = %item.id, "skipped content duplicate");
                continue;
            }

            item.score = sanitize_score(item.score);
            let ev = StoredEvent {
                item,
                content_fingerprint: fingerprint,
                ingested_at: Utc::now(),
            };
            inner.log.push(ev);
            let pos = inner.log.len() - 1;
            inner.index(pos);
            report.added += 1;
        }

        if report.added > 0 {
            if let Err(e) = self.persist(&inner) {
                // Roll the batch back so memory matches disk.
                for ev in inner.log.split_off(mark) {
                    inner.by_id.remove(&ev.item.id);
                    inner.by_fingerprint.remove(&ev.content_fingerprint);
                }
                return Err(e);
            }
        }

        counter!("store_insert_total").increment(report.added as u64);
        counter!("store_dup_id_total").increment(report.duplicate_by_id as u64);
        counter!("store_dup_content_total").increment(report.duplicate_by_content as u64);
        info!(
            received = report.received,
            added = report.added,
            dup_id = report.duplicate_by_id,
            dup_content = report.duplicate_by_content,
            "insert batch"
        );
        Ok(report)
    }

    /// Filtered, sorted read access. The sort key is `(field, id)` so the
    /// order is total even when timestamps collide.
    pub fn query(&self, opts: &QueryOptions) -> Vec<StoredEvent> {
        let inner = self.inner.read().expect("event store lock poisoned");
        let mut events: Vec<StoredEvent> = inner
            .log
            .iter()
            .filter(|ev| match opts.source_filter.as_deref() {
                Some(f) => source_matches(f, &ev.item.source),
                None => true,
            })
            .cloned()
            .collect();
        drop(inner);

        events.sort_by(|a, b| {
            let ord = match opts.sort {
                SortField::PublishedAt => (a.item.published_at, &a.item.id)
                    .cmp(&(b.item.published_at, &b.item.id)),
                SortField::IngestedAt => {
                    (a.ingested_at, &a.item.id).cmp(&(b.ingested_at, &b.item.id))
                }
            };
            if opts.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        if let Some(limit) = opts.limit {
            events.truncate(limit);
        }
        events
    }

    /// Unordered copy of the full log, for the ranker.
    pub fn snapshot(&self) -> Vec<StoredEvent> {
        self.inner
            .read()
            .expect("event store lock poisoned")
            .log
            .clone()
    }

    pub fn exists_by_id(&self, id: &str) -> bool {
        self.inner
            .read()
            .expect("event store lock poisoned")
            .by_id
            .contains_key(id)
    }

    /// Events from one source, exact match only.
    pub fn events_by_source(&self, source: &str) -> Vec<StoredEvent> {
        self.inner
            .read()
            .expect("event store lock poisoned")
            .log
            .iter()
            .filter(|ev| ev.item.source == source)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.inner
            .read()
            .expect("event store lock poisoned")
            .log
            .len()
    }

    /// Remove all events, persist the empty log, and return the number
    /// removed. On a persistence failure the previous state is restored.
    pub fn clear_all(&self) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().expect("event store lock poisoned");
        let previous = std::mem::take(&mut *inner);
        if let Err(e) = self.persist(&inner) {
            *inner = previous;
            return Err(e);
        }
        info!(cleared = previous.log.len(), "cleared event store");
        Ok(previous.log.len())
    }

    fn persist(&self, inner: &Inner) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&inner.log)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Exact source match, except the reserved `reddit` / `rss` families:
/// a filter starting with one of those prefixes matches every source of
/// that family (e.g. `reddit` hits `reddit_r_sysadmin`).
fn source_matches(filter: &str, source: &str) -> bool {
    for family in ["reddit", "rss"] {
        if filter.starts_with(family) {
            return source.starts_with(family);
        }
    }
    source == filter
}

fn sanitize_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: &str, source: &str, title: &str) -> CandidateItem {
        CandidateItem {
            id: id.to_string(),
            source: source.to_string(),
            title: title.to_string(),
            body: None,
            published_at: Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap(),
            url: String::new(),
            score: 0.8,
        }
    }

    #[test]
    fn insert_then_lookup() {
        let store = EventStore::in_memory();
        let report = store
            .insert_batch(vec![item("a", "s1", "first"), item("b", "s2", "second")])
            .unwrap();
        assert_eq!(report.added, 2);
        assert!(store.exists_by_id("a"));
        assert!(!store.exists_by_id("c"));
        assert_eq!(store.count(), 2);
        assert_eq!(store.events_by_source("s1").len(), 1);
    }

    #[test]
    fn batch_internal_duplicates_are_caught() {
        let store = EventStore::in_memory();
        let report = store
            .insert_batch(vec![
                item("a", "s1", "same title"),
                item("a", "s1", "same title"),
                item("b", "s2", "same title"),
            ])
            .unwrap();
        assert_eq!(report.received, 3);
        assert_eq!(report.added, 1);
        assert_eq!(report.duplicate_by_id, 1);
        assert_eq!(report.duplicate_by_content, 1);
    }

    #[test]
    fn score_is_clamped_into_unit_interval() {
        let store = EventStore::in_memory();
        let mut hot = item("a", "s1", "hot");
        hot.score = 3.5;
        let mut cold = item("b", "s1", "cold");
        cold.score = -1.0;
        store.insert_batch(vec![hot, cold]).unwrap();
        for ev in store.snapshot() {
            assert!((0.0..=1.0).contains(&ev.item.score));
        }
    }

    #[test]
    fn query_orders_by_field_then_id() {
        let store = EventStore::in_memory();
        // identical timestamps; id breaks the tie
        let a = item("a", "s1", "t1");
        let b = item("b", "s1", "t2");
        store.insert_batch(vec![a, b]).unwrap();

        let desc = store.query(&QueryOptions::default());
        assert_eq!(desc[0].item.id, "b");
        let asc = store.query(&QueryOptions {
            descending: false,
            ..Default::default()
        });
        assert_eq!(asc[0].item.id, "a");
    }

    #[test]
    fn source_filter_prefix_families() {
        let store = EventStore::in_memory();
        store
            .insert_batch(vec![
                item("a", "reddit_r_sysadmin", "t1"),
                item("b", "reddit_r_netsec", "t2"),
                item("c", "rss_arstechnica_com", "t3"),
                item("d", "manual", "t4"),
            ])
            .unwrap();

        let q = |f: &str| {
            store.query(&QueryOptions {
                source_filter: Some(f.to_string()),
                ..Default::default()
            })
        };
        assert_eq!(q("reddit").len(), 2);
        assert_eq!(q("reddit_r_sysadmin").len(), 2); // whole family by design
        assert_eq!(q("rss").len(), 1);
        assert_eq!(q("manual").len(), 1);
        assert_eq!(q("nonexistent").len(), 0);
    }

    #[test]
    fn clear_all_empties_store() {
        let store = EventStore::in_memory();
        store.insert_batch(vec![item("a", "s1", "t1")]).unwrap();
        assert_eq!(store.clear_all().unwrap(), 1);
        assert_eq!(store.count(), 0);
        // ids are insertable again after a clear
        let report = store.insert_batch(vec![item("a", "s1", "t1")]).unwrap();
        assert_eq!(report.added, 1);
    }
}
