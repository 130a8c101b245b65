// src/sources/mod.rs
//! Source fetchers and the crawl coordinator.
//!
//! Each fetcher reaches one kind of upstream (a subreddit listing, an RSS
//! feed) and yields standardized candidates. The coordinator fans out to
//! all configured fetchers concurrently; one source failing never cancels
//! or fails its siblings — it just contributes zero items for that cycle.

pub mod mock;
pub mod reddit;
pub mod rss;

use std::sync::Arc;

use anyhow::Result;
use metrics::counter;
use once_cell::sync::OnceCell;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use crate::model::CandidateItem;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch the latest candidates from this source, newest first,
    /// capped at `limit`.
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<CandidateItem>>;
    fn name(&self) -> &str;
}

/// Minimum inter-request interval gate. A request issued before the
/// interval elapses is delayed, never dropped.
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Fans out to all configured fetchers, isolates per-source failures, and
/// concatenates the survivors into one candidate batch.
pub struct CrawlCoordinator {
    fetchers: Vec<Arc<dyn SourceFetcher>>,
}

impl CrawlCoordinator {
    pub fn new(fetchers: Vec<Arc<dyn SourceFetcher>>) -> Self {
        Self { fetchers }
    }

    pub fn source_count(&self) -> usize {
        self.fetchers.len()
    }

    /// One concurrent task per fetcher; results are gathered after all
    /// tasks complete (or individually fail) — no early exit.
    pub async fn fetch_all(&self, limit_per_source: usize) -> Vec<CandidateItem> {
        let mut set = JoinSet::new();
        for fetcher in &self.fetchers {
            let fetcher = Arc::clone(fetcher);
            set.spawn(async move {
                let name = fetcher.name().to_string();
                (name, fetcher.fetch_latest(limit_per_source).await)
            });
        }

        let mut all = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, Ok(items))) => {
                    info!(source = %name, count = items.len(), "source fetch ok");
                    all.extend(items);
                }
                Ok((name, Err(e))) => {
                    warn!(source = %name, error = ?e, "source fetch failed");
                    counter!("crawl_source_errors_total").increment(1);
                }
                Err(join_err) => {
                    warn!(error = ?join_err, "source task panicked");
                    counter!("crawl_source_errors_total").increment(1);
                }
            }
        }
        info!(total = all.len(), "crawl cycle gathered");
        all
    }
}

/// Strip HTML down to plain text: decode entities, drop tags, collapse
/// whitespace. Feed bodies routinely arrive as markup.
pub fn sanitize_html(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let mut out = html_escape::decode_html_entities(raw).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::MockFetcher;
    use chrono::{TimeZone, Utc};

    fn item(id: &str, source: &str) -> CandidateItem {
        CandidateItem {
            id: id.to_string(),
            source: source.to_string(),
            title: format!("title {id}"),
            body: None,
            published_at: Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap(),
            url: String::new(),
            score: 0.0,
        }
    }

    #[test]
    fn sanitize_html_strips_markup_and_entities() {
        let raw = "<p>Major&nbsp;outage:&amp; <b>database</b>\n\n  cluster</p><script>x()</script>";
        assert_eq!(sanitize_html(raw), "Major outage:& database cluster x()");
        assert_eq!(sanitize_html(""), "");
    }

    #[tokio::test]
    async fn coordinator_concatenates_all_sources() {
        let a = MockFetcher::with_items("a", vec![item("a1", "sa"), item("a2", "sa")]);
        let b = MockFetcher::with_items("b", vec![item("b1", "sb")]);
        let coordinator = CrawlCoordinator::new(vec![Arc::new(a), Arc::new(b)]);

        let items = coordinator.fetch_all(25).await;
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn one_failing_source_never_fails_siblings() {
        let ok = MockFetcher::with_items("ok", vec![item("a1", "sa")]);
        let broken = MockFetcher::failing("broken");
        let coordinator = CrawlCoordinator::new(vec![Arc::new(broken), Arc::new(ok)]);

        let items = coordinator.fetch_all(25).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a1");
    }

    #[tokio::test]
    async fn fetchers_respect_the_per_source_limit() {
        let many = MockFetcher::with_items(
            "many",
            (0..10).map(|i| item(&format!("m{i}"), "sm")).collect(),
        );
        let coordinator = CrawlCoordinator::new(vec![Arc::new(many)]);
        let items = coordinator.fetch_all(3).await;
        assert_eq!(items.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_gate_delays_early_requests() {
        let gate = RateGate::new(Duration::from_secs(30));
        let t0 = Instant::now();
        gate.wait().await; // first pass is free
        gate.wait().await; // must wait out the interval
        assert!(t0.elapsed() >= Duration::from_secs(30));
    }
}
