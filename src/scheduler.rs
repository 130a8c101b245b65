// src/scheduler.rs
//! Fixed-interval crawl-then-ingest loop.
//!
//! Cooperative polling: fetch, ingest, sleep, repeat. A slow cycle simply
//! delays the next one; store-level locking is the only overlap protection
//! the pipeline needs.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::pipeline::IngestPipeline;
use crate::sources::CrawlCoordinator;

pub fn spawn_poll_loop(
    coordinator: Arc<CrawlCoordinator>,
    pipeline: Arc<IngestPipeline>,
    interval: Duration,
    limit_per_source: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            run_cycle(&coordinator, &pipeline, limit_per_source).await;
        }
    })
}

/// One polling cycle: crawl all sources, push the batch through the
/// pipeline, and log the outcome.
pub async fn run_cycle(
    coordinator: &CrawlCoordinator,
    pipeline: &IngestPipeline,
    limit_per_source: usize,
) {
    let items = coordinator.fetch_all(limit_per_source).await;
    match pipeline.ingest(items).await {
        Ok(report) => {
            counter!("poll_runs_total").increment(1);
            gauge!("poll_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
            info!(
                target: "scheduler",
                received = report.received,
                added = report.added,
                filtered = report.filtered,
                "poll cycle finished"
            );
        }
        Err(e) => {
            counter!("poll_failures_total").increment(1);
            warn!(target: "scheduler", error = %e, "poll cycle failed");
        }
    }
}
