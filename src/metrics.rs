// src/metrics.rs
//! Prometheus wiring: install the global recorder once at startup and
//! hand back a router serving `/metrics`.

use axum::{routing::get, Router};
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the recorder and pre-describe the series the pipeline emits,
/// so they show up on `/metrics` before the first poll cycle.
pub fn install_prometheus() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus: install recorder");

    describe_counter!("ingest_received_total", "Candidates handed to the pipeline.");
    describe_counter!("ingest_filtered_total", "Candidates dropped by the relevance gate.");
    describe_counter!(
        "ingest_classifier_faults_total",
        "Classifier errors/timeouts treated as not relevant."
    );
    describe_counter!("store_insert_total", "Events appended to the store.");
    describe_counter!("store_dup_id_total", "Inserts skipped as id duplicates.");
    describe_counter!("store_dup_content_total", "Inserts skipped as content duplicates.");
    describe_counter!("crawl_source_errors_total", "Per-source fetch failures.");

    handle
}

/// Router exposing `/metrics` in the Prometheus exposition format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let h = handle.clone();
            async move { h.render() }
        }),
    )
}
