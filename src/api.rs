// src/api.rs
//! HTTP surface: thin axum handlers around the pipeline and the store.
//!
//! `/retrieve` defaults to the relevance policy with the id tie-break so
//! repeated calls against an unchanged store are byte-for-byte
//! reproducible. Internal bookkeeping fields never appear in responses.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::model::PublicEvent;
use crate::pipeline::IngestPipeline;
use crate::rank::{rank, RankPolicy};
use crate::store::EventStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<EventStore>,
    pub pipeline: Arc<IngestPipeline>,
    pub half_life_hours: f64,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/retrieve", get(retrieve))
        .route("/stats", get(stats))
        .route("/events", delete(clear_events))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// 5xx wrapper: every failure is a single explicit error response.
struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0 })),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct IngestResponse {
    status: u16,
    received: usize,
    added: usize,
}

async fn ingest(
    State(state): State<AppState>,
    Json(records): Json<Vec<serde_json::Value>>,
) -> Result<Json<IngestResponse>, ApiError> {
    let report = state.pipeline.ingest_raw(records).await.map_err(|e| {
        error!(error = %e, "ingest failed");
        ApiError(format!("ingest failed: {e}"))
    })?;
    Ok(Json(IngestResponse {
        status: 200,
        received: report.received,
        added: report.added,
    }))
}

#[derive(Deserialize)]
struct RetrieveQuery {
    #[serde(default)]
    policy: Option<RankPolicy>,
}

async fn retrieve(
    State(state): State<AppState>,
    Query(q): Query<RetrieveQuery>,
) -> Json<Vec<PublicEvent>> {
    let mut events = state.store.snapshot();
    rank(
        &mut events,
        q.policy.unwrap_or_default(),
        Utc::now(),
        state.half_life_hours,
    );
    Json(events.iter().map(PublicEvent::from).collect())
}

#[derive(Serialize)]
struct ScoreDistribution {
    min: f64,
    max: f64,
    avg: f64,
}

#[derive(Serialize)]
struct StatsResponse {
    total_events: usize,
    sources: HashMap<String, usize>,
    relevance_distribution: ScoreDistribution,
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let events = state.store.snapshot();

    let mut sources: HashMap<String, usize> = HashMap::new();
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    let mut sum = 0.0;
    for ev in &events {
        *sources.entry(ev.item.source.clone()).or_default() += 1;
        min = min.min(ev.item.score);
        max = max.max(ev.item.score);
        sum += ev.item.score;
    }

    let distribution = if events.is_empty() {
        ScoreDistribution {
            min: 0.0,
            max: 0.0,
            avg: 0.0,
        }
    } else {
        ScoreDistribution {
            min,
            max,
            avg: sum / events.len() as f64,
        }
    };

    Json(StatsResponse {
        total_events: events.len(),
        sources,
        relevance_distribution: distribution,
    })
}

#[derive(Serialize)]
struct ClearResponse {
    status: &'static str,
    cleared: usize,
}

async fn clear_events(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    let cleared = state.store.clear_all().map_err(|e| {
        error!(error = %e, "clear failed");
        ApiError(format!("clear failed: {e}"))
    })?;
    Ok(Json(ClearResponse {
        status: "success",
        cleared,
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    event_count: usize,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        event_count: state.store.count(),
    })
}
