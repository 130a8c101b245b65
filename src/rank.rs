// src/rank.rs
//! Deterministic ordering over a snapshot of stored events.
//!
//! Three policies: pure relevance, pure recency, and relevance attenuated
//! by an exponential time decay. Ties always break by `id` descending, so
//! repeated calls against an unchanged store return the identical order.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::StoredEvent;

/// Age, in hours, at which the decay factor halves a score.
pub const DEFAULT_HALF_LIFE_HOURS: f64 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankPolicy {
    /// Canonical API-facing order: `score` descending.
    #[default]
    Relevance,
    /// `published_at` descending.
    Recency,
    /// `score * 2^(-age_hours / half_life)` descending.
    Hybrid,
}

/// Relevance score attenuated by time decay. Ages are clamped at zero so
/// a future-dated event is not boosted beyond its raw score.
pub fn hybrid_score(ev: &StoredEvent, now: DateTime<Utc>, half_life_hours: f64) -> f64 {
    let age_hours = (now - ev.item.published_at).num_seconds().max(0) as f64 / 3600.0;
    ev.item.score * 0.5_f64.powf(age_hours / half_life_hours)
}

/// Order `events` in place under `policy`. `now` is passed in so hybrid
/// ordering is reproducible in tests.
pub fn rank(
    events: &mut [StoredEvent],
    policy: RankPolicy,
    now: DateTime<Utc>,
    half_life_hours: f64,
) {
    match policy {
        RankPolicy::Relevance => {
            events.sort_by(|a, b| {
                b.item
                    .score
                    .total_cmp(&a.item.score)
                    .then_with(|| b.item.id.cmp(&a.item.id))
            });
        }
        RankPolicy::Recency => {
            events.sort_by(|a, b| {
                b.item
                    .published_at
                    .cmp(&a.item.published_at)
                    .then_with(|| b.item.id.cmp(&a.item.id))
            });
        }
        RankPolicy::Hybrid => {
            events.sort_by(|a, b| {
                hybrid_score(b, now, half_life_hours)
                    .total_cmp(&hybrid_score(a, now, half_life_hours))
                    .then_with(|| b.item.id.cmp(&a.item.id))
            });
        }
    }
}
