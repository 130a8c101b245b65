// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod app_config;
pub mod classify;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod rank;
pub mod scheduler;
pub mod sources;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::model::{CandidateItem, PublicEvent, StoredEvent};
pub use crate::pipeline::{IngestPipeline, IngestReport};
pub use crate::rank::RankPolicy;
pub use crate::store::EventStore;
