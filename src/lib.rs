// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod feeds;
pub mod source_weights;

// Fetch → rank → persist
pub mod ingest;
pub mod pipeline;
pub mod rank;
pub mod store;

// HTTP surface
pub mod api;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::error::{CycleError, RetrievalError, StoreError};
pub use crate::feeds::{Category, FeedSource, KeywordSets};
pub use crate::ingest::scheduler::{spawn_news_scheduler, RecurringTask};
pub use crate::pipeline::{CycleReport, CycleState, FetchPipeline};
pub use crate::store::{MemoryStore, NewsStore, SqliteStore};
