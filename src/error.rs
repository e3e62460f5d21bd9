// src/error.rs
//! Error taxonomy for the fetch cycle.
//!
//! - `RetrievalError`: per-source, recovered by the orchestrator.
//! - `StoreError`: storage collaborator failures; per-article unless the
//!   backend is unavailable.
//! - `CycleError`: surfaced to the caller of `run_fetch_cycle`.

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("feed parse error for {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("deadline exceeded fetching {url}")]
    DeadlineExceeded { url: String },
}

impl RetrievalError {
    pub fn is_deadline(&self) -> bool {
        matches!(self, RetrievalError::DeadlineExceeded { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend cannot be reached at all (pool closed, I/O failure, lock poisoned).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A single statement failed; other operations may still succeed.
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("corrupt row in storage: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
                StoreError::Corrupt(e.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("fetch deadline elapsed before any of {launched} sources completed")]
    AllSourcesTimedOut { launched: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}
