// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::RetrievalError;
use crate::feeds::{Category, FeedSource};

/// One normalized feed item, alive for a single fetch cycle.
///
/// `category` and `source_domain` are fixed at construction; only `score`
/// is written afterwards (by the ranking stage).
#[derive(Debug, Clone, PartialEq)]
pub struct RawArticle {
    title: String,
    summary: String,
    source_url: String,
    source_domain: String,
    category: Category,
    published_at: DateTime<Utc>,
    pub score: f64,
}

impl RawArticle {
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        source_url: impl Into<String>,
        source_domain: impl Into<String>,
        category: Category,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            source_url: source_url.into(),
            source_domain: source_domain.into(),
            category,
            published_at,
            score: 0.0,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn source_domain(&self) -> &str {
        &self.source_domain
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

/// Fetches and normalizes one feed. Implementations must give up once
/// `deadline` passes and report `RetrievalError::DeadlineExceeded`.
#[async_trait]
pub trait FeedRetriever: Send + Sync {
    async fn retrieve(
        &self,
        source: &FeedSource,
        deadline: Instant,
    ) -> Result<Vec<RawArticle>, RetrievalError>;
}
