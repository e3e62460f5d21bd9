// src/store/mod.rs
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::feeds::Category;
use crate::ingest::RawArticle;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A ranked article ready to be written for one digest date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub summary: String,
    pub source_url: String,
    pub source_name: String,
    pub category: Category,
    /// Digest date (`YYYY-MM-DD`), not the feed's publish timestamp.
    pub publish_date: String,
    /// 1-based position within its category.
    pub rank: u32,
}

impl NewArticle {
    pub fn from_ranked(article: &RawArticle, date: &str, rank: u32) -> Self {
        Self {
            title: article.title().to_string(),
            summary: article.summary().to_string(),
            source_url: article.source_url().to_string(),
            source_name: article.source_domain().to_string(),
            category: article.category(),
            publish_date: date.to_string(),
            rank,
        }
    }
}

/// A persisted digest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub source_url: String,
    pub source_name: String,
    pub category: Category,
    pub publish_date: String,
    pub rank: u32,
    pub created_at: DateTime<Utc>,
}

/// Storage collaborator for the fetch cycle and the read API.
///
/// Dates are `YYYY-MM-DD` strings, so lexical order is calendar order.
#[async_trait]
pub trait NewsStore: Send + Sync {
    async fn insert_article(&self, article: &NewArticle) -> Result<i64, StoreError>;

    /// Remove every record of `date`; returns how many were removed.
    async fn delete_articles_for_date(&self, date: &str) -> Result<u64, StoreError>;

    async fn has_articles_for_date(&self, date: &str) -> Result<bool, StoreError>;

    /// Records of `date` ordered by category, then rank.
    async fn articles_for_date(&self, date: &str) -> Result<Vec<NewsRecord>, StoreError>;

    async fn latest_date(&self) -> Result<Option<String>, StoreError>;

    /// Closest stored date strictly before `date`.
    async fn prev_date(&self, date: &str) -> Result<Option<String>, StoreError>;

    /// Closest stored date strictly after `date`.
    async fn next_date(&self, date: &str) -> Result<Option<String>, StoreError>;

    /// Distinct stored dates, newest first.
    async fn all_dates(&self) -> Result<Vec<String>, StoreError>;
}
