// src/store/memory.rs
//! In-memory `NewsStore`, for tests and ephemeral runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use super::{NewArticle, NewsRecord, NewsStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    rows: Vec<NewsRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store mutex poisoned".to_string()))
    }

    /// Every stored row, insertion order.
    pub fn snapshot(&self) -> Vec<NewsRecord> {
        self.lock().map(|g| g.rows.clone()).unwrap_or_default()
    }

    fn dates(&self) -> Result<BTreeSet<String>, StoreError> {
        let g = self.lock()?;
        Ok(g.rows.iter().map(|r| r.publish_date.clone()).collect())
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn insert_article(&self, article: &NewArticle) -> Result<i64, StoreError> {
        let mut g = self.lock()?;
        g.next_id += 1;
        let id = g.next_id;
        g.rows.push(NewsRecord {
            id,
            title: article.title.clone(),
            summary: article.summary.clone(),
            source_url: article.source_url.clone(),
            source_name: article.source_name.clone(),
            category: article.category,
            publish_date: article.publish_date.clone(),
            rank: article.rank,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn delete_articles_for_date(&self, date: &str) -> Result<u64, StoreError> {
        let mut g = self.lock()?;
        let before = g.rows.len();
        g.rows.retain(|r| r.publish_date != date);
        Ok((before - g.rows.len()) as u64)
    }

    async fn has_articles_for_date(&self, date: &str) -> Result<bool, StoreError> {
        let g = self.lock()?;
        Ok(g.rows.iter().any(|r| r.publish_date == date))
    }

    async fn articles_for_date(&self, date: &str) -> Result<Vec<NewsRecord>, StoreError> {
        let g = self.lock()?;
        let mut out: Vec<NewsRecord> = g
            .rows
            .iter()
            .filter(|r| r.publish_date == date)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.category
                .as_str()
                .cmp(b.category.as_str())
                .then(a.rank.cmp(&b.rank))
        });
        Ok(out)
    }

    async fn latest_date(&self) -> Result<Option<String>, StoreError> {
        Ok(self.dates()?.into_iter().next_back())
    }

    async fn prev_date(&self, date: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .dates()?
            .into_iter()
            .filter(|d| d.as_str() < date)
            .next_back())
    }

    async fn next_date(&self, date: &str) -> Result<Option<String>, StoreError> {
        Ok(self.dates()?.into_iter().find(|d| d.as_str() > date))
    }

    async fn all_dates(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.dates()?.into_iter().rev().collect())
    }
}
