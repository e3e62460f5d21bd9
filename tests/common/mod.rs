// tests/common/mod.rs
//
// Shared doubles for integration tests: a scripted FeedRetriever and a
// NewsStore wrapper that injects failures.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::Instant;

use ai_news_digest::error::{RetrievalError, StoreError};
use ai_news_digest::feeds::{Category, FeedSource, KeywordSets};
use ai_news_digest::ingest::{FeedRetriever, RawArticle};
use ai_news_digest::store::{MemoryStore, NewArticle, NewsRecord, NewsStore};
use ai_news_digest::FetchPipeline;

/// What the stub does for one feed URL.
#[derive(Clone)]
pub enum Behavior {
    Articles(Vec<RawArticle>),
    /// Sleep, then return the articles.
    Delayed(Duration, Vec<RawArticle>),
    Network,
    /// Never returns; only the deadline ends it.
    Hang,
    /// Waits for the deadline and reports it, like the HTTP provider does.
    Deadline,
}

#[derive(Default)]
pub struct StubRetriever {
    by_url: HashMap<String, Behavior>,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl StubRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, url: &str, behavior: Behavior) -> Self {
        self.by_url.insert(url.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedRetriever for StubRetriever {
    async fn retrieve(
        &self,
        source: &FeedSource,
        deadline: Instant,
    ) -> Result<Vec<RawArticle>, RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let res = match self.by_url.get(&source.url).cloned() {
            Some(Behavior::Articles(v)) => Ok(v),
            Some(Behavior::Delayed(d, v)) => {
                tokio::time::sleep(d).await;
                Ok(v)
            }
            Some(Behavior::Network) | None => Err(RetrievalError::Network {
                url: source.url.clone(),
                reason: "connection refused".into(),
            }),
            Some(Behavior::Hang) => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
            Some(Behavior::Deadline) => {
                tokio::time::sleep_until(deadline).await;
                Err(RetrievalError::DeadlineExceeded {
                    url: source.url.clone(),
                })
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        res
    }
}

/// How `FlakyStore` should misbehave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    None,
    /// Inserts whose title contains "poison" fail with a backend error.
    PoisonTitles,
    /// Every insert reports the backend as unreachable.
    InsertUnavailable,
    DeleteFails,
    /// Reads (`has_articles_for_date`) fail.
    ReadFails,
}

pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fault: Fault,
    pub insert_attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(fault: Fault) -> Self {
        Self {
            inner: MemoryStore::new(),
            fault,
            insert_attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl NewsStore for FlakyStore {
    async fn insert_article(&self, article: &NewArticle) -> Result<i64, StoreError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::PoisonTitles if article.title.contains("poison") => {
                Err(StoreError::Backend("constraint failed".into()))
            }
            Fault::InsertUnavailable => Err(StoreError::Unavailable("disk gone".into())),
            _ => self.inner.insert_article(article).await,
        }
    }

    async fn delete_articles_for_date(&self, date: &str) -> Result<u64, StoreError> {
        if self.fault == Fault::DeleteFails {
            return Err(StoreError::Backend("delete refused".into()));
        }
        self.inner.delete_articles_for_date(date).await
    }

    async fn has_articles_for_date(&self, date: &str) -> Result<bool, StoreError> {
        if self.fault == Fault::ReadFails {
            return Err(StoreError::Unavailable("read refused".into()));
        }
        self.inner.has_articles_for_date(date).await
    }

    async fn articles_for_date(&self, date: &str) -> Result<Vec<NewsRecord>, StoreError> {
        self.inner.articles_for_date(date).await
    }

    async fn latest_date(&self) -> Result<Option<String>, StoreError> {
        self.inner.latest_date().await
    }

    async fn prev_date(&self, date: &str) -> Result<Option<String>, StoreError> {
        self.inner.prev_date(date).await
    }

    async fn next_date(&self, date: &str) -> Result<Option<String>, StoreError> {
        self.inner.next_date(date).await
    }

    async fn all_dates(&self) -> Result<Vec<String>, StoreError> {
        self.inner.all_dates().await
    }
}

pub const DOMESTIC_URL: &str = "https://cn.example/feed";
pub const GLOBAL_URL: &str = "https://news.example/feed";
pub const BROKEN_URL: &str = "https://broken.example/feed";

pub fn feed(name: &str, url: &str, category: Category) -> FeedSource {
    FeedSource::new(name, url, category, true, 1.0)
}

/// Article aged `age_h` hours, with a keyword-free summary.
pub fn article(title: &str, domain: &str, category: Category, age_h: i64) -> RawArticle {
    RawArticle::new(
        title,
        "plain summary",
        format!("https://{domain}/{}", title.len()),
        domain,
        category,
        Utc::now() - ChronoDuration::hours(age_h),
    )
}

/// Seven distinct domestic stories (1 newest) plus a stale near-duplicate of story 1.
pub fn domestic_batch() -> Vec<RawArticle> {
    let mut v: Vec<RawArticle> = (1..=7)
        .map(|i| article(&format!("Domestic story {i}"), "cn.example", Category::Domestic, i))
        .collect();
    v.push(article("domestic story 1!", "cn.example", Category::Domestic, 30));
    v
}

pub fn global_batch() -> Vec<RawArticle> {
    (1..=3)
        .map(|i| article(&format!("Global story {i}"), "news.example", Category::Global, i))
        .collect()
}

/// Two healthy feeds (8 + 3 articles) and one that fails with a network error.
pub fn standard_setup() -> (Vec<FeedSource>, StubRetriever) {
    let feeds = vec![
        feed("CN Example", DOMESTIC_URL, Category::Domestic),
        feed("News Example", GLOBAL_URL, Category::Global),
        feed("Broken", BROKEN_URL, Category::Global),
    ];
    let stub = StubRetriever::new()
        .on(DOMESTIC_URL, Behavior::Articles(domestic_batch()))
        .on(GLOBAL_URL, Behavior::Articles(global_batch()))
        .on(BROKEN_URL, Behavior::Network);
    (feeds, stub)
}

pub fn pipeline_with(
    feeds: Vec<FeedSource>,
    retriever: Arc<dyn FeedRetriever>,
    store: Arc<dyn NewsStore>,
) -> FetchPipeline {
    FetchPipeline::new(feeds, KeywordSets::default(), retriever, store)
}

pub fn seeded(date: &str, category: Category, rank: u32, title: &str) -> NewArticle {
    NewArticle {
        title: title.to_string(),
        summary: String::new(),
        source_url: format!("https://seed.example/{date}/{rank}"),
        source_name: "seed.example".to_string(),
        category,
        publish_date: date.to_string(),
        rank,
    }
}
