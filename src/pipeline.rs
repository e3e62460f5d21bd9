// src/pipeline.rs
//! Fetch cycle orchestrator.
//!
//! One cycle: fan out one retrieval task per feed under a shared deadline,
//! fan the results back in, split by category, then score, dedup and keep
//! the top N per category before replacing the stored digest for the date.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::{watch, Mutex};
use tokio::task::{self, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{CycleError, RetrievalError};
use crate::feeds::{Category, FeedSource, KeywordSets};
use crate::ingest::{FeedRetriever, RawArticle};
use crate::rank::{rank_buckets, RankStage, Scorer, DEFAULT_TOP_N};
use crate::source_weights::{SourceWeightTable, DEFAULT_SOURCE_WEIGHT};
use crate::store::{NewArticle, NewsStore};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_cycles_total", "Fetch cycles started.");
        describe_counter!(
            "fetch_source_errors_total",
            "Sources that failed or timed out within a cycle."
        );
        describe_counter!("fetch_articles_total", "Articles parsed from feeds.");
        describe_counter!(
            "fetch_articles_filtered_total",
            "Articles dropped by the keyword filter."
        );
        describe_counter!("fetch_dedup_total", "Articles removed as near-duplicate titles.");
        describe_counter!("store_insert_errors_total", "Per-article insert failures.");
        describe_histogram!("fetch_source_ms", "Per-source download + parse time in milliseconds.");
        describe_gauge!("fetch_last_cycle_ts", "Unix ts of the last finished fetch cycle.");
        describe_gauge!("scheduler_last_tick_ts", "Unix ts of the last recurring task tick.");
    });
}

/// Local calendar date as `YYYY-MM-DD`.
pub fn today_string() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    FetchingAll,
    Aggregating,
    Scoring,
    Deduplicating,
    Selecting,
    Persisting,
    /// Deadline elapsed with no source completed.
    Failed,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleState::Idle => "idle",
            CycleState::FetchingAll => "fetching_all",
            CycleState::Aggregating => "aggregating",
            CycleState::Scoring => "scoring",
            CycleState::Deduplicating => "deduplicating",
            CycleState::Selecting => "selecting",
            CycleState::Persisting => "persisting",
            CycleState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of one successful cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub date: String,
    pub sources_launched: usize,
    /// Sources that returned before the deadline (successfully or not).
    pub sources_completed: usize,
    pub sources_failed: usize,
    pub sources_timed_out: usize,
    pub articles_fetched: usize,
    pub duplicates_dropped: usize,
    pub domestic_selected: usize,
    pub global_selected: usize,
    pub deleted: u64,
    pub inserted: usize,
    pub insert_errors: usize,
}

#[derive(Default)]
struct FanIn {
    articles: Vec<RawArticle>,
    completed: usize,
    failed: usize,
    timed_out: usize,
}

#[derive(Default)]
struct Buckets {
    domestic: Vec<RawArticle>,
    global: Vec<RawArticle>,
}

impl Buckets {
    fn split(articles: Vec<RawArticle>) -> Self {
        let mut b = Buckets::default();
        for a in articles {
            match a.category() {
                Category::Domestic => b.domestic.push(a),
                Category::Global => b.global.push(a),
            }
        }
        b
    }
}

pub struct FetchPipeline {
    feeds: Arc<Vec<FeedSource>>,
    keywords: KeywordSets,
    default_source_weight: f64,
    deadline: Duration,
    top_n: usize,
    retriever: Arc<dyn FeedRetriever>,
    store: Arc<dyn NewsStore>,
    state: watch::Sender<CycleState>,
    cycle_lock: Mutex<()>,
}

impl FetchPipeline {
    pub fn new(
        feeds: Vec<FeedSource>,
        keywords: KeywordSets,
        retriever: Arc<dyn FeedRetriever>,
        store: Arc<dyn NewsStore>,
    ) -> Self {
        let (state, _) = watch::channel(CycleState::Idle);
        Self {
            feeds: Arc::new(feeds),
            keywords: keywords.normalized(),
            default_source_weight: DEFAULT_SOURCE_WEIGHT,
            deadline: DEFAULT_DEADLINE,
            top_n: DEFAULT_TOP_N,
            retriever,
            store,
            state,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn from_config(
        cfg: &AppConfig,
        retriever: Arc<dyn FeedRetriever>,
        store: Arc<dyn NewsStore>,
    ) -> Self {
        Self::new(cfg.feeds.clone(), cfg.keywords.clone(), retriever, store)
            .with_deadline(Duration::from_secs(cfg.fetch.deadline_secs))
            .with_top_n(cfg.fetch.top_n)
            .with_default_source_weight(cfg.fetch.default_source_weight)
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_default_source_weight(mut self, w: f64) -> Self {
        self.default_source_weight = w;
        self
    }

    pub fn state(&self) -> CycleState {
        *self.state.borrow()
    }

    pub fn store(&self) -> Arc<dyn NewsStore> {
        Arc::clone(&self.store)
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    fn transition(&self, next: CycleState) {
        let prev = self.state.send_replace(next);
        debug!(target: "pipeline", from = %prev, to = %next, "state");
    }

    /// Fetch, rank and persist the digest for `date`.
    ///
    /// Re-running for the same date replaces what was stored. Concurrent
    /// callers wait for the in-flight cycle to finish.
    pub async fn run_fetch_cycle(&self, date: &str) -> Result<CycleReport, CycleError> {
        ensure_metrics_described();
        let _guard = self.cycle_lock.lock().await;
        counter!("fetch_cycles_total").increment(1);
        info!(target: "pipeline", date, sources = self.feeds.len(), "fetch cycle started");

        let weights = SourceWeightTable::from_registry(&self.feeds)
            .with_default_weight(self.default_source_weight);

        self.transition(CycleState::FetchingAll);
        let fan_in = self.fetch_all().await;
        let launched = self.feeds.len();

        if launched > 0 && fan_in.completed == 0 {
            self.transition(CycleState::Failed);
            warn!(target: "pipeline", date, launched, "no source completed before the deadline");
            return Err(CycleError::AllSourcesTimedOut { launched });
        }

        self.transition(CycleState::Aggregating);
        let mut report = CycleReport {
            date: date.to_string(),
            sources_launched: launched,
            sources_completed: fan_in.completed,
            sources_failed: fan_in.failed,
            sources_timed_out: fan_in.timed_out,
            articles_fetched: fan_in.articles.len(),
            ..CycleReport::default()
        };
        let mut buckets = Buckets::split(fan_in.articles);

        let scorer = Scorer::new(Utc::now(), &weights, &self.keywords);
        let dropped = rank_buckets(
            &mut [&mut buckets.domestic, &mut buckets.global],
            self.top_n,
            &scorer,
            |stage| {
                self.transition(match stage {
                    RankStage::Scoring => CycleState::Scoring,
                    RankStage::Deduplicating => CycleState::Deduplicating,
                    RankStage::Selecting => CycleState::Selecting,
                })
            },
        );
        report.duplicates_dropped = dropped;
        counter!("fetch_dedup_total").increment(dropped as u64);
        report.domestic_selected = buckets.domestic.len();
        report.global_selected = buckets.global.len();

        self.transition(CycleState::Persisting);
        if let Err(e) = self.persist(date, &buckets, &mut report).await {
            self.transition(CycleState::Idle);
            warn!(target: "pipeline", date, error = %e, "persisting digest failed");
            return Err(e);
        }

        self.transition(CycleState::Idle);
        gauge!("fetch_last_cycle_ts").set(Utc::now().timestamp() as f64);
        info!(
            target: "pipeline",
            date,
            completed = report.sources_completed,
            failed = report.sources_failed,
            timed_out = report.sources_timed_out,
            fetched = report.articles_fetched,
            dedup = report.duplicates_dropped,
            domestic = report.domestic_selected,
            global = report.global_selected,
            inserted = report.inserted,
            insert_errors = report.insert_errors,
            "fetch cycle finished"
        );
        Ok(report)
    }

    async fn fetch_all(&self) -> FanIn {
        let deadline = Instant::now() + self.deadline;
        let mut set: JoinSet<Result<Vec<RawArticle>, RetrievalError>> = JoinSet::new();
        let mut pending: HashMap<task::Id, usize> = HashMap::with_capacity(self.feeds.len());

        for idx in 0..self.feeds.len() {
            let retriever = Arc::clone(&self.retriever);
            let feeds = Arc::clone(&self.feeds);
            let handle = set.spawn(async move { retriever.retrieve(&feeds[idx], deadline).await });
            pending.insert(handle.id(), idx);
        }

        let mut out = FanIn::default();
        loop {
            let joined = match tokio::time::timeout_at(deadline, set.join_next_with_id()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    set.abort_all();
                    break;
                }
            };
            let (id, res) = match joined {
                Ok((id, res)) => (id, Ok(res)),
                Err(e) => (e.id(), Err(e)),
            };
            let Some(idx) = pending.remove(&id) else {
                continue;
            };
            let source = &self.feeds[idx];
            match res {
                Ok(Ok(mut articles)) => {
                    out.completed += 1;
                    debug!(target: "ingest", source = %source.name, count = articles.len(), "source completed");
                    out.articles.append(&mut articles);
                }
                Ok(Err(e)) if e.is_deadline() => {
                    out.timed_out += 1;
                    counter!("fetch_source_errors_total", "kind" => "timeout").increment(1);
                    warn!(target: "ingest", source = %source.name, error = %e, "source timed out");
                }
                Ok(Err(e)) => {
                    out.completed += 1;
                    out.failed += 1;
                    counter!("fetch_source_errors_total", "kind" => "error").increment(1);
                    warn!(target: "ingest", source = %source.name, error = %e, "source failed");
                }
                Err(join_err) => {
                    out.completed += 1;
                    out.failed += 1;
                    counter!("fetch_source_errors_total", "kind" => "panic").increment(1);
                    warn!(target: "ingest", source = %source.name, error = %join_err, "retrieval task panicked");
                }
            }
        }

        // Whatever is still pending was abandoned at the deadline.
        for idx in pending.values() {
            warn!(target: "ingest", source = %self.feeds[*idx].name, "source abandoned at deadline");
        }
        counter!("fetch_source_errors_total", "kind" => "timeout").increment(pending.len() as u64);
        out.timed_out += pending.len();
        out
    }

    async fn persist(
        &self,
        date: &str,
        buckets: &Buckets,
        report: &mut CycleReport,
    ) -> Result<(), CycleError> {
        report.deleted = self.store.delete_articles_for_date(date).await?;
        if report.deleted > 0 {
            debug!(target: "store", date, deleted = report.deleted, "cleared previous digest");
        }

        for bucket in [&buckets.domestic, &buckets.global] {
            for (pos, article) in bucket.iter().enumerate() {
                let record = NewArticle::from_ranked(article, date, pos as u32 + 1);
                match self.store.insert_article(&record).await {
                    Ok(_) => report.inserted += 1,
                    Err(e) if e.is_unavailable() => return Err(e.into()),
                    Err(e) => {
                        report.insert_errors += 1;
                        counter!("store_insert_errors_total").increment(1);
                        warn!(
                            target: "store",
                            title = %record.title,
                            category = %record.category,
                            error = %e,
                            "insert failed"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}
