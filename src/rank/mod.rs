// src/rank/mod.rs
//! Ranking stage: score → stable sort → title dedup → top-N.

pub mod dedup;
pub mod scoring;

pub use dedup::{dedup_by_title, title_key};
pub use scoring::Scorer;

use crate::ingest::RawArticle;

/// Articles kept per category when nothing else is configured.
pub const DEFAULT_TOP_N: usize = 5;

/// Stable, score-descending. Equal scores keep their input order.
pub fn sort_by_score(articles: &mut [RawArticle]) {
    articles.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Phases of [`rank_buckets`], reported before each one starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankStage {
    Scoring,
    Deduplicating,
    Selecting,
}

/// Rank several category buckets in lockstep: every bucket is scored and
/// sorted, then deduplicated, then cut to `top_n`. Returns how many
/// duplicates were dropped across all buckets.
pub fn rank_buckets(
    buckets: &mut [&mut Vec<RawArticle>],
    top_n: usize,
    scorer: &Scorer<'_>,
    mut on_stage: impl FnMut(RankStage),
) -> usize {
    on_stage(RankStage::Scoring);
    for bucket in buckets.iter_mut() {
        scorer.score_all(bucket);
        sort_by_score(bucket);
    }

    on_stage(RankStage::Deduplicating);
    let mut dropped_total = 0;
    for bucket in buckets.iter_mut() {
        let (kept, dropped) = dedup_by_title(std::mem::take(&mut **bucket));
        **bucket = kept;
        dropped_total += dropped;
    }

    on_stage(RankStage::Selecting);
    for bucket in buckets.iter_mut() {
        bucket.truncate(top_n);
    }
    dropped_total
}

/// Score, sort, deduplicate and truncate one category bucket.
/// An empty input yields an empty output.
pub fn rank_and_select(mut articles: Vec<RawArticle>, top_n: usize, scorer: &Scorer<'_>) -> Vec<RawArticle> {
    rank_buckets(&mut [&mut articles], top_n, scorer, |_| {});
    articles
}
