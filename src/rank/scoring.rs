//! Composite article score.
//!
//! `score = 0.5 * timeliness + 0.3 * relevance + 0.2 * authority`, each
//! component normalized into [0, 1]:
//! - timeliness: exponential decay, 12 h half-life, future dates clamp to 1.0
//! - relevance : distinct high-value keyword hits in title + summary, capped at 5
//! - authority : source weight table lookup by source domain

use chrono::{DateTime, Utc};
use std::f64::consts::LN_2;

use crate::feeds::KeywordSets;
use crate::ingest::{count_keyword_hits, RawArticle};
use crate::source_weights::SourceWeightTable;

pub const HALF_LIFE_HOURS: f64 = 12.0;
pub const MAX_KEYWORD_HITS: usize = 5;

pub const W_TIMELINESS: f64 = 0.5;
pub const W_RELEVANCE: f64 = 0.3;
pub const W_AUTHORITY: f64 = 0.2;

/// `exp(-ln2 * hours / 12)`; negative ages count as zero.
pub fn timeliness(hours_since_publish: f64) -> f64 {
    let hours = if hours_since_publish.is_nan() {
        0.0
    } else {
        hours_since_publish.max(0.0)
    };
    (-LN_2 * hours / HALF_LIFE_HOURS).exp()
}

/// Hits capped at `MAX_KEYWORD_HITS`, scaled into [0, 1].
pub fn relevance_from_hits(hits: usize) -> f64 {
    hits.min(MAX_KEYWORD_HITS) as f64 / MAX_KEYWORD_HITS as f64
}

/// Scores a batch against one captured instant so results stay comparable.
pub struct Scorer<'a> {
    now: DateTime<Utc>,
    weights: &'a SourceWeightTable,
    keywords: &'a KeywordSets,
}

impl<'a> Scorer<'a> {
    pub fn new(now: DateTime<Utc>, weights: &'a SourceWeightTable, keywords: &'a KeywordSets) -> Self {
        Self {
            now,
            weights,
            keywords,
        }
    }

    pub fn timeliness(&self, article: &RawArticle) -> f64 {
        let elapsed = self.now.signed_duration_since(article.published_at());
        let hours = elapsed.num_milliseconds() as f64 / 3_600_000.0;
        timeliness(hours)
    }

    pub fn relevance(&self, article: &RawArticle) -> f64 {
        let text = format!("{} {}", article.title(), article.summary());
        let hits = count_keyword_hits(&text, self.keywords.high_value_for(article.category()));
        relevance_from_hits(hits)
    }

    pub fn authority(&self, article: &RawArticle) -> f64 {
        self.weights.weight_for(article.source_domain())
    }

    pub fn score(&self, article: &RawArticle) -> f64 {
        W_TIMELINESS * self.timeliness(article)
            + W_RELEVANCE * self.relevance(article)
            + W_AUTHORITY * self.authority(article)
    }

    /// Write `score` on every article in place.
    pub fn score_all(&self, articles: &mut [RawArticle]) {
        for a in articles.iter_mut() {
            a.score = self.score(a);
        }
    }
}
