//! # Source Weights
//!
//! Per-cycle mapping from a source identifier to its authority weight in
//! `(0.0, 1.0]`, built from the feed registry.
//!
//! - Every feed contributes two keys pointing at the same weight: the feed
//!   URL's host (without `www.`) and the feed's configured name.
//! - Lookups are exact; anything unknown resolves to the default weight (0.7).
//! - Read-only once built, so it can be shared across scoring without locks.

use std::collections::HashMap;

use crate::feeds::FeedSource;
use crate::ingest::source_domain;

/// Authority for sources that are not in the table.
pub const DEFAULT_SOURCE_WEIGHT: f64 = 0.7;

#[derive(Debug, Clone)]
pub struct SourceWeightTable {
    weights: HashMap<String, f64>,
    default_weight: f64,
}

impl Default for SourceWeightTable {
    fn default() -> Self {
        Self {
            weights: HashMap::new(),
            default_weight: DEFAULT_SOURCE_WEIGHT,
        }
    }
}

impl SourceWeightTable {
    /// Build the table from the full registry. Later feeds overwrite earlier
    /// ones when they share a domain or a name.
    pub fn from_registry(feeds: &[FeedSource]) -> Self {
        let mut weights = HashMap::with_capacity(feeds.len() * 2);
        for f in feeds {
            let w = clamp_weight(f.weight);
            if let Some(domain) = source_domain(&f.url) {
                weights.insert(domain, w);
            }
            weights.insert(f.name.clone(), w);
        }
        Self {
            weights,
            default_weight: DEFAULT_SOURCE_WEIGHT,
        }
    }

    pub fn with_default_weight(mut self, w: f64) -> Self {
        self.default_weight = clamp_weight(w);
        self
    }

    /// Weight for a domain or feed name; default when absent.
    pub fn weight_for(&self, source: &str) -> f64 {
        self.weights
            .get(source)
            .copied()
            .unwrap_or(self.default_weight)
    }

    pub fn contains(&self, source: &str) -> bool {
        self.weights.contains_key(source)
    }

    pub fn default_weight(&self) -> f64 {
        self.default_weight
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Lowest weight a source can carry.
pub const MIN_SOURCE_WEIGHT: f64 = 0.01;

/// Clamp to `[MIN_SOURCE_WEIGHT, 1.0]`; NaN and non-positive values take the floor.
pub fn clamp_weight(x: f64) -> f64 {
    if x.is_nan() || x <= MIN_SOURCE_WEIGHT {
        MIN_SOURCE_WEIGHT
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::{default_registry, Category};

    fn table() -> SourceWeightTable {
        SourceWeightTable::from_registry(&default_registry())
    }

    #[test]
    fn domain_and_name_share_weight() {
        let t = table();
        assert!((t.weight_for("36kr.com") - 0.8).abs() < 1e-12);
        assert!((t.weight_for("36氪") - 0.8).abs() < 1e-12);
        assert!((t.weight_for("jiqizhixin.com") - 1.0).abs() < 1e-12);
        assert!((t.weight_for("feeds.arstechnica.com") - 0.7).abs() < 1e-12);
    }

    #[test]
    fn unknown_source_uses_default_exactly() {
        let t = table();
        assert!(!t.contains("example.org"));
        assert_eq!(t.weight_for("example.org"), 0.7);
    }

    #[test]
    fn lookup_is_exact() {
        let t = table();
        // Only the feed host is registered, not the site's bare domain.
        assert!(!t.contains("arstechnica.com"));
        assert_eq!(t.weight_for("ARS TECHNICA"), DEFAULT_SOURCE_WEIGHT);
    }

    #[test]
    fn out_of_range_weights_are_clamped() {
        let feeds = vec![
            FeedSource::new("Hot", "https://hot.example/rss", Category::Global, true, 7.0),
            FeedSource::new("Cold", "https://cold.example/rss", Category::Global, true, -1.0),
        ];
        let t = SourceWeightTable::from_registry(&feeds);
        assert_eq!(t.weight_for("Hot"), 1.0);
        assert_eq!(t.weight_for("cold.example"), MIN_SOURCE_WEIGHT);
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn custom_default_weight() {
        let t = SourceWeightTable::default().with_default_weight(0.5);
        assert!(t.is_empty());
        assert_eq!(t.weight_for("anything"), 0.5);
        assert_eq!(t.default_weight(), 0.5);
    }
}
