// src/config/news.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::feeds::{default_registry, FeedSource, KeywordSets};
use crate::source_weights::clamp_weight;

pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/news.toml";

pub const ENV_DB_PATH: &str = "NEWS_DB_PATH";
pub const ENV_INTERVAL_HOURS: &str = "NEWS_FETCH_INTERVAL_HOURS";
pub const ENV_DEADLINE_SECS: &str = "NEWS_FETCH_DEADLINE_SECS";
pub const ENV_TOP_N: &str = "NEWS_TOP_N";

fn default_db_path() -> String {
    "data/news.db".to_string()
}

/// Knobs for one fetch cycle and the recurring schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Cycle-wide deadline shared by every retrieval task.
    pub deadline_secs: u64,
    /// Articles kept per category.
    pub top_n: usize,
    pub interval_hours: u64,
    pub user_agent: String,
    pub summary_max_chars: usize,
    /// Authority for sources missing from the weight table.
    pub default_source_weight: f64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            deadline_secs: 60,
            top_n: 5,
            interval_hours: 4,
            user_agent: "Mozilla/5.0 (compatible; TopAINews/1.0)".to_string(),
            summary_max_chars: 200,
            default_source_weight: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default = "default_registry")]
    pub feeds: Vec<FeedSource>,
    #[serde(default)]
    pub keywords: KeywordSets,
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            feeds: default_registry(),
            keywords: KeywordSets::default(),
            db_path: default_db_path(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML file and sanitize it. Env overrides are NOT applied here.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading news config from {}", path.display()))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("parsing news config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.sanitize()
    }

    /// Resolve config using env var + fallbacks, then apply env overrides:
    /// 1) $NEWS_CONFIG_PATH (must exist)
    /// 2) config/news.toml
    /// 3) built-in registry and keyword lists
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else {
            let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_p.exists() {
                Self::load_from_file(&default_p)?
            } else {
                Self::default().sanitize()?
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(p) = env::var(ENV_DB_PATH) {
            if !p.trim().is_empty() {
                self.db_path = p.trim().to_string();
            }
        }
        if let Some(h) = parse_env::<u64>(ENV_INTERVAL_HOURS).filter(|h| *h > 0) {
            self.fetch.interval_hours = h;
        }
        if let Some(s) = parse_env::<u64>(ENV_DEADLINE_SECS).filter(|s| *s > 0) {
            self.fetch.deadline_secs = s;
        }
        if let Some(n) = parse_env::<usize>(ENV_TOP_N).filter(|n| *n > 0) {
            self.fetch.top_n = n;
        }
    }

    /// Clamp weights into [0.01, 1], reject duplicate/empty URLs, normalize keywords,
    /// and restore defaults for zero-valued knobs.
    pub fn sanitize(mut self) -> Result<Self> {
        let defaults = FetchSettings::default();
        if self.fetch.top_n == 0 {
            self.fetch.top_n = defaults.top_n;
        }
        if self.fetch.deadline_secs == 0 {
            self.fetch.deadline_secs = defaults.deadline_secs;
        }
        if self.fetch.interval_hours == 0 {
            self.fetch.interval_hours = defaults.interval_hours;
        }
        if self.fetch.summary_max_chars == 0 {
            self.fetch.summary_max_chars = defaults.summary_max_chars;
        }
        self.fetch.default_source_weight = clamp_weight(self.fetch.default_source_weight);

        let mut seen = HashSet::new();
        for feed in &mut self.feeds {
            feed.url = feed.url.trim().to_string();
            feed.name = feed.name.trim().to_string();
            if feed.url.is_empty() {
                bail!("feed '{}' has an empty url", feed.name);
            }
            if !seen.insert(feed.url.clone()) {
                bail!("duplicate feed url: {}", feed.url);
            }
            feed.weight = clamp_weight(feed.weight);
        }

        self.keywords = self.keywords.normalized();
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}
