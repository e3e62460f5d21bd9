//! # Feed Registry
//!
//! Static list of RSS sources the digest aggregates, plus the keyword sets
//! used at retrieval time (filtering non-AI-only sources) and at scoring time
//! (high-value relevance hits).
//!
//! - Each source has a name, URL (its identity), category, an "AI-only" flag
//!   and an authority weight in `(0, 1]`.
//! - The two keyword families are intentionally separate lists; they overlap
//!   but are tuned independently.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Which daily list an article competes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Domestic,
    Global,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Domestic, Category::Global];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Domestic => "domestic",
            Category::Global => "global",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}' (expected 'domestic' or 'global')")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domestic" => Ok(Category::Domestic),
            "global" => Ok(Category::Global),
            other => Err(UnknownCategory(other.to_string())),
        }
    }
}

/// One configured RSS source. Identity = `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub category: Category,
    /// Every item is assumed AI-related; keyword filtering is skipped.
    #[serde(default)]
    pub ai_only: bool,
    #[serde(default = "default_feed_weight")]
    pub weight: f64,
}

fn default_feed_weight() -> f64 {
    1.0
}

impl FeedSource {
    pub fn new(name: &str, url: &str, category: Category, ai_only: bool, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            category,
            ai_only,
            weight,
        }
    }
}

/// Pre-configured Chinese AI news sources.
pub fn domestic_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("机器之心", "https://www.jiqizhixin.com/rss", Category::Domestic, true, 1.0),
        FeedSource::new("36氪", "https://36kr.com/feed", Category::Domestic, false, 0.8),
        FeedSource::new("InfoQ中国", "https://www.infoq.cn/feed", Category::Domestic, false, 0.7),
    ]
}

/// Pre-configured international AI news sources.
pub fn global_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "TechCrunch AI",
            "https://techcrunch.com/category/artificial-intelligence/feed/",
            Category::Global,
            true,
            1.0,
        ),
        FeedSource::new(
            "The Verge AI",
            "https://www.theverge.com/rss/ai-artificial-intelligence/index.xml",
            Category::Global,
            true,
            1.0,
        ),
        FeedSource::new(
            "AI News",
            "https://www.artificialintelligence-news.com/feed/",
            Category::Global,
            true,
            1.0,
        ),
        FeedSource::new(
            "Ars Technica",
            "https://feeds.arstechnica.com/arstechnica/technology-lab",
            Category::Global,
            false,
            0.7,
        ),
    ]
}

/// Full built-in registry (domestic first, then global).
pub fn default_registry() -> Vec<FeedSource> {
    let mut all = domestic_feeds();
    all.extend(global_feeds());
    all
}

/// The four keyword lists, all lower-case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSets {
    /// Retrieval filter for non-AI-only domestic sources.
    pub domestic_filter: Vec<String>,
    /// Retrieval filter for non-AI-only global sources.
    pub global_filter: Vec<String>,
    /// Relevance boosters for domestic scoring.
    pub domestic_high_value: Vec<String>,
    /// Relevance boosters for global scoring.
    pub global_high_value: Vec<String>,
}

impl Default for KeywordSets {
    fn default() -> Self {
        Self {
            domestic_filter: owned(&[
                "ai", "人工智能", "大模型", "llm", "gpt", "deepseek", "通义", "文心",
                "机器学习", "深度学习", "神经网络", "自然语言处理", "nlp", "chatgpt",
                "生成式", "智能体", "agent", "多模态", "diffusion", "transformer",
                "openai", "anthropic", "claude", "gemini", "copilot", "sora",
            ]),
            global_filter: owned(&[
                "ai", "artificial intelligence", "llm", "openai", "anthropic", "deepmind",
                "machine learning", "deep learning", "neural network", "gpt", "chatgpt",
                "generative", "transformer", "diffusion", "large language model",
                "claude", "gemini", "copilot", "midjourney", "stable diffusion",
                "ai model", "ai agent", "foundation model", "sora", "deepseek",
            ]),
            domestic_high_value: owned(&[
                "发布", "开源", "突破", "首个", "领先", "gpt", "大模型", "融资",
                "deepseek", "通义", "文心", "商用", "上线", "芯片",
            ]),
            global_high_value: owned(&[
                "release", "launch", "open source", "breakthrough", "gpt", "llm",
                "openai", "anthropic", "deepmind", "google", "meta", "nvidia",
                "funding", "billion", "regulation", "safety",
            ]),
        }
    }
}

impl KeywordSets {
    pub fn filter_for(&self, category: Category) -> &[String] {
        match category {
            Category::Domestic => &self.domestic_filter,
            Category::Global => &self.global_filter,
        }
    }

    pub fn high_value_for(&self, category: Category) -> &[String] {
        match category {
            Category::Domestic => &self.domestic_high_value,
            Category::Global => &self.global_high_value,
        }
    }

    /// Lower-case, trim, drop empties and repeated entries (first one wins).
    pub fn normalized(self) -> Self {
        Self {
            domestic_filter: clean_list(self.domestic_filter),
            global_filter: clean_list(self.global_filter),
            domestic_high_value: clean_list(self.domestic_high_value),
            global_high_value: clean_list(self.global_high_value),
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim().to_lowercase();
        if !t.is_empty() && seen.insert(t.clone()) {
            out.push(t);
        }
    }
    out
}
