// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

pub use types::{FeedRetriever, RawArticle};

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex"));

static RE_ENTITIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:amp|lt|gt|quot|#39|apos|nbsp|#160|#x27|#x2F);").expect("entity regex")
});

/// Strip markup, decode the small entity set feeds commonly double-escape,
/// and collapse whitespace runs.
///
/// Tags are removed before entities are decoded, so `&lt;b&gt;` survives as
/// the literal text `<b>`. Decoding is a single pass: `&amp;lt;` becomes `&lt;`.
pub fn strip_html(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    let no_tags = RE_TAGS.replace_all(s, "");
    let decoded = RE_ENTITIES.replace_all(&no_tags, |caps: &regex::Captures<'_>| {
        match &caps[0] {
            "&amp;" => "&",
            "&lt;" => "<",
            "&gt;" => ">",
            "&quot;" => "\"",
            "&#39;" | "&apos;" | "&#x27;" => "'",
            "&nbsp;" | "&#160;" => " ",
            "&#x2F;" => "/",
            _ => "",
        }
    });
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cap `s` at `max_chars` characters (not bytes), appending `...` when cut.
pub fn truncate_summary(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Summary from the item description, falling back to its full content.
pub fn build_summary(description: Option<&str>, content: Option<&str>, max_chars: usize) -> String {
    let mut summary = strip_html(description.unwrap_or_default());
    if summary.is_empty() {
        summary = strip_html(content.unwrap_or_default());
    }
    truncate_summary(&summary, max_chars)
}

/// Host of `link` without a leading `www.`; `None` when unparseable or host-less.
pub fn source_domain(link: &str) -> Option<String> {
    let parsed = url::Url::parse(link.trim()).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Case-insensitive substring test against any keyword.
/// Keywords are expected lower-case (see `KeywordSets::normalized`).
pub fn matches_any_keyword(text: &str, keywords: &[String]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|kw| lower.contains(kw.as_str()))
}

/// Number of distinct keywords present as case-insensitive substrings.
pub fn count_keyword_hits(text: &str, keywords: &[String]) -> usize {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .filter(|kw| !kw.is_empty())
        .map(|kw| kw.as_str())
        .collect::<HashSet<_>>()
        .into_iter()
        .filter(|kw| lower.contains(kw))
        .count()
}
