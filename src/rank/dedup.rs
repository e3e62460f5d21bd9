// src/rank/dedup.rs
use std::collections::HashSet;

use crate::ingest::RawArticle;

/// Characters of the title prefix used as the comparison key.
pub const TITLE_KEY_CHARS: usize = 30;

/// Separators and quotes ignored when comparing titles (ASCII + CJK/typographic).
fn is_ignored(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            ':' | '：'
                | '-' | '‐' | '‑' | '–' | '—' | '―'
                | '|' | '｜'
                | '\'' | '"' | '‘' | '’' | '“' | '”' | '「' | '」'
                | '!' | '！' | '?' | '？'
        )
}

/// Near-duplicate key: lower-case, drop ignored chars, keep first 30 chars.
pub fn title_key(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| !is_ignored(*c))
        .take(TITLE_KEY_CHARS)
        .collect()
}

/// Keep the first article per title key. With score-descending input the
/// survivor is the best-scored copy; relative order is preserved.
/// Returns the survivors and how many were dropped.
pub fn dedup_by_title(articles: Vec<RawArticle>) -> (Vec<RawArticle>, usize) {
    let before = articles.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<RawArticle> = articles
        .into_iter()
        .filter(|a| seen.insert(title_key(a.title())))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
