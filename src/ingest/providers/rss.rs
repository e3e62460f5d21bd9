// src/ingest/providers/rss.rs
//! HTTP RSS/Atom retriever.
//!
//! Supports RSS 2.0, RSS 1.0 (RDF) and Atom documents. Each parsed item is
//! normalized into a `RawArticle`; sources that are not AI-only keep only
//! items whose title + description mention a category filter keyword.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::sync::Arc;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::config::AppConfig;
use crate::error::RetrievalError;
use crate::feeds::{FeedSource, KeywordSets};
use crate::ingest::types::{FeedRetriever, RawArticle};
use crate::ingest::{build_summary, matches_any_keyword, source_domain};

/// Format-independent view of one feed item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    Description,
    Content,
    Published,
    Updated,
}

/// Item children are matched on their qualified name, so `media:title`
/// or `media:content` never shadow `title` / `content`.
fn item_field(qname: &str) -> Option<Field> {
    match qname {
        "title" | "atom:title" => Some(Field::Title),
        "link" | "atom:link" => Some(Field::Link),
        "description" | "summary" | "atom:summary" => Some(Field::Description),
        "content:encoded" | "content" | "atom:content" => Some(Field::Content),
        "pubDate" | "published" | "atom:published" | "dc:date" | "issued" => {
            Some(Field::Published)
        }
        "updated" | "atom:updated" | "modified" => Some(Field::Updated),
        _ => None,
    }
}

fn is_item(qname: &str) -> bool {
    matches!(qname, "item" | "entry" | "rss:item" | "atom:entry")
}

fn local_name(qname: &str) -> &str {
    qname.rsplit(':').next().unwrap_or(qname)
}

#[derive(Debug, Default)]
struct ItemBuilder {
    title: Option<String>,
    text_link: Option<String>,
    /// `(rel, href)` of Atom-style links.
    href_links: Vec<(Option<String>, String)>,
    description: Option<String>,
    content: Option<String>,
    dates: Vec<String>,
    updated: Option<String>,
}

impl ItemBuilder {
    /// First occurrence of each field wins.
    fn set(&mut self, field: Field, text: String) {
        match field {
            Field::Title => {
                self.title.get_or_insert(text);
            }
            Field::Link => {
                let text = text.trim();
                if self.text_link.is_none() && !text.is_empty() {
                    self.text_link = Some(text.to_string());
                }
            }
            Field::Description => {
                self.description.get_or_insert(text);
            }
            Field::Content => {
                self.content.get_or_insert(text);
            }
            Field::Published => self.dates.push(text),
            Field::Updated => {
                self.updated.get_or_insert(text);
            }
        }
    }

    fn push_href(&mut self, e: &BytesStart<'_>) {
        let mut rel = None;
        let mut href = None;
        for attr in e.attributes().flatten() {
            match attr.key.as_ref() {
                b"rel" => rel = Some(decode_text(&attr.value)),
                b"href" => href = Some(decode_text(&attr.value)),
                _ => {}
            }
        }
        if let Some(href) = href {
            let href = href.trim();
            if !href.is_empty() {
                self.href_links.push((rel, href.to_string()));
            }
        }
    }

    fn build(self) -> FeedItem {
        let link = self
            .text_link
            .or_else(|| {
                self.href_links
                    .iter()
                    .find(|(rel, _)| matches!(rel.as_deref(), None | Some("alternate")))
                    .or_else(|| self.href_links.first())
                    .map(|(_, href)| href.clone())
            })
            .unwrap_or_default();
        FeedItem {
            title: self.title.unwrap_or_default(),
            description: self.description,
            content: self.content,
            link,
            published: self.dates.iter().find_map(|d| parse_timestamp(d)),
            updated: self.updated.as_deref().and_then(parse_timestamp),
        }
    }
}

/// Text nodes may carry HTML entities XML does not define (`&nbsp;`,
/// `&eacute;`); decode all of them and leave unknown ones as written.
fn decode_text(raw: &[u8]) -> String {
    let raw = String::from_utf8_lossy(raw);
    html_escape::decode_html_entities(&raw).into_owned()
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Parse an RSS 2.0 / RDF / Atom document into items.
///
/// CDATA is taken verbatim; markup nested inside a field contributes its text.
pub fn parse_feed_items(xml: &str) -> Result<Vec<FeedItem>, String> {
    let mut reader = Reader::from_str(xml.trim_start_matches('\u{feff}'));
    reader.config_mut().check_end_names = false;

    let mut seen_root = false;
    let mut depth = 0usize;
    // (depth of the open item element, its fields so far)
    let mut item: Option<(usize, ItemBuilder)> = None;
    let mut field: Option<(Field, String)> = None;
    let mut items = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                depth += 1;
                let name = qualified_name(&e);
                if !seen_root {
                    check_root(&name)?;
                    seen_root = true;
                }
                if let Some((item_depth, builder)) = item.as_mut() {
                    if depth == *item_depth + 1 {
                        if local_name(&name) == "link" {
                            builder.push_href(&e);
                        }
                        field = item_field(&name).map(|f| (f, String::new()));
                    }
                } else if is_item(&name) {
                    item = Some((depth, ItemBuilder::default()));
                }
            }
            Event::Empty(e) => {
                let name = qualified_name(&e);
                if !seen_root {
                    check_root(&name)?;
                    seen_root = true;
                }
                if let Some((item_depth, builder)) = item.as_mut() {
                    if depth == *item_depth && local_name(&name) == "link" {
                        builder.push_href(&e);
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, buf)) = field.as_mut() {
                    buf.push_str(&decode_text(&t));
                }
            }
            Event::CData(c) => {
                if let Some((_, buf)) = field.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                match item.as_ref().map(|(d, _)| *d) {
                    Some(d) if depth == d + 1 => {
                        if let (Some((f, text)), Some((_, builder))) = (field.take(), item.as_mut()) {
                            builder.set(f, text);
                        }
                    }
                    Some(d) if depth == d => {
                        if let Some((_, builder)) = item.take() {
                            items.push(builder.build());
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err("document is empty".to_string());
    }
    Ok(items)
}

fn check_root(qname: &str) -> Result<(), String> {
    match local_name(qname).to_ascii_lowercase().as_str() {
        "rss" | "rdf" | "feed" => Ok(()),
        _ => Err("document is neither RSS nor Atom".to_string()),
    }
}

/// RFC 2822 (RSS) or RFC 3339 (Atom); chrono's lenient RFC 2822 parser
/// picks up legacy zone names like `EST`.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    if ts.is_empty() {
        return None;
    }
    OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), dt.nanosecond()))
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Turn parsed items into articles for `source`.
///
/// - items with blank titles are skipped
/// - non-AI-only sources keep items matching the category filter keywords
/// - publish time: published → updated → `fetched_at`
/// - source domain: item link host (sans `www.`) → feed name
pub fn items_to_articles(
    source: &FeedSource,
    items: Vec<FeedItem>,
    keywords: &KeywordSets,
    summary_max_chars: usize,
    fetched_at: DateTime<Utc>,
) -> Vec<RawArticle> {
    let filter = keywords.filter_for(source.category);
    let mut out = Vec::with_capacity(items.len());

    for it in items {
        let title = it.title.trim();
        if title.is_empty() {
            continue;
        }

        if !source.ai_only {
            let text = format!("{} {}", title, it.description.as_deref().unwrap_or_default());
            if !matches_any_keyword(&text, filter) {
                counter!("fetch_articles_filtered_total").increment(1);
                continue;
            }
        }

        let published_at = it.published.or(it.updated).unwrap_or(fetched_at);
        let summary = build_summary(
            it.description.as_deref(),
            it.content.as_deref(),
            summary_max_chars,
        );
        let domain = source_domain(&it.link).unwrap_or_else(|| source.name.clone());

        out.push(RawArticle::new(
            title,
            summary,
            it.link.clone(),
            domain,
            source.category,
            published_at,
        ));
    }

    out
}

/// Live retriever over HTTP.
pub struct RssProvider {
    client: reqwest::Client,
    keywords: Arc<KeywordSets>,
    summary_max_chars: usize,
}

impl RssProvider {
    pub fn new(
        user_agent: &str,
        keywords: Arc<KeywordSets>,
        summary_max_chars: usize,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            keywords,
            summary_max_chars,
        })
    }

    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Self::new(
            &cfg.fetch.user_agent,
            Arc::new(cfg.keywords.clone()),
            cfg.fetch.summary_max_chars,
        )
    }

    /// Parse an already-downloaded document for `source`.
    pub fn parse_document(
        &self,
        source: &FeedSource,
        body: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<RawArticle>, RetrievalError> {
        let items = parse_feed_items(body).map_err(|reason| RetrievalError::Parse {
            url: source.url.clone(),
            reason,
        })?;
        Ok(items_to_articles(
            source,
            items,
            &self.keywords,
            self.summary_max_chars,
            fetched_at,
        ))
    }

    async fn download(&self, url: &str) -> Result<String, RetrievalError> {
        let network = |e: reqwest::Error| RetrievalError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let resp = self.client.get(url).send().await.map_err(network)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(RetrievalError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(network)
    }
}

#[async_trait]
impl FeedRetriever for RssProvider {
    async fn retrieve(
        &self,
        source: &FeedSource,
        deadline: Instant,
    ) -> Result<Vec<RawArticle>, RetrievalError> {
        let t0 = std::time::Instant::now();

        let body = tokio::time::timeout_at(deadline, self.download(&source.url))
            .await
            .map_err(|_| RetrievalError::DeadlineExceeded {
                url: source.url.clone(),
            })??;

        let out = self.parse_document(source, &body, Utc::now())?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("fetch_source_ms").record(ms);
        counter!("fetch_articles_total").increment(out.len() as u64);
        tracing::debug!(
            target: "ingest",
            source = %source.name,
            count = out.len(),
            ms,
            "feed parsed"
        );

        Ok(out)
    }
}
