//! RSS 2.0 and Atom feed parsing.
//!
//! Feeds are deserialized with `quick-xml`'s serde support into a minimal
//! shape (title, link, summary, date) and turned into [`Article`]s. Markup in
//! titles and summaries is stripped with `scraper`.

use crate::error::SourceError;
use crate::models::Article;
use crate::utils::truncate_chars;
use chrono::{DateTime, NaiveDateTime, Utc};
use scraper::Html;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    /// The `alternate` link, or the first link when none is marked.
    fn link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
            .or_else(|| self.links.first())
            .map(|l| l.href.as_str())
    }
}

/// Parse an RSS 2.0 or Atom document into articles.
///
/// Entries missing a title, link or parseable date are dropped. Order is
/// preserved as found in the document.
pub fn parse_feed(xml: &str, source: &str, summary_chars: usize) -> Result<Vec<Article>, SourceError> {
    if let Ok(rss) = quick_xml::de::from_str::<Rss>(xml) {
        let articles = rss
            .channel
            .items
            .into_iter()
            .filter_map(|item| {
                build_article(
                    source,
                    item.title.as_deref(),
                    item.link.as_deref(),
                    item.description.as_deref(),
                    item.pub_date.as_deref(),
                    summary_chars,
                )
            })
            .collect();
        return Ok(articles);
    }

    if !xml.contains("<feed") {
        return Err(SourceError::Parse("document is neither RSS nor Atom".to_string()));
    }
    let atom = quick_xml::de::from_str::<AtomFeed>(xml)
        .map_err(|e| SourceError::Parse(format!("neither RSS nor Atom: {e}")))?;
    Ok(atom
        .entries
        .iter()
        .filter_map(|entry| {
            let summary = entry
                .summary
                .as_ref()
                .or(entry.content.as_ref())
                .map(|t| t.value.as_str());
            let date = entry.published.as_deref().or(entry.updated.as_deref());
            build_article(
                source,
                entry.title.as_ref().map(|t| t.value.as_str()),
                entry.link(),
                summary,
                date,
                summary_chars,
            )
        })
        .collect())
}

fn build_article(
    source: &str,
    title: Option<&str>,
    link: Option<&str>,
    summary: Option<&str>,
    date: Option<&str>,
    summary_chars: usize,
) -> Option<Article> {
    let title = clean_text(title?);
    let link = link?.trim().to_string();
    if title.is_empty() || link.is_empty() {
        return None;
    }
    let Some(published) = date.and_then(parse_date) else {
        debug!(%link, ?date, "Dropping feed entry without a usable date");
        return None;
    };
    let summary = truncate_chars(&clean_text(summary.unwrap_or_default()), summary_chars);

    Some(Article {
        source: source.to_string(),
        title,
        summary,
        link,
        published,
    })
}

/// Strip markup and collapse whitespace.
pub fn clean_text(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(raw);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the date formats feeds use in practice (RFC 2822, RFC 3339, bare ISO).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
                .ok()
                .map(|dt| dt.and_utc())
        })
}
