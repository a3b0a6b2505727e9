//! News sources: where the day's candidate articles come from.
//!
//! A [`NewsSource`] turns a list of feed descriptors into a ranked,
//! deduplicated list of [`Article`]s. It never fails the caller: a dead feed
//! is logged and skipped, and when every feed fails the result is simply
//! empty, which the workflow treats as "nothing to publish today".
//!
//! # Supported Feed Kinds
//!
//! | Kind | Module | Format |
//! |------|--------|--------|
//! | `rss` | [`rss`] | RSS 2.0 or Atom XML |
//! | `newsapi` | [`newsapi`] | NewsAPI JSON (`articles[]`) |
//!
//! # Ranking
//!
//! 1. Drop anything published before `now - recency_window`
//! 2. Deduplicate by canonical link, keeping the first copy seen
//! 3. Sort newest first and keep `max_items`

pub mod newsapi;
pub mod rss;

use crate::error::SourceError;
use crate::models::Article;
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Produces candidate articles for a run.
pub trait NewsSource {
    /// Fetch at most `max_items` articles published within `recency_window`,
    /// newest first. Returns an empty list when nothing could be fetched.
    async fn fetch(&self, max_items: usize, recency_window: Duration) -> Vec<Article>;
}

/// Format of a feed endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    #[default]
    Rss,
    NewsApi,
}

/// A named feed endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedDescriptor {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub kind: FeedKind,
}

impl FeedDescriptor {
    pub fn rss(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind: FeedKind::Rss,
        }
    }
}

/// The AI news feeds used when no feeds file is given.
pub fn default_feeds() -> Vec<FeedDescriptor> {
    vec![
        FeedDescriptor::rss("techcrunch_ai", "https://techcrunch.com/tag/artificial-intelligence/feed/"),
        FeedDescriptor::rss("venturebeat_ai", "https://venturebeat.com/ai/feed/"),
        FeedDescriptor::rss("mit_news", "https://news.mit.edu/rss/topic/artificial-intelligence2"),
        FeedDescriptor::rss("ai_news", "https://artificialintelligence-news.com/feed/"),
        FeedDescriptor::rss("the_verge_ai", "https://www.theverge.com/ai-artificial-intelligence/rss/index.xml"),
    ]
}

/// HTTP-backed [`NewsSource`] reading a fixed list of feeds.
#[derive(Debug, Clone)]
pub struct FeedSource {
    client: Client,
    feeds: Vec<FeedDescriptor>,
    summary_chars: usize,
}

impl FeedSource {
    pub fn new(client: Client, feeds: Vec<FeedDescriptor>, summary_chars: usize) -> Self {
        Self {
            client,
            feeds,
            summary_chars,
        }
    }

    #[instrument(level = "info", skip_all, fields(feed = %feed.name, url = %feed.url))]
    async fn fetch_feed(&self, feed: &FeedDescriptor) -> Result<Vec<Article>, SourceError> {
        let response = self
            .client
            .get(&feed.url)
            .header("User-Agent", concat!("daily_ai_news/", env!("CARGO_PKG_VERSION")))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }
        let body = response.text().await?;

        match feed.kind {
            FeedKind::Rss => rss::parse_feed(&body, &feed.name, self.summary_chars),
            FeedKind::NewsApi => newsapi::parse_response(&body, &feed.name, self.summary_chars),
        }
    }
}

impl NewsSource for FeedSource {
    #[instrument(level = "info", skip_all, fields(feeds = self.feeds.len(), max_items = max_items))]
    async fn fetch(&self, max_items: usize, recency_window: Duration) -> Vec<Article> {
        let batches: Vec<Vec<Article>> = stream::iter(self.feeds.iter())
            .then(|feed| async move {
                match self.fetch_feed(feed).await {
                    Ok(articles) => {
                        debug!(feed = %feed.name, count = articles.len(), "Fetched feed");
                        articles
                    }
                    Err(e) => {
                        warn!(feed = %feed.name, error = %e, "Feed unavailable; skipping");
                        Vec::new()
                    }
                }
            })
            .collect()
            .await;

        let fetched: Vec<Article> = batches.into_iter().flatten().collect();
        let total = fetched.len();
        let ranked = rank_articles(fetched, Utc::now(), recency_window, max_items);
        info!(fetched = total, kept = ranked.len(), "Collected articles");
        ranked
    }
}

/// Key used to detect the same story reached through different URLs.
///
/// Drops the fragment and a trailing slash; scheme and host are normalised by
/// the URL parser. Unparseable links are compared verbatim.
pub fn canonical_link(link: &str) -> String {
    match Url::parse(link.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string().trim_end_matches('/').to_string()
        }
        Err(_) => link.trim().to_string(),
    }
}

/// Window, deduplicate and order articles.
///
/// Deduplication happens before sorting so the copy that appeared first in
/// feed order is the one kept.
pub fn rank_articles(
    articles: Vec<Article>,
    now: DateTime<Utc>,
    recency_window: Duration,
    max_items: usize,
) -> Vec<Article> {
    let cutoff = now - recency_window;
    let mut ranked: Vec<Article> = articles
        .into_iter()
        .filter(|a| a.published >= cutoff)
        .unique_by(|a| canonical_link(&a.link))
        .collect();
    ranked.sort_by(|a, b| b.published.cmp(&a.published));
    ranked.truncate(max_items);
    ranked
}

const TRENDING_KEYWORDS: &[&str] = &[
    "GPT",
    "LLM",
    "ChatGPT",
    "OpenAI",
    "Google AI",
    "Microsoft",
    "Meta AI",
    "machine learning",
    "deep learning",
    "neural network",
    "automation",
    "robotics",
    "computer vision",
    "natural language processing",
    "AI ethics",
    "generative AI",
    "AI regulation",
    "AI startup",
    "AI investment",
];

/// Most frequently mentioned topic keywords across titles and summaries.
///
/// Each article counts once per keyword. Ties keep keyword list order.
pub fn trending_topics(articles: &[Article], limit: usize) -> Vec<String> {
    let counts = articles
        .iter()
        .flat_map(|article| {
            let text = format!("{} {}", article.title, article.summary).to_lowercase();
            TRENDING_KEYWORDS
                .iter()
                .enumerate()
                .filter(move |(_, kw)| text.contains(&kw.to_lowercase()))
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        })
        .counts();

    counts
        .into_iter()
        .sorted_by(|(ia, ca), (ib, cb)| cb.cmp(ca).then(ia.cmp(ib)))
        .take(limit)
        .map(|(i, _)| TRENDING_KEYWORDS[i].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(link: &str, hours_ago: i64, summary: &str) -> Article {
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap();
        Article {
            source: "test".to_string(),
            title: format!("Story {link}"),
            summary: summary.to_string(),
            link: link.to_string(),
            published: now - Duration::hours(hours_ago),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_dedupe_keeps_one_per_link_first_seen() {
        let articles = vec![
            article("https://a.com/1", 5, "first copy, most complete"),
            article("https://a.com/2", 1, ""),
            article("https://a.com/1", 2, "later copy"),
            article("https://a.com/1#comments", 3, "fragment copy"),
            article("https://a.com/2/", 4, "slash copy"),
        ];
        let ranked = rank_articles(articles, now(), Duration::hours(48), 10);
        assert_eq!(ranked.len(), 2);
        let one = ranked.iter().find(|a| a.link == "https://a.com/1").unwrap();
        assert_eq!(one.summary, "first copy, most complete");
        let links: Vec<_> = ranked.iter().map(|a| canonical_link(&a.link)).collect();
        assert_eq!(links.iter().unique().count(), links.len());
    }

    #[test]
    fn test_rank_orders_newest_first_and_truncates() {
        let articles = vec![
            article("https://a.com/old", 30, ""),
            article("https://a.com/new", 1, ""),
            article("https://a.com/mid", 10, ""),
        ];
        let ranked = rank_articles(articles, now(), Duration::hours(48), 2);
        let links: Vec<_> = ranked.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(links, vec!["https://a.com/new", "https://a.com/mid"]);
    }

    #[test]
    fn test_rank_drops_stale_articles() {
        let articles = vec![article("https://a.com/stale", 72, ""), article("https://a.com/fresh", 2, "")];
        let ranked = rank_articles(articles, now(), Duration::hours(48), 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].link, "https://a.com/fresh");
    }

    #[test]
    fn test_canonical_link() {
        assert_eq!(canonical_link("https://A.com/x/#frag"), "https://a.com/x");
        assert_eq!(canonical_link("not a url "), "not a url");
    }

    #[test]
    fn test_trending_topics() {
        let articles = vec![
            article("1", 1, "OpenAI and Microsoft sign a deal on generative AI"),
            article("2", 1, "OpenAI releases a new LLM"),
            article("3", 1, "Robotics startup raises money"),
        ];
        let topics = trending_topics(&articles, 3);
        assert_eq!(topics, vec!["OpenAI", "LLM", "Microsoft"]);
    }

    #[test]
    fn test_feeds_yaml() {
        let yaml = "- name: verge\n  url: https://verge.com/rss\n- name: napi\n  url: https://newsapi.org/v2/everything?q=ai\n  kind: newsapi\n";
        let feeds: Vec<FeedDescriptor> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(feeds[0].kind, FeedKind::Rss);
        assert_eq!(feeds[1].kind, FeedKind::NewsApi);
    }

    const FEED: &str = r#"<rss version="2.0"><channel>
        <item><title>Fresh</title><link>https://x.com/fresh</link><pubDate>{DATE}</pubDate></item>
        </channel></rss>"#;

    #[tokio::test]
    async fn test_fetch_skips_failing_feed() {
        let mut server = mockito::Server::new_async().await;
        let body = FEED.replace("{DATE}", &Utc::now().to_rfc2822());
        let _ok = server
            .mock("GET", "/good")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        let _bad = server.mock("GET", "/bad").with_status(500).create_async().await;

        let source = FeedSource::new(
            Client::new(),
            vec![
                FeedDescriptor::rss("bad", &format!("{}/bad", server.url())),
                FeedDescriptor::rss("good", &format!("{}/good", server.url())),
            ],
            500,
        );
        let articles = source.fetch(5, Duration::hours(24)).await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Fresh");
        assert_eq!(articles[0].source, "good");
    }

    #[tokio::test]
    async fn test_fetch_all_failing_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _bad = server.mock("GET", "/bad").with_status(503).create_async().await;
        let _junk = server
            .mock("GET", "/junk")
            .with_status(200)
            .with_body("not a feed")
            .create_async()
            .await;

        let source = FeedSource::new(
            Client::new(),
            vec![
                FeedDescriptor::rss("bad", &format!("{}/bad", server.url())),
                FeedDescriptor::rss("junk", &format!("{}/junk", server.url())),
            ],
            500,
        );
        assert!(source.fetch(5, Duration::hours(24)).await.is_empty());
    }
}
