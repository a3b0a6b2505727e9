//! NewsAPI-style JSON documents (`/v2/everything`, `/v2/top-headlines`).

use crate::error::SourceError;
use crate::models::Article;
use crate::sources::rss::{clean_text, parse_date};
use crate::utils::truncate_chars;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Response {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    source: Option<ItemSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    name: Option<String>,
}

/// Parse a NewsAPI response body.
///
/// The publisher name reported by the API is kept alongside the descriptor
/// name (`newsapi/The Verge`) so dedup logs stay readable.
pub fn parse_response(body: &str, source: &str, summary_chars: usize) -> Result<Vec<Article>, SourceError> {
    let response: Response =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;
    if response.status != "ok" {
        return Err(SourceError::Parse(
            response.message.unwrap_or_else(|| format!("status {}", response.status)),
        ));
    }

    Ok(response
        .articles
        .into_iter()
        .filter_map(|item| {
            let title = clean_text(item.title.as_deref()?);
            let link = item.url?.trim().to_string();
            let published = parse_date(item.published_at.as_deref()?)?;
            if title.is_empty() || link.is_empty() || title == "[Removed]" {
                return None;
            }
            let source = match item.source.and_then(|s| s.name) {
                Some(name) => format!("{source}/{name}"),
                None => source.to_string(),
            };
            Some(Article {
                source,
                title,
                summary: truncate_chars(&clean_text(item.description.as_deref().unwrap_or_default()), summary_chars),
                link,
                published,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_response() {
        let body = r#"{
            "status": "ok",
            "totalResults": 3,
            "articles": [
                {"source": {"id": null, "name": "Wired"}, "title": "Chips everywhere",
                 "description": "<p>More chips.</p>", "url": "https://wired.com/x",
                 "publishedAt": "2025-05-06T10:00:00Z"},
                {"source": {"id": null, "name": "Removed"}, "title": "[Removed]",
                 "description": null, "url": "https://removed.com",
                 "publishedAt": "2025-05-06T10:00:00Z"},
                {"source": null, "title": "No date", "url": "https://x.com", "publishedAt": null}
            ]
        }"#;
        let articles = parse_response(body, "newsapi", 500).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].source, "newsapi/Wired");
        assert_eq!(articles[0].summary, "More chips.");
    }

    #[test]
    fn test_error_status_is_parse_error() {
        let body = r#"{"status":"error","code":"apiKeyInvalid","message":"Your API key is invalid."}"#;
        let err = parse_response(body, "newsapi", 500).unwrap_err();
        assert!(err.to_string().contains("API key is invalid"));
    }
}
