//! Web search snippets used as background for free-form answers.
//!
//! Lookups are best effort. Any failure, or a search with nothing useful in
//! it, comes back as [`NO_CONTEXT`] so the answer path keeps working offline.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Context text used when nothing could be looked up.
pub const NO_CONTEXT: &str = "No context available.";

/// DuckDuckGo Instant Answer endpoint.
const DUCKDUCKGO_ENDPOINT: &str = "https://api.duckduckgo.com/";

/// Web lookups must not hold up an answer for long.
const LOOKUP_TIMEOUT_SECS: u64 = 10;

/// Trait for web search collaborators.
#[async_trait]
pub trait WebContext: Send + Sync {
    /// Up to `limit` text snippets relevant to `query`, best first.
    async fn snippets(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}

/// Snippets for `query` joined one per line, or [`NO_CONTEXT`].
#[instrument(skip(provider))]
pub async fn gather(provider: &dyn WebContext, query: &str, limit: usize) -> String {
    match provider.snippets(query, limit).await {
        Ok(snippets) => {
            let snippets: Vec<&str> = snippets
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .take(limit)
                .collect();
            if snippets.is_empty() {
                debug!("No web snippets found");
                NO_CONTEXT.to_string()
            } else {
                snippets.join("\n")
            }
        }
        Err(e) => {
            warn!("Web context lookup failed: {}", e);
            NO_CONTEXT.to_string()
        }
    }
}

/// Web context from the DuckDuckGo Instant Answer API.
pub struct DuckDuckGoContext {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoContext {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DUCKDUCKGO_ENDPOINT)
    }

    /// Point the lookups at another Instant Answer compatible endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(LOOKUP_TIMEOUT_SECS))
            .user_agent(concat!("spol/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl WebContext for DuckDuckGoContext {
    async fn snippets(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?
            .error_for_status()?;

        // The API answers with a JavaScript content type, so parse by hand.
        let body = response.bytes().await?;
        let value: Value = serde_json::from_slice(&body)?;

        Ok(parse_instant_answer(&value, limit))
    }
}

/// Abstract first, then related topics, including grouped ones.
fn parse_instant_answer(value: &Value, limit: usize) -> Vec<String> {
    let mut snippets = Vec::new();

    if let Some(text) = value.get("AbstractText").and_then(|t| t.as_str()) {
        snippets.push(text.to_string());
    }

    let topics = value
        .get("RelatedTopics")
        .and_then(|t| t.as_array())
        .into_iter()
        .flatten();
    for topic in topics {
        match topic.get("Topics").and_then(|t| t.as_array()) {
            Some(group) => snippets.extend(group.iter().filter_map(topic_text)),
            None => snippets.extend(topic_text(topic)),
        }
    }

    snippets.retain(|s| !s.trim().is_empty());
    snippets.truncate(limit);
    snippets
}

fn topic_text(topic: &Value) -> Option<String> {
    topic
        .get("Text")
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpolError;
    use axum::{routing::get, Json, Router};
    use serde_json::json;

    struct Fixed(Vec<&'static str>);

    #[async_trait]
    impl WebContext for Fixed {
        async fn snippets(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    struct Offline;

    #[async_trait]
    impl WebContext for Offline {
        async fn snippets(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
            Err(SpolError::ToolFailed("network unreachable".to_string()))
        }
    }

    fn instant_answer() -> Value {
        json!({
            "AbstractText": "Saturn is the sixth planet from the Sun.",
            "RelatedTopics": [
                {"Text": "Rings of Saturn - The most extensive ring system.", "FirstURL": "x"},
                {"Name": "Moons", "Topics": [
                    {"Text": "Titan - Largest moon of Saturn."},
                    {"Text": "Enceladus - Icy moon."}
                ]},
                {"Text": ""}
            ]
        })
    }

    #[test]
    fn test_parse_instant_answer() {
        let snippets = parse_instant_answer(&instant_answer(), 3);
        assert_eq!(
            snippets,
            vec![
                "Saturn is the sixth planet from the Sun.",
                "Rings of Saturn - The most extensive ring system.",
                "Titan - Largest moon of Saturn.",
            ]
        );

        assert!(parse_instant_answer(&json!({"AbstractText": ""}), 3).is_empty());
    }

    #[tokio::test]
    async fn test_gather_joins_limited_snippets() {
        let provider = Fixed(vec!["one", "  ", "two", "three", "four"]);
        assert_eq!(gather(&provider, "q", 3).await, "one\ntwo\nthree");
    }

    #[tokio::test]
    async fn test_gather_falls_back_when_offline_or_empty() {
        assert_eq!(gather(&Offline, "q", 3).await, NO_CONTEXT);
        assert_eq!(gather(&Fixed(vec![]), "q", 3).await, NO_CONTEXT);
    }

    #[tokio::test]
    async fn test_duckduckgo_lookup() {
        let app = Router::new().route("/", get(|| async { Json(instant_answer()) }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let provider = DuckDuckGoContext::with_endpoint(format!("http://{}/", addr)).unwrap();
        let context = gather(&provider, "saturn", 2).await;
        assert_eq!(
            context,
            "Saturn is the sixth planet from the Sun.\nRings of Saturn - The most extensive ring system."
        );
    }

    #[tokio::test]
    async fn test_duckduckgo_unreachable_falls_back() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = DuckDuckGoContext::with_endpoint(format!("http://{}/", addr)).unwrap();
        assert_eq!(gather(&provider, "saturn", 3).await, NO_CONTEXT);
    }
}
