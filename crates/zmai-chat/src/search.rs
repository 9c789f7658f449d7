//! Web search provider backed by the DuckDuckGo Instant Answer API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use zmai_core::config::SearchConfig;
use zmai_core::types::SearchHit;

use crate::error::SearchError;

/// Longest title derived from a related-topic text.
const MAX_TITLE_CHARS: usize = 80;

/// Best-effort lookup returning short snippets with source URLs.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Search for `query`, returning at most `max_results` hits.
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, SearchError>;
}

/// Keyless search through `api.duckduckgo.com`.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl DuckDuckGoSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::Request(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_redirect", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::Timeout(self.timeout_secs)
                } else {
                    SearchError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        // The API labels its JSON as javascript, so parse the text directly.
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;
        let data: Value =
            serde_json::from_str(&body).map_err(|e| SearchError::Malformed(e.to_string()))?;

        let hits = parse_instant_answer(&data, max_results);
        debug!(query = %query, hits = hits.len(), "Web search finished");
        Ok(hits)
    }
}

/// Turn an Instant Answer payload into at most `max_results` hits.
///
/// The abstract (when present) comes first under the title `"Abstract"`,
/// followed by related topics that carry both a text and a URL.
pub fn parse_instant_answer(data: &Value, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if let Some(text) = non_empty_str(data, "AbstractText") {
        hits.push(SearchHit {
            title: "Abstract".to_string(),
            snippet: text.to_string(),
            url: non_empty_str(data, "AbstractURL").unwrap_or_default().to_string(),
        });
    }

    if let Some(topics) = data.get("RelatedTopics").and_then(Value::as_array) {
        for topic in topics {
            if hits.len() >= max_results {
                break;
            }
            if let (Some(text), Some(url)) =
                (non_empty_str(topic, "Text"), non_empty_str(topic, "FirstURL"))
            {
                hits.push(SearchHit {
                    title: topic_title(text),
                    snippet: text.to_string(),
                    url: url.to_string(),
                });
            }
        }
    }

    hits.truncate(max_results);
    hits
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn topic_title(text: &str) -> String {
    text.split(" - ")
        .next()
        .unwrap_or(text)
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_payload() -> Value {
        json!({
            "AbstractText": "Rust is a systems programming language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust",
            "RelatedTopics": [
                {"Text": "Cargo - The Rust package manager", "FirstURL": "https://duckduckgo.com/Cargo"},
                {"Name": "Grouped", "Topics": [{"Text": "nested", "FirstURL": "https://x"}]},
                {"Text": "Missing url"},
                {"Text": "Ferris - The mascot", "FirstURL": "https://duckduckgo.com/Ferris"}
            ]
        })
    }

    #[test]
    fn test_parse_abstract_and_topics() {
        let hits = parse_instant_answer(&sample_payload(), 6);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "Abstract");
        assert_eq!(hits[0].url, "https://en.wikipedia.org/wiki/Rust");
        assert_eq!(hits[1].title, "Cargo");
        assert_eq!(hits[1].snippet, "Cargo - The Rust package manager");
        assert_eq!(hits[2].title, "Ferris");
    }

    #[test]
    fn test_parse_respects_cap() {
        let hits = parse_instant_answer(&sample_payload(), 2);
        assert_eq!(hits.len(), 2);
        assert!(parse_instant_answer(&sample_payload(), 0).is_empty());
    }

    #[test]
    fn test_parse_empty_payload() {
        let hits = parse_instant_answer(&json!({"AbstractText": "", "RelatedTopics": []}), 5);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_topic_title_truncated_to_80_chars() {
        let text = "é".repeat(100);
        assert_eq!(topic_title(&text).chars().count(), 80);
    }

    #[tokio::test]
    async fn test_search_sends_instant_answer_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "rust lang"))
            .and(query_param("format", "json"))
            .and(query_param("no_redirect", "1"))
            .and(query_param("skip_disambig", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(sample_payload().to_string())
                    .insert_header("content-type", "application/x-javascript"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = SearchConfig {
            base_url: server.uri(),
            ..SearchConfig::default()
        };
        let provider = DuckDuckGoSearch::new(&config).unwrap();
        let hits = provider.search("rust lang", 5).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_search_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = SearchConfig {
            base_url: server.uri(),
            ..SearchConfig::default()
        };
        let provider = DuckDuckGoSearch::new(&config).unwrap();
        let err = provider.search("q", 5).await.unwrap_err();
        assert_eq!(err, SearchError::Status(503));
    }

    #[tokio::test]
    async fn test_search_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let config = SearchConfig {
            base_url: server.uri(),
            ..SearchConfig::default()
        };
        let provider = DuckDuckGoSearch::new(&config).unwrap();
        let err = provider.search("q", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Malformed(_)));
    }
}
