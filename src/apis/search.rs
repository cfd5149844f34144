use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::{SearchConfig, SearchCredentials};
use crate::constants::MAX_RESULTS_PER_QUERY;
use crate::error::{Result, ScraperError};
use crate::infra::http_client;
use crate::rate_limiter::RateLimiter;

/// Custom Search JSON response. `items` is absent when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub pagemap: Option<PageMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMap {
    #[serde(default)]
    pub metatags: Vec<HashMap<String, serde_json::Value>>,
}

impl SearchItem {
    /// `og:description` from the first metatag block, if it is a non-empty string.
    pub fn og_description(&self) -> Option<&str> {
        self.pagemap
            .as_ref()?
            .metatags
            .first()?
            .get("og:description")?
            .as_str()
            .filter(|description| !description.trim().is_empty())
    }

    /// Title and snippet joined, the text confidence and free-text counts read.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.snippet)
    }
}

#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(&self, query: &str, limit: u32) -> Result<SearchResponse>;
}

#[async_trait]
impl<T: SearchApi + ?Sized> SearchApi for Arc<T> {
    async fn search(&self, query: &str, limit: u32) -> Result<SearchResponse> {
        (**self).search(query, limit).await
    }
}

pub struct GoogleSearchClient {
    client: reqwest::Client,
    base_url: String,
    credentials: SearchCredentials,
    limiter: RateLimiter,
}

impl GoogleSearchClient {
    pub fn new(config: &SearchConfig, credentials: SearchCredentials) -> Result<Self> {
        let client = http_client::search_client(config.timeout())?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            credentials,
            limiter: RateLimiter::fixed(Duration::from_millis(config.delay_ms)),
        })
    }

    async fn send(&self, query: &str, limit: u32) -> Result<SearchResponse> {
        let num = limit.clamp(1, MAX_RESULTS_PER_QUERY).to_string();
        let params = [
            ("key", self.credentials.api_key.as_str()),
            ("cx", self.credentials.cse_id.as_str()),
            ("q", query),
            ("num", num.as_str()),
        ];

        // The request URL carries the API key; keep it out of errors and logs.
        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ScraperError::Network(e.without_url()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| ScraperError::Network(e.without_url()))?;

        serde_json::from_slice(&body)
            .map_err(|e| ScraperError::decode(format!("search response did not match schema: {}", e)))
    }
}

#[async_trait]
impl SearchApi for GoogleSearchClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, limit: u32) -> Result<SearchResponse> {
        metrics::counter!("search_requests_total").increment(1);

        let result = self.send(query, limit).await;
        match &result {
            Ok(response) => debug!("Search returned {} results", response.items.len()),
            Err(e) => {
                metrics::counter!("search_request_failures_total").increment(1);
                warn!("Search request failed: {}", e);
            }
        }

        self.limiter.pause().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "kind": "customsearch#search",
        "items": [
            {
                "title": "Jim Gaffigan (@jimgaffigan) • Instagram photos and videos",
                "link": "https://www.instagram.com/jimgaffigan/",
                "snippet": "4M Followers, 1,038 Following, 2,757 Posts",
                "pagemap": {
                    "metatags": [
                        {"og:description": "4M Followers, 1,038 Following, 2,757 Posts - See Instagram photos", "og:type": "profile"}
                    ]
                }
            },
            {
                "link": "https://en.wikipedia.org/wiki/Jim_Gaffigan"
            }
        ]
    }"#;

    #[test]
    fn decodes_items_with_optional_fields() {
        let response: SearchResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(response.items.len(), 2);

        let first = &response.items[0];
        assert!(first.og_description().unwrap().starts_with("4M Followers"));

        let second = &response.items[1];
        assert_eq!(second.title, "");
        assert_eq!(second.og_description(), None);
    }

    #[test]
    fn missing_items_means_no_results() {
        let response: SearchResponse =
            serde_json::from_str(r#"{"kind": "customsearch#search", "searchInformation": {}}"#).unwrap();
        assert!(response.items.is_empty());
    }

    #[test]
    fn non_string_metatag_is_ignored() {
        let item: SearchItem = serde_json::from_str(
            r#"{"link": "https://www.instagram.com/x/", "pagemap": {"metatags": [{"og:description": 5}]}}"#,
        )
        .unwrap();
        assert_eq!(item.og_description(), None);
    }

    #[test]
    fn text_joins_title_and_snippet() {
        let item = SearchItem {
            link: "https://example.com".into(),
            title: "Title".into(),
            snippet: "Snippet".into(),
            pagemap: None,
        };
        assert_eq!(item.text(), "Title Snippet");
    }

    #[tokio::test]
    async fn unreachable_search_is_network_failure_without_key_in_message() {
        let config = SearchConfig {
            base_url: "http://127.0.0.1:1/customsearch/v1".into(),
            timeout_secs: 5,
            delay_ms: 0,
            ..SearchConfig::default()
        };
        let credentials = SearchCredentials {
            api_key: "super-secret-key".into(),
            cse_id: "cx".into(),
        };
        let client = GoogleSearchClient::new(&config, credentials).unwrap();

        let err = client.search("jim gaffigan instagram", 10).await.unwrap_err();
        assert!(err.is_network());
        assert!(!err.to_string().contains("super-secret-key"));
    }
}
