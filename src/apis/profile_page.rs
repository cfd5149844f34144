use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::SearchConfig;
use crate::error::Result;
use crate::infra::http_client;
use crate::rate_limiter::RateLimiter;

/// Fetches a public profile page as HTML.
#[async_trait]
pub trait ProfilePageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String>;
}

pub struct ProfilePageClient {
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl ProfilePageClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        Ok(Self {
            client: http_client::page_client(config.timeout())?,
            limiter: RateLimiter::fixed(Duration::from_millis(config.profile_page_delay_ms)),
        })
    }

    async fn get_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ProfilePageSource for ProfilePageClient {
    #[instrument(skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String> {
        metrics::counter!("profile_page_requests_total").increment(1);

        let result = self.get_page(url).await;

        if let Err(e) = &result {
            debug!("Profile page fetch failed: {}", e);
        }
        self.limiter.pause().await;
        result
    }
}
