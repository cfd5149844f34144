use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::LineupConfig;
use crate::constants::LINEUP_ACTION;
use crate::error::{Result, ScraperError};
use crate::infra::http_client;
use crate::rate_limiter::RateLimiter;

/// Lineup markup for one date. `html` is `None` when the venue had no shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineupPayload {
    pub html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LineupEnvelope {
    #[serde(default)]
    show: Option<ShowField>,
}

// The endpoint answers `false`, `null` or `[]` on dark days.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ShowField {
    Block(ShowBlock),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct ShowBlock {
    #[serde(default)]
    html: Option<serde_json::Value>,
}

/// Decodes a raw response body. Anything that is not a JSON object is a
/// decode failure; an object without usable markup is an empty payload.
pub fn decode_payload(body: &[u8]) -> Result<LineupPayload> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| ScraperError::decode(format!("lineup response is not JSON: {}", e)))?;
    if !value.is_object() {
        return Err(ScraperError::decode("lineup response is not a JSON object"));
    }
    let envelope: LineupEnvelope = serde_json::from_value(value)
        .map_err(|e| ScraperError::decode(format!("lineup response is not a lineup envelope: {}", e)))?;

    let html = match envelope.show {
        Some(ShowField::Block(block)) => block
            .html
            .and_then(|value| value.as_str().map(str::to_string))
            .filter(|html| !html.trim().is_empty()),
        Some(ShowField::Other(_)) | None => None,
    };

    Ok(LineupPayload { html })
}

/// Anything that can hand back one day's lineup markup.
#[async_trait]
pub trait LineupSource: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<LineupPayload>;
}

pub struct LineupGateway {
    client: reqwest::Client,
    base_url: String,
    venue: String,
    request_type: String,
    limiter: RateLimiter,
}

impl LineupGateway {
    pub fn new(config: &LineupConfig) -> Result<Self> {
        let client = http_client::lineup_client(config.timeout())?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &LineupConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            venue: config.venue.clone(),
            request_type: config.request_type.clone(),
            limiter: RateLimiter::new(
                Duration::from_millis(config.delay_ms),
                config.batch_size,
                Duration::from_secs(config.batch_pause_secs),
            ),
        }
    }

    fn request_json(&self, date: NaiveDate) -> String {
        json!({
            "date": date.format("%Y-%m-%d").to_string(),
            "venue": self.venue,
            "type": self.request_type,
        })
        .to_string()
    }

    async fn send(&self, date: NaiveDate) -> Result<LineupPayload> {
        let form = [
            ("action", LINEUP_ACTION.to_string()),
            ("json", self.request_json(date)),
        ];

        let response = self
            .client
            .post(&self.base_url)
            .form(&form[..])
            .send()
            .await?
            .error_for_status()?;

        let body = response.bytes().await?;
        decode_payload(&body)
    }
}

#[async_trait]
impl LineupSource for LineupGateway {
    #[instrument(skip(self), fields(date = %date))]
    async fn fetch(&self, date: NaiveDate) -> Result<LineupPayload> {
        info!("Requesting lineup data");
        metrics::counter!("lineup_requests_total").increment(1);

        let result = self.send(date).await;
        match &result {
            Ok(payload) => debug!(has_markup = payload.html.is_some(), "Lineup response decoded"),
            Err(e) => {
                metrics::counter!("lineup_request_failures_total").increment(1);
                warn!("Lineup request for {} failed: {}", date, e);
            }
        }

        self.limiter.pause().await;
        result
    }
}
