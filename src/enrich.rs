//! Per-name enrichment: store cache check, profile resolution, optional
//! profile-page fallback, and persistence of the outcome.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::apis::profile_page::{ProfilePageClient, ProfilePageSource};
use crate::apis::search::GoogleSearchClient;
use crate::config::{SearchConfig, SearchCredentials};
use crate::error::Result;
use crate::matching::ProfileMatcher;
use crate::popularity::{extract_page_count, format_count};
use crate::storage::ProfileStore;
use crate::types::{CountSource, ProfileMatch, Resolution};

/// What happened to one name.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    /// Already resolved in the store; no search made.
    Cached(ProfileMatch),
    Resolved(ProfileMatch),
    NotFound(ProfileMatch),
    /// Unresolved and out of attempts; no search made.
    Skipped(ProfileMatch),
    /// The search itself failed; counted as an attempt.
    Failed { record: ProfileMatch, error: String },
}

impl EnrichOutcome {
    pub fn record(&self) -> &ProfileMatch {
        match self {
            EnrichOutcome::Cached(record)
            | EnrichOutcome::Resolved(record)
            | EnrichOutcome::NotFound(record)
            | EnrichOutcome::Skipped(record)
            | EnrichOutcome::Failed { record, .. } => record,
        }
    }

    pub fn into_record(self) -> ProfileMatch {
        match self {
            EnrichOutcome::Cached(record)
            | EnrichOutcome::Resolved(record)
            | EnrichOutcome::NotFound(record)
            | EnrichOutcome::Skipped(record)
            | EnrichOutcome::Failed { record, .. } => record,
        }
    }

    /// True when the outcome cost at least one search call.
    pub fn searched(&self) -> bool {
        !matches!(self, EnrichOutcome::Cached(_) | EnrichOutcome::Skipped(_))
    }
}

pub struct ProfileEnricher {
    matcher: ProfileMatcher,
    store: Arc<dyn ProfileStore>,
    pages: Option<Box<dyn ProfilePageSource>>,
    max_attempts: u32,
    refresh: bool,
}

impl ProfileEnricher {
    pub fn new(matcher: ProfileMatcher, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            matcher,
            store,
            pages: None,
            max_attempts: 0,
            refresh: false,
        }
    }

    /// Wires the Google client, optional profile-page client, and the
    /// attempt cap from the search config.
    pub fn from_config(
        config: &SearchConfig,
        credentials: SearchCredentials,
        store: Arc<dyn ProfileStore>,
    ) -> Result<Self> {
        let search = GoogleSearchClient::new(config, credentials)?;
        let matcher = ProfileMatcher::new(Box::new(search), config);
        let mut enricher = Self::new(matcher, store).with_max_attempts(config.max_attempts);
        if config.fetch_profile_pages {
            enricher = enricher.with_profile_pages(Box::new(ProfilePageClient::new(config)?));
        }
        Ok(enricher)
    }

    pub fn with_profile_pages(mut self, pages: Box<dyn ProfilePageSource>) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Unresolved names stop being searched after this many attempts; 0 never stops.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Re-resolve names even when the store already has them.
    pub fn refreshing(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// Store errors propagate. A failed search is recorded as an attempt
    /// and reported through the outcome.
    #[instrument(skip(self))]
    pub async fn enrich(&self, name: &str) -> Result<EnrichOutcome> {
        let existing = self.store.get(name).await?;

        if let Some(record) = existing.as_ref().filter(|_| !self.refresh) {
            if record.is_resolved() {
                debug!("Using stored profile");
                return Ok(EnrichOutcome::Cached(record.clone()));
            }
            if self.max_attempts > 0 && record.attempts >= self.max_attempts {
                debug!("Giving up after {} attempts", record.attempts);
                return Ok(EnrichOutcome::Skipped(record.clone()));
            }
        }

        let previous_attempts = existing.as_ref().map_or(0, |record| record.attempts);

        match self.matcher.resolve(name).await {
            Ok(Resolution::Found(mut record)) => {
                record.attempts = previous_attempts + 1;
                if record.follower_count.is_none() {
                    self.fill_from_profile_page(&mut record).await;
                }
                self.store.upsert(&record).await?;
                info!(
                    "Resolved to {} ({})",
                    record.profile_url.as_deref().unwrap_or_default(),
                    record.followers_text.as_deref().unwrap_or("no count")
                );
                Ok(EnrichOutcome::Resolved(record))
            }
            Ok(Resolution::NotFound) => {
                let record = self.store.record_failed_attempt(name).await?;
                Ok(EnrichOutcome::NotFound(record))
            }
            Err(e) => {
                warn!("Search failed: {}", e);
                let record = self.store.record_failed_attempt(name).await?;
                Ok(EnrichOutcome::Failed {
                    record,
                    error: e.to_string(),
                })
            }
        }
    }

    async fn fill_from_profile_page(&self, record: &mut ProfileMatch) {
        let (Some(pages), Some(url)) = (self.pages.as_ref(), record.profile_url.as_deref()) else {
            return;
        };

        match pages.fetch_page(url).await {
            Ok(html) => {
                if let Some((count, raw)) = extract_page_count(&html) {
                    debug!("Profile page shows {} followers", raw);
                    record.follower_count = Some(count);
                    record.followers_text = Some(format_count(count));
                    record.source = CountSource::ProfilePage;
                }
            }
            Err(e) => debug!("Profile page unavailable: {}", e),
        }
    }
}
