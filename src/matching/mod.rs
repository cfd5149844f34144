//! Resolves a performer name to a social profile from search results.

pub mod confidence;
pub mod handle;
pub mod queries;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::apis::search::{SearchApi, SearchItem};
use crate::config::SearchConfig;
use crate::constants::{VERIFIED_GLYPH, VERIFIED_WORD};
use crate::error::Result;
use crate::popularity::{self, format_count};
use crate::types::{CountSource, ProfileMatch, Resolution};

pub use confidence::confidence_score;
pub use handle::{canonical_profile_url, extract_handle, is_profile_domain};
pub use queries::build_queries;

/// One acceptable profile seen in a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub handle: String,
    pub profile_url: String,
    pub follower_count: u64,
    pub source: CountSource,
    pub confidence: f64,
    pub verified: bool,
}

impl Candidate {
    fn from_item(name: &str, item: &SearchItem) -> Option<Self> {
        if !is_profile_domain(&item.link) {
            return None;
        }
        let handle = extract_handle(&item.link)?;
        let text = item.text();
        let extraction = popularity::extract_count(item);

        Some(Self {
            profile_url: canonical_profile_url(&handle),
            confidence: confidence_score(name, &handle, &text),
            verified: text.to_lowercase().contains(VERIFIED_WORD) || text.contains(VERIFIED_GLYPH),
            follower_count: extraction.count,
            source: extraction.source,
            handle,
        })
    }

    // Higher wins; ties keep the earlier result.
    fn tier(&self) -> u8 {
        match self.source {
            CountSource::StructuredMetadata => 2,
            CountSource::FreeText | CountSource::ProfilePage => 1,
            CountSource::None => 0,
        }
    }

    pub fn into_match(self, name: &str, resolved_at: DateTime<Utc>) -> ProfileMatch {
        let follower_count = (self.follower_count > 0).then_some(self.follower_count);
        ProfileMatch {
            name: name.to_string(),
            profile_url: Some(self.profile_url),
            handle: Some(self.handle),
            follower_count,
            followers_text: follower_count.map(format_count),
            confidence: self.confidence,
            source: if follower_count.is_some() {
                self.source
            } else {
                CountSource::None
            },
            resolved_at,
            attempts: 1,
            verified: self.verified,
        }
    }
}

/// Picks the candidate for one query's results. A structured count returns
/// at once; otherwise a free-text count beats a bare profile link.
pub fn select_candidate(name: &str, items: &[SearchItem]) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;

    for item in items {
        let Some(candidate) = Candidate::from_item(name, item) else {
            continue;
        };
        if candidate.source == CountSource::StructuredMetadata {
            return Some(candidate);
        }
        if best.as_ref().map_or(true, |kept| candidate.tier() > kept.tier()) {
            best = Some(candidate);
        }
    }

    best
}

pub struct ProfileMatcher {
    search: Box<dyn SearchApi>,
    templates: Vec<String>,
    results_per_query: u32,
}

impl ProfileMatcher {
    pub fn new(search: Box<dyn SearchApi>, config: &SearchConfig) -> Self {
        Self {
            search,
            templates: config.query_templates.clone(),
            results_per_query: config.results_per_query,
        }
    }

    pub fn queries_for(&self, name: &str) -> Vec<String> {
        build_queries(name, &self.templates)
    }

    /// Runs the queries in order until one yields a candidate. Search
    /// failures propagate; the caller decides what a failed name costs.
    #[instrument(skip(self))]
    pub async fn resolve(&self, name: &str) -> Result<Resolution> {
        for query in self.queries_for(name) {
            debug!("Searching for: {}", query);
            let response = self.search.search(&query, self.results_per_query).await?;

            if let Some(candidate) = select_candidate(name, &response.items) {
                info!(
                    handle = %candidate.handle,
                    followers = candidate.follower_count,
                    source = %candidate.source,
                    confidence = candidate.confidence,
                    "Profile found"
                );
                metrics::counter!("profile_resolutions_total", "outcome" => "found").increment(1);
                return Ok(Resolution::Found(candidate.into_match(name, Utc::now())));
            }
        }

        info!("No profile found");
        metrics::counter!("profile_resolutions_total", "outcome" => "not_found").increment(1);
        Ok(Resolution::NotFound)
    }
}
