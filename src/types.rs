use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One performer appearance inside a show's lineup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performer {
    /// Free text; also the key used for profile matching.
    pub name: String,
    pub external_id: Option<u64>,
    pub description: String,
    pub website: Option<String>,
    pub thumb_url: Option<String>,
    /// 0-based position of the entry within its lineup block.
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub show_id: u64,
    pub date: NaiveDate,
    pub time: String,
    /// Never present in HTML payloads; kept for the export layout.
    pub hour_key: Option<String>,
    pub title: String,
    pub venue: String,
    pub performers: Vec<Performer>,
}

/// Where a follower count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CountSource {
    StructuredMetadata,
    FreeText,
    ProfilePage,
    None,
}

impl CountSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountSource::StructuredMetadata => "structured-metadata",
            CountSource::FreeText => "free-text",
            CountSource::ProfilePage => "profile-page",
            CountSource::None => "none",
        }
    }

    /// Unknown labels read back as `None`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "structured-metadata" => CountSource::StructuredMetadata,
            "free-text" => CountSource::FreeText,
            "profile-page" => CountSource::ProfilePage,
            _ => CountSource::None,
        }
    }
}

impl fmt::Display for CountSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored outcome of resolving one performer name to a social profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMatch {
    pub name: String,
    pub profile_url: Option<String>,
    pub handle: Option<String>,
    pub follower_count: Option<u64>,
    pub followers_text: Option<String>,
    pub confidence: f64,
    pub source: CountSource,
    pub resolved_at: DateTime<Utc>,
    pub attempts: u32,
    pub verified: bool,
}

impl ProfileMatch {
    /// A bare record for a name no search has resolved yet.
    pub fn unresolved(name: &str, attempts: u32, resolved_at: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            profile_url: None,
            handle: None,
            follower_count: None,
            followers_text: None,
            confidence: 0.0,
            source: CountSource::None,
            resolved_at,
            attempts,
            verified: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.profile_url.is_some()
    }

    pub fn has_followers(&self) -> bool {
        self.follower_count.map_or(false, |count| count > 0)
    }
}

/// Result of running the matcher for one name. Not finding a profile is an
/// ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ProfileMatch),
    NotFound,
}
