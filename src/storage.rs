//! Name-keyed store of profile matches.
//!
//! Keys are the performer name exactly as scraped; case and whitespace
//! variants are separate records.

pub mod in_memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::types::ProfileMatch;

pub use in_memory::InMemoryProfileStore;
pub use sqlite::SqliteProfileStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total: u64,
    pub with_profile: u64,
    pub with_followers: u64,
    /// Mean over records that have a positive count.
    pub average_followers: u64,
}

impl StoreStats {
    /// Share of names with a resolved profile, in percent.
    pub fn found_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.with_profile as f64 / self.total as f64 * 100.0
        }
    }

    pub fn from_records(records: &[ProfileMatch]) -> Self {
        let counts: Vec<u64> = records
            .iter()
            .filter_map(|record| record.follower_count.filter(|count| *count > 0))
            .collect();
        let average_followers = if counts.is_empty() {
            0
        } else {
            counts.iter().map(|c| u128::from(*c)).sum::<u128>() as u64 / counts.len() as u64
        };

        Self {
            total: records.len() as u64,
            with_profile: records.iter().filter(|r| r.is_resolved()).count() as u64,
            with_followers: counts.len() as u64,
            average_followers,
        }
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<ProfileMatch>>;

    /// Replaces the whole record for `record.name` in one write.
    async fn upsert(&self, record: &ProfileMatch) -> Result<()>;

    /// Bumps the attempt counter, creating a bare record on first failure.
    /// Returns the record as stored afterwards.
    async fn record_failed_attempt(&self, name: &str) -> Result<ProfileMatch>;

    /// Every record, ordered by name.
    async fn export_all(&self) -> Result<Vec<ProfileMatch>>;

    async fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats::from_records(&self.export_all().await?))
    }
}
