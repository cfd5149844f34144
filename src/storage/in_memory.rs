use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::ProfileStore;
use crate::error::{Result, ScraperError};
use crate::types::ProfileMatch;

/// In-memory profile store for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    records: Mutex<BTreeMap<String, ProfileMatch>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, BTreeMap<String, ProfileMatch>>> {
        self.records
            .lock()
            .map_err(|_| ScraperError::Storage("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, name: &str) -> Result<Option<ProfileMatch>> {
        Ok(self.records()?.get(name).cloned())
    }

    async fn upsert(&self, record: &ProfileMatch) -> Result<()> {
        self.records()?.insert(record.name.clone(), record.clone());
        debug!("Stored profile match for {}", record.name);
        Ok(())
    }

    async fn record_failed_attempt(&self, name: &str) -> Result<ProfileMatch> {
        let now = Utc::now();
        let mut records = self.records()?;
        let record = records
            .entry(name.to_string())
            .and_modify(|record| {
                record.attempts += 1;
                record.resolved_at = now;
            })
            .or_insert_with(|| ProfileMatch::unresolved(name, 1, now));
        debug!("Recorded failed attempt {} for {}", record.attempts, name);
        Ok(record.clone())
    }

    async fn export_all(&self) -> Result<Vec<ProfileMatch>> {
        Ok(self.records()?.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CountSource;

    fn resolved(name: &str, followers: u64) -> ProfileMatch {
        let mut record = ProfileMatch::unresolved(name, 1, Utc::now());
        record.handle = Some("handle".into());
        record.profile_url = Some("https://www.instagram.com/handle/".into());
        record.follower_count = Some(followers);
        record.source = CountSource::FreeText;
        record
    }

    #[tokio::test]
    async fn upsert_twice_equals_once() {
        let store = InMemoryProfileStore::new();
        let record = resolved("Jim Gaffigan", 4_000_000);

        store.upsert(&record).await.unwrap();
        let once = store.export_all().await.unwrap();
        store.upsert(&record).await.unwrap();
        let twice = store.export_all().await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[tokio::test]
    async fn failed_attempts_count_up() {
        let store = InMemoryProfileStore::new();
        assert_eq!(store.record_failed_attempt("Nobody").await.unwrap().attempts, 1);
        assert_eq!(store.record_failed_attempt("Nobody").await.unwrap().attempts, 2);
        assert!(!store.get("Nobody").await.unwrap().unwrap().is_resolved());
    }

    #[tokio::test]
    async fn names_are_not_normalized_and_export_is_sorted() {
        let store = InMemoryProfileStore::new();
        store.upsert(&resolved("jim gaffigan", 1)).await.unwrap();
        store.upsert(&resolved("Jim Gaffigan", 2)).await.unwrap();
        store.upsert(&resolved("Amy Schumer", 3)).await.unwrap();

        let names: Vec<String> = store
            .export_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Amy Schumer", "Jim Gaffigan", "jim gaffigan"]);
    }
}
