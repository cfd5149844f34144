use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{ProfileStore, StoreStats};
use crate::error::{Result, ScraperError};
use crate::types::{CountSource, ProfileMatch};

const SELECT_COLUMNS: &str = "name, instagram_username, instagram_url, follower_count, followers_text, \
     confidence_score, follower_source, last_updated, search_attempts, verified";

/// SQLite-backed profile store; one `comedians` row per performer name.
pub struct SqliteProfileStore {
    conn: Mutex<Connection>,
}

impl SqliteProfileStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        info!("Opened profile store at {}", db_path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS comedians (
                name               TEXT PRIMARY KEY,
                instagram_username TEXT,
                instagram_url      TEXT,
                follower_count     INTEGER,
                followers_text     TEXT,
                confidence_score   REAL NOT NULL DEFAULT 0,
                follower_source    TEXT NOT NULL DEFAULT 'none',
                last_updated       TEXT NOT NULL,
                search_attempts    INTEGER NOT NULL DEFAULT 0,
                verified           INTEGER NOT NULL DEFAULT 0,
                created_at         TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ScraperError::Storage("profile store connection lock poisoned".to_string()))
    }

    fn select_one(conn: &Connection, name: &str) -> Result<Option<ProfileMatch>> {
        let sql = format!("SELECT {} FROM comedians WHERE name = ?1", SELECT_COLUMNS);
        let record = conn
            .query_row(&sql, params![name], row_to_match)
            .optional()?;
        Ok(record)
    }
}

fn row_to_match(row: &Row<'_>) -> rusqlite::Result<ProfileMatch> {
    let last_updated: String = row.get(7)?;
    let resolved_at = DateTime::parse_from_rfc3339(&last_updated)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;
    let follower_count: Option<i64> = row.get(3)?;
    let source: String = row.get(6)?;
    let attempts: i64 = row.get(8)?;

    Ok(ProfileMatch {
        name: row.get(0)?,
        handle: row.get(1)?,
        profile_url: row.get(2)?,
        follower_count: follower_count.map(|count| count.max(0) as u64),
        followers_text: row.get(4)?,
        confidence: row.get(5)?,
        source: CountSource::from_label(&source),
        resolved_at,
        attempts: u32::try_from(attempts.max(0)).unwrap_or(u32::MAX),
        verified: row.get(9)?,
    })
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn get(&self, name: &str) -> Result<Option<ProfileMatch>> {
        let conn = self.conn()?;
        Self::select_one(&conn, name)
    }

    async fn upsert(&self, record: &ProfileMatch) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO comedians (name, instagram_username, instagram_url, follower_count, followers_text,
                                    confidence_score, follower_source, last_updated, search_attempts, verified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(name) DO UPDATE SET
                instagram_username=excluded.instagram_username,
                instagram_url=excluded.instagram_url,
                follower_count=excluded.follower_count,
                followers_text=excluded.followers_text,
                confidence_score=excluded.confidence_score,
                follower_source=excluded.follower_source,
                last_updated=excluded.last_updated,
                search_attempts=excluded.search_attempts,
                verified=excluded.verified",
            params![
                record.name,
                record.handle,
                record.profile_url,
                record.follower_count.map(|count| i64::try_from(count).unwrap_or(i64::MAX)),
                record.followers_text,
                record.confidence,
                record.source.as_str(),
                record.resolved_at.to_rfc3339(),
                i64::from(record.attempts),
                record.verified,
            ],
        )?;
        debug!("Stored profile match for {}", record.name);
        Ok(())
    }

    async fn record_failed_attempt(&self, name: &str) -> Result<ProfileMatch> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO comedians (name, last_updated, search_attempts) VALUES (?1, ?2, 1)
             ON CONFLICT(name) DO UPDATE SET
                search_attempts=search_attempts + 1,
                last_updated=excluded.last_updated",
            params![name, Utc::now().to_rfc3339()],
        )?;
        let record = Self::select_one(&conn, name)?
            .ok_or_else(|| ScraperError::Storage(format!("record for {} vanished after update", name)))?;
        debug!("Recorded failed attempt {} for {}", record.attempts, name);
        Ok(record)
    }

    async fn export_all(&self) -> Result<Vec<ProfileMatch>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM comedians ORDER BY name", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], row_to_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;
        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN instagram_url IS NOT NULL THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN follower_count > 0 THEN 1 ELSE 0 END), 0),
                    AVG(CASE WHEN follower_count > 0 THEN follower_count END)
             FROM comedians",
            [],
            |row| {
                let total: i64 = row.get(0)?;
                let with_profile: i64 = row.get(1)?;
                let with_followers: i64 = row.get(2)?;
                let average: Option<f64> = row.get(3)?;
                Ok(StoreStats {
                    total: total.max(0) as u64,
                    with_profile: with_profile.max(0) as u64,
                    with_followers: with_followers.max(0) as u64,
                    average_followers: average.map_or(0, |avg| avg.max(0.0) as u64),
                })
            },
        )?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn resolved(name: &str, followers: Option<u64>) -> ProfileMatch {
        let mut record = ProfileMatch::unresolved(name, 1, Utc::now());
        record.handle = Some("jimgaffigan".into());
        record.profile_url = Some("https://www.instagram.com/jimgaffigan/".into());
        record.follower_count = followers;
        record.followers_text = followers.map(crate::popularity::format_count);
        record.confidence = 0.6;
        record.source = CountSource::StructuredMetadata;
        record.verified = true;
        record
    }

    #[tokio::test]
    async fn upsert_round_trips_whole_record() {
        let dir = tempdir().unwrap();
        let store = SqliteProfileStore::open(dir.path().join("nested").join("profiles.db")).unwrap();
        let record = resolved("Jim Gaffigan", Some(4_000_000));

        store.upsert(&record).await.unwrap();
        let loaded = store.get("Jim Gaffigan").await.unwrap().unwrap();

        assert_eq!(loaded.handle, record.handle);
        assert_eq!(loaded.profile_url, record.profile_url);
        assert_eq!(loaded.follower_count, Some(4_000_000));
        assert_eq!(loaded.followers_text.as_deref(), Some("4.0M"));
        assert_eq!(loaded.source, CountSource::StructuredMetadata);
        assert_eq!(loaded.attempts, 1);
        assert!(loaded.verified);
        assert_eq!(loaded.resolved_at.timestamp(), record.resolved_at.timestamp());
    }

    #[tokio::test]
    async fn upsert_twice_equals_once() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        let record = resolved("Jim Gaffigan", Some(10));

        store.upsert(&record).await.unwrap();
        let once = store.export_all().await.unwrap();
        store.upsert(&record).await.unwrap();
        let twice = store.export_all().await.unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 1);
    }

    #[tokio::test]
    async fn upsert_replaces_previous_record() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        store.upsert(&resolved("Jim Gaffigan", Some(10))).await.unwrap();

        let mut replacement = resolved("Jim Gaffigan", None);
        replacement.attempts = 2;
        replacement.source = CountSource::None;
        store.upsert(&replacement).await.unwrap();

        let loaded = store.get("Jim Gaffigan").await.unwrap().unwrap();
        assert_eq!(loaded.follower_count, None);
        assert_eq!(loaded.followers_text, None);
        assert_eq!(loaded.attempts, 2);
    }

    #[tokio::test]
    async fn failed_attempt_creates_then_increments() {
        let store = SqliteProfileStore::open_in_memory().unwrap();

        let first = store.record_failed_attempt("Nobody").await.unwrap();
        assert_eq!(first.attempts, 1);
        assert!(!first.is_resolved());
        assert_eq!(first.source, CountSource::None);

        let second = store.record_failed_attempt("Nobody").await.unwrap();
        assert_eq!(second.attempts, 2);
    }

    #[tokio::test]
    async fn failed_attempt_keeps_existing_profile() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        store.upsert(&resolved("Jim Gaffigan", Some(5))).await.unwrap();

        let record = store.record_failed_attempt("Jim Gaffigan").await.unwrap();
        assert_eq!(record.attempts, 2);
        assert!(record.is_resolved());
    }

    #[tokio::test]
    async fn stats_and_ordering() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        store.upsert(&resolved("Zed", Some(1_000))).await.unwrap();
        store.upsert(&resolved("amy", Some(3_000))).await.unwrap();
        store.upsert(&resolved("Bob", None)).await.unwrap();
        store.record_failed_attempt("Carl").await.unwrap();

        let names: Vec<String> = store.export_all().await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Bob", "Carl", "Zed", "amy"]);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.with_profile, 3);
        assert_eq!(stats.with_followers, 2);
        assert_eq!(stats.average_followers, 2_000);
        assert_eq!(stats, StoreStats::from_records(&store.export_all().await.unwrap()));
    }

    #[tokio::test]
    async fn reopening_keeps_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profiles.db");
        {
            let store = SqliteProfileStore::open(&path).unwrap();
            store.record_failed_attempt("Nobody").await.unwrap();
        }
        let store = SqliteProfileStore::open(&path).unwrap();
        assert_eq!(store.get("Nobody").await.unwrap().unwrap().attempts, 1);
    }
}
