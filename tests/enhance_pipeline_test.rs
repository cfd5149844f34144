use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use lineup_scraper::apis::{SearchApi, SearchItem, SearchResponse};
use lineup_scraper::config::SearchConfig;
use lineup_scraper::enrich::ProfileEnricher;
use lineup_scraper::error::Result as ScrapeResult;
use lineup_scraper::matching::ProfileMatcher;
use lineup_scraper::pipeline::{EnhanceOptions, EnhancePipeline};
use lineup_scraper::shutdown::{self, Shutdown, ShutdownTrigger};
use lineup_scraper::storage::{InMemoryProfileStore, ProfileStore, SqliteProfileStore};

const APPEARANCES: &str = "\
show_id,date,time,venue,comedian_id,comedian_name
4411,2024-05-17,7:00 pm,MacDougal Street,0,Jim Gaffigan
4411,2024-05-17,7:00 pm,MacDougal Street,0,Sam Morril
4412,2024-05-17,9:30 pm,Village Underground,0,Jim Gaffigan
4413,2024-05-18,7:00 pm,MacDougal Street,0,
";

/// Knows two comedians and counts every call.
struct KnownProfiles {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SearchApi for KnownProfiles {
    async fn search(&self, query: &str, _limit: u32) -> ScrapeResult<SearchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let items = if query.contains("Gaffigan") {
            vec![SearchItem {
                link: "https://www.instagram.com/jimgaffigan/".to_string(),
                title: "Jim Gaffigan (@jimgaffigan) • Instagram photos and videos".to_string(),
                snippet: "4.1M Followers, 900 Following, 3,000 Posts".to_string(),
                pagemap: None,
            }]
        } else if query.contains("Morril") {
            vec![SearchItem {
                link: "https://www.instagram.com/sammorril/?hl=en".to_string(),
                title: "Sam Morril (@sammorril)".to_string(),
                snippet: "Comedian. 12K followers".to_string(),
                pagemap: None,
            }]
        } else {
            Vec::new()
        };
        Ok(SearchResponse { items })
    }
}

fn enricher(store: Arc<SqliteProfileStore>, calls: Arc<AtomicUsize>) -> ProfileEnricher {
    let config = SearchConfig::default();
    let matcher = ProfileMatcher::new(Box::new(KnownProfiles { calls }), &config);
    ProfileEnricher::new(matcher, store).with_max_attempts(config.max_attempts)
}

#[tokio::test]
async fn enhance_writes_enriched_rows_and_reuses_the_store() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("may_comedians.csv");
    std::fs::write(&input, APPEARANCES)?;

    let store = Arc::new(SqliteProfileStore::open(temp_dir.path().join("profiles.db"))?);
    let calls = Arc::new(AtomicUsize::new(0));
    let enricher = enricher(store.clone(), calls.clone());

    let options = EnhanceOptions {
        input: input.clone(),
        output: temp_dir.path().join("enriched").join("may_enhanced.csv"),
        name_column: "comedian_name".to_string(),
        names_per_pause: 0,
        name_pause: Duration::ZERO,
    };

    let mut shutdown = Shutdown::never();
    let report = EnhancePipeline::run(&enricher, &options, &mut shutdown).await?;

    assert_eq!(report.total_appearances, 4);
    assert_eq!(report.unique_names, 2);
    assert_eq!(report.names_resolved, 2);
    assert_eq!(report.appearances_with_profile, 3);
    assert_eq!(report.appearances_with_followers, 3);
    assert!((report.discovery_rate() - 100.0).abs() < f64::EPSILON);

    let mut reader = csv::Reader::from_path(&options.output)?;
    let headers = reader.headers()?.clone();
    let handle_at = headers.iter().position(|h| h == "instagram_username").unwrap();
    let count_at = headers.iter().position(|h| h == "follower_count").unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;

    assert_eq!(rows.len(), 4);
    assert_eq!(&rows[0][handle_at], "jimgaffigan");
    assert_eq!(&rows[0][count_at], "4100000");
    assert_eq!(&rows[1][handle_at], "sammorril");
    assert_eq!(&rows[1][count_at], "12000");
    assert_eq!(&rows[3][handle_at], "");

    let searched = calls.load(Ordering::SeqCst);
    assert!(searched >= 2);

    // Second pass answers from the store
    let again = EnhancePipeline::run(&enricher, &options, &mut shutdown).await?;
    assert_eq!(again.names_cached, 2);
    assert_eq!(again.names_resolved, 0);
    assert_eq!(calls.load(Ordering::SeqCst), searched);

    let stats = store.stats().await?;
    assert_eq!(stats.total, 2);
    assert_eq!(stats.with_followers, 2);
    Ok(())
}

#[tokio::test]
async fn missing_name_column_is_an_error() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("odd.csv");
    std::fs::write(&input, "performer\nJim Gaffigan\n")?;

    let store = Arc::new(SqliteProfileStore::open_in_memory()?);
    let enricher = enricher(store, Arc::new(AtomicUsize::new(0)));
    let options = EnhanceOptions {
        input,
        output: temp_dir.path().join("out.csv"),
        name_column: "comedian_name".to_string(),
        names_per_pause: 0,
        name_pause: Duration::ZERO,
    };

    let mut shutdown = Shutdown::never();
    assert!(EnhancePipeline::run(&enricher, &options, &mut shutdown).await.is_err());
    assert!(!options.output.exists());
    Ok(())
}

/// Answers for Jim Gaffigan, then fires the stop signal and hangs on the next name.
struct StopsAfterFirstName {
    trigger: ShutdownTrigger,
}

#[async_trait]
impl SearchApi for StopsAfterFirstName {
    async fn search(&self, query: &str, _limit: u32) -> ScrapeResult<SearchResponse> {
        if query.contains("Gaffigan") {
            return Ok(SearchResponse {
                items: vec![SearchItem {
                    link: "https://www.instagram.com/jimgaffigan/".to_string(),
                    title: "Jim Gaffigan (@jimgaffigan)".to_string(),
                    snippet: "4.1M Followers".to_string(),
                    pagemap: None,
                }],
            });
        }
        self.trigger.trigger();
        std::future::pending::<()>().await;
        Ok(SearchResponse::default())
    }
}

#[tokio::test]
async fn interrupted_enhance_writes_every_row_with_blanks_for_unreached_names() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("may_comedians.csv");
    std::fs::write(&input, APPEARANCES)?;

    let (trigger, mut shutdown) = shutdown::channel();
    let config = SearchConfig::default();
    let matcher = ProfileMatcher::new(Box::new(StopsAfterFirstName { trigger }), &config);
    let store = Arc::new(InMemoryProfileStore::new());
    let enricher = ProfileEnricher::new(matcher, store.clone());

    let options = EnhanceOptions {
        input,
        output: temp_dir.path().join("partial.csv"),
        name_column: "comedian_name".to_string(),
        names_per_pause: 0,
        name_pause: Duration::ZERO,
    };

    let report = EnhancePipeline::run(&enricher, &options, &mut shutdown).await?;

    assert!(report.interrupted);
    assert_eq!(report.names_resolved, 1);
    assert_eq!(report.unique_with_profile, 1);
    assert_eq!(report.appearances_with_profile, 2);

    let mut reader = csv::Reader::from_path(&options.output)?;
    let headers = reader.headers()?.clone();
    let name_at = headers.iter().position(|h| h == "comedian_name").unwrap();
    let handle_at = headers.iter().position(|h| h == "instagram_username").unwrap();
    let attempts_at = headers.iter().position(|h| h == "search_attempts").unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;

    assert_eq!(rows.len(), 4);
    assert_eq!(&rows[0][handle_at], "jimgaffigan");
    assert_eq!(&rows[2][handle_at], "jimgaffigan");
    assert_eq!(&rows[1][name_at], "Sam Morril");
    assert_eq!(&rows[1][handle_at], "");
    assert_eq!(&rows[1][attempts_at], "");

    // The abandoned name never reached the store
    assert!(store.get("Sam Morril").await?.is_none());
    Ok(())
}
