//! CSV exports and the performer-appearance table the enhancer reads.
//!
//! Column order is fixed; downstream notebooks index columns by name and
//! position. Every file is written to a `.tmp` sibling and renamed into place.

use chrono::{DateTime, Utc};
use csv::{StringRecord, WriterBuilder};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::{PERFORMERS_FILE_SUFFIX, SHOWS_FILE_SUFFIX, SUMMARY_FILE_SUFFIX};
use crate::error::{Result, ScraperError};
use crate::types::{ProfileMatch, Show};

pub const SHOW_COLUMNS: [&str; 7] = [
    "show_id",
    "date",
    "time",
    "hour_key",
    "venue",
    "comedian_count",
    "comedians",
];

pub const APPEARANCE_COLUMNS: [&str; 10] = [
    "show_id",
    "date",
    "time",
    "venue",
    "comedian_id",
    "comedian_name",
    "order",
    "description",
    "website",
    "thumb_url",
];

pub const SUMMARY_COLUMNS: [&str; 6] = [
    "total_shows",
    "unique_dates_with_shows",
    "unique_comedians",
    "unique_venues",
    "total_comedian_appearances",
    "scrape_date",
];

pub const ENRICHMENT_COLUMNS: [&str; 8] = [
    "instagram_username",
    "instagram_url",
    "follower_count",
    "followers_text",
    "confidence_score",
    "follower_source",
    "search_attempts",
    "last_updated",
];

pub const STORE_COLUMNS: [&str; 10] = [
    "name",
    "instagram_username",
    "instagram_url",
    "follower_count",
    "followers_text",
    "confidence_score",
    "follower_source",
    "last_updated",
    "search_attempts",
    "verified",
];

#[derive(Serialize)]
struct ShowRow<'a> {
    show_id: u64,
    date: String,
    time: &'a str,
    hour_key: &'a str,
    venue: &'a str,
    comedian_count: usize,
    comedians: String,
}

#[derive(Serialize)]
struct AppearanceRow<'a> {
    show_id: u64,
    date: String,
    time: &'a str,
    venue: &'a str,
    comedian_id: u64,
    comedian_name: &'a str,
    order: usize,
    description: &'a str,
    website: Option<&'a str>,
    thumb_url: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrapeSummary {
    pub total_shows: usize,
    pub unique_dates_with_shows: usize,
    pub unique_comedians: usize,
    pub unique_venues: usize,
    pub total_comedian_appearances: usize,
    pub scrape_date: String,
}

#[derive(Serialize)]
struct StoreRow<'a> {
    name: &'a str,
    instagram_username: Option<&'a str>,
    instagram_url: Option<&'a str>,
    follower_count: Option<u64>,
    followers_text: Option<&'a str>,
    confidence_score: String,
    follower_source: &'static str,
    last_updated: String,
    search_attempts: u32,
    verified: bool,
}

/// The three files one scrape produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub shows: PathBuf,
    pub performers: PathBuf,
    pub summary: PathBuf,
}

impl ExportPaths {
    pub fn new(output_dir: &Path, base_name: &str) -> Self {
        Self {
            shows: output_dir.join(format!("{}{}", base_name, SHOWS_FILE_SUFFIX)),
            performers: output_dir.join(format!("{}{}", base_name, PERFORMERS_FILE_SUFFIX)),
            summary: output_dir.join(format!("{}{}", base_name, SUMMARY_FILE_SUFFIX)),
        }
    }
}

pub fn default_base_name(now: DateTime<Utc>) -> String {
    format!("comedy_cellar_lineups_{}", now.format("%Y%m%d_%H%M%S"))
}

pub fn summarize(shows: &[Show], scraped_at: DateTime<Utc>) -> ScrapeSummary {
    let dates: BTreeSet<_> = shows.iter().map(|show| show.date).collect();
    let venues: HashSet<&str> = shows.iter().map(|show| show.venue.as_str()).collect();
    let comedians: HashSet<&str> = shows
        .iter()
        .flat_map(|show| show.performers.iter().map(|p| p.name.as_str()))
        .collect();

    ScrapeSummary {
        total_shows: shows.len(),
        unique_dates_with_shows: dates.len(),
        unique_comedians: comedians.len(),
        unique_venues: venues.len(),
        total_comedian_appearances: shows.iter().map(|show| show.performers.len()).sum(),
        scrape_date: scraped_at.to_rfc3339(),
    }
}

/// Writes the shows, appearances, and summary files.
pub fn export_shows(shows: &[Show], paths: &ExportPaths, scraped_at: DateTime<Utc>) -> Result<ScrapeSummary> {
    write_csv(&paths.shows, &SHOW_COLUMNS, |writer| {
        for show in shows {
            writer.serialize(ShowRow {
                show_id: show.show_id,
                date: show.date.format("%Y-%m-%d").to_string(),
                time: &show.time,
                hour_key: show.hour_key.as_deref().unwrap_or(""),
                venue: &show.venue,
                comedian_count: show.performers.len(),
                comedians: show
                    .performers
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            })?;
        }
        Ok(())
    })?;

    write_csv(&paths.performers, &APPEARANCE_COLUMNS, |writer| {
        for show in shows {
            let date = show.date.format("%Y-%m-%d").to_string();
            for performer in &show.performers {
                writer.serialize(AppearanceRow {
                    show_id: show.show_id,
                    date: date.clone(),
                    time: &show.time,
                    venue: &show.venue,
                    comedian_id: performer.external_id.unwrap_or(0),
                    comedian_name: &performer.name,
                    order: performer.order,
                    description: &performer.description,
                    website: performer.website.as_deref(),
                    thumb_url: performer.thumb_url.as_deref(),
                })?;
            }
        }
        Ok(())
    })?;

    let summary = summarize(shows, scraped_at);
    write_csv(&paths.summary, &SUMMARY_COLUMNS, |writer| {
        writer.serialize(&summary)?;
        Ok(())
    })?;

    info!(
        "Exported {} shows and {} appearances to {}",
        summary.total_shows,
        summary.total_comedian_appearances,
        paths.shows.display()
    );
    Ok(summary)
}

/// Snapshot of the profile store, one row per name.
pub fn export_store(records: &[ProfileMatch], path: &Path) -> Result<()> {
    write_csv(path, &STORE_COLUMNS, |writer| {
        for record in records {
            writer.serialize(StoreRow {
                name: &record.name,
                instagram_username: record.handle.as_deref(),
                instagram_url: record.profile_url.as_deref(),
                follower_count: record.follower_count,
                followers_text: record.followers_text.as_deref(),
                confidence_score: format!("{:.2}", record.confidence),
                follower_source: record.source.as_str(),
                last_updated: record.resolved_at.to_rfc3339(),
                search_attempts: record.attempts,
                verified: record.verified,
            })?;
        }
        Ok(())
    })?;
    info!("Exported {} profile records to {}", records.len(), path.display());
    Ok(())
}

/// Enrichment columns for one appearance row; blank when the name has no record.
pub fn enrichment_fields(record: Option<&ProfileMatch>) -> [String; 8] {
    let Some(record) = record else {
        return Default::default();
    };
    [
        record.handle.clone().unwrap_or_default(),
        record.profile_url.clone().unwrap_or_default(),
        record.follower_count.map(|c| c.to_string()).unwrap_or_default(),
        record.followers_text.clone().unwrap_or_default(),
        format!("{:.2}", record.confidence),
        record.source.as_str().to_string(),
        record.attempts.to_string(),
        record.resolved_at.to_rfc3339(),
    ]
}

/// A performer-appearance CSV loaded for enrichment.
#[derive(Debug, Clone)]
pub struct PerformerTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    name_index: usize,
}

impl PerformerTable {
    pub fn read(path: &Path, name_column: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let name_index = headers
            .iter()
            .position(|header| header == name_column)
            .ok_or_else(|| {
                ScraperError::MissingField(format!("column '{}' in {}", name_column, path.display()))
            })?;
        let rows = reader.records().collect::<std::result::Result<Vec<_>, csv::Error>>()?;

        debug!("Loaded {} rows from {}", rows.len(), path.display());
        Ok(Self {
            headers,
            rows,
            name_index,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row.get(self.name_index).unwrap_or(""))
    }

    /// Distinct non-blank names in first-seen order.
    pub fn unique_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.names()
            .filter(|name| !name.trim().is_empty())
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    /// Every input column, then the enrichment columns. Input columns that
    /// share an enrichment column's name are replaced, not duplicated.
    pub fn write_enriched(&self, path: &Path, records: &HashMap<String, ProfileMatch>) -> Result<()> {
        let kept: Vec<usize> = (0..self.headers.len())
            .filter(|&i| i == self.name_index || !ENRICHMENT_COLUMNS.contains(&&self.headers[i]))
            .collect();

        let mut header: Vec<&str> = kept.iter().map(|&i| &self.headers[i]).collect();
        header.extend(ENRICHMENT_COLUMNS);

        write_csv(path, &header, |writer| {
            for row in &self.rows {
                let name = row.get(self.name_index).unwrap_or("");
                let mut out: Vec<String> = kept
                    .iter()
                    .map(|&i| row.get(i).unwrap_or("").to_string())
                    .collect();
                out.extend(enrichment_fields(records.get(name)));
                writer.write_record(&out)?;
            }
            Ok(())
        })?;

        info!("Wrote {} enriched rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

/// Newest `*_comedians.csv` in `dir` by modification time.
pub fn find_latest_performers_csv(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir).map_err(|e| {
        ScraperError::Config(format!("Cannot read data directory {}: {}", dir.display(), e))
    })?;

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.ends_with(PERFORMERS_FILE_SUFFIX));
        if !matches || !path.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if newest.as_ref().map_or(true, |(best, _)| modified > *best) {
            newest = Some((modified, path));
        }
    }

    newest.map(|(_, path)| path).ok_or_else(|| {
        ScraperError::Config(format!(
            "No *{} files found in {}; run the scraper first",
            PERFORMERS_FILE_SUFFIX,
            dir.display()
        ))
    })
}

fn write_csv<F>(path: &Path, header: &[&str], write_rows: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_sibling(path);
    match write_to(&tmp, header, write_rows) {
        Ok(()) => {
            fs::rename(&tmp, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

fn write_to<F>(tmp: &Path, header: &[&str], write_rows: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<File>) -> Result<()>,
{
    let mut writer = WriterBuilder::new().has_headers(false).from_path(tmp)?;
    writer.write_record(header)?;
    write_rows(&mut writer)?;
    writer.flush()?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CountSource, Performer};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn performer(name: &str, order: usize) -> Performer {
        Performer {
            name: name.to_string(),
            external_id: None,
            description: format!("{} bio", name),
            website: None,
            thumb_url: Some(format!("/img/{}.jpg", order)),
            order,
        }
    }

    fn sample_shows() -> Vec<Show> {
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        vec![
            Show {
                show_id: 4411,
                date,
                time: "7:00 pm".into(),
                hour_key: None,
                title: "7:00 pm - MacDougal Street".into(),
                venue: "MacDougal Street".into(),
                performers: vec![performer("Jim Gaffigan", 0), performer("Sam Morril", 1)],
            },
            Show {
                show_id: 4412,
                date,
                time: "9:30 pm".into(),
                hour_key: None,
                title: "9:30 pm - Village Underground".into(),
                venue: "Village Underground".into(),
                performers: vec![performer("Sam Morril", 0)],
            },
        ]
    }

    #[test]
    fn exports_three_files_with_fixed_columns() {
        let dir = tempdir().unwrap();
        let paths = ExportPaths::new(dir.path(), "run");
        let summary = export_shows(&sample_shows(), &paths, Utc::now()).unwrap();

        assert_eq!(summary.total_shows, 2);
        assert_eq!(summary.unique_dates_with_shows, 1);
        assert_eq!(summary.unique_comedians, 2);
        assert_eq!(summary.unique_venues, 2);
        assert_eq!(summary.total_comedian_appearances, 3);

        let shows = fs::read_to_string(&paths.shows).unwrap();
        let mut lines = shows.lines();
        assert_eq!(lines.next().unwrap(), SHOW_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "4411,2024-05-17,7:00 pm,,MacDougal Street,2,Jim Gaffigan; Sam Morril"
        );

        let appearances = fs::read_to_string(&paths.performers).unwrap();
        let mut lines = appearances.lines();
        assert_eq!(lines.next().unwrap(), APPEARANCE_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "4411,2024-05-17,7:00 pm,MacDougal Street,0,Jim Gaffigan,0,Jim Gaffigan bio,,/img/0.jpg"
        );
        assert_eq!(appearances.lines().count(), 4);

        let summary_file = fs::read_to_string(&paths.summary).unwrap();
        assert!(summary_file.starts_with(&SUMMARY_COLUMNS.join(",")));
        assert!(!dir.path().join("run_shows.csv.tmp").exists());
    }

    #[test]
    fn empty_export_still_has_headers() {
        let dir = tempdir().unwrap();
        let paths = ExportPaths::new(dir.path(), "empty");
        export_shows(&[], &paths, Utc::now()).unwrap();

        assert_eq!(
            fs::read_to_string(&paths.performers).unwrap().trim_end(),
            APPEARANCE_COLUMNS.join(",")
        );
    }

    #[test]
    fn performer_table_reads_exported_appearances() {
        let dir = tempdir().unwrap();
        let paths = ExportPaths::new(dir.path(), "run");
        export_shows(&sample_shows(), &paths, Utc::now()).unwrap();

        let table = PerformerTable::read(&paths.performers, "comedian_name").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.unique_names(), vec!["Jim Gaffigan", "Sam Morril"]);
    }

    #[test]
    fn missing_name_column_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("people.csv");
        fs::write(&path, "performer,venue\nJim,Cellar\n").unwrap();

        let err = PerformerTable::read(&path, "comedian_name").unwrap_err();
        assert!(matches!(err, ScraperError::MissingField(_)));
    }

    #[test]
    fn enriched_output_appends_columns_and_replaces_stale_ones() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.csv");
        fs::write(
            &input,
            "comedian_name,venue,follower_count\nJim Gaffigan,Cellar,1\nNobody,Cellar,\n,Cellar,\n",
        )
        .unwrap();

        let mut record = ProfileMatch::unresolved("Jim Gaffigan", 1, Utc::now());
        record.handle = Some("jimgaffigan".into());
        record.profile_url = Some("https://www.instagram.com/jimgaffigan/".into());
        record.follower_count = Some(4_000_000);
        record.followers_text = Some("4.0M".into());
        record.confidence = 0.6;
        record.source = CountSource::StructuredMetadata;
        let mut records = HashMap::new();
        records.insert(record.name.clone(), record);

        let table = PerformerTable::read(&input, "comedian_name").unwrap();
        assert_eq!(table.unique_names(), vec!["Jim Gaffigan", "Nobody"]);

        let output = dir.path().join("out").join("enriched.csv");
        table.write_enriched(&output, &records).unwrap();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        let mut expected = vec!["comedian_name".to_string(), "venue".to_string()];
        expected.extend(ENRICHMENT_COLUMNS.iter().map(|c| c.to_string()));
        assert_eq!(headers, expected);

        let rows: Vec<StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(&rows[0][2], "jimgaffigan");
        assert_eq!(&rows[0][4], "4000000");
        assert_eq!(&rows[0][5], "4.0M");
        assert_eq!(&rows[0][6], "0.60");
        assert_eq!(&rows[0][7], "structured-metadata");
        assert_eq!(&rows[1][3], "");
    }

    #[test]
    fn store_snapshot_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.csv");
        let records = vec![ProfileMatch::unresolved("Nobody", 2, Utc::now())];
        export_store(&records, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), STORE_COLUMNS.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("Nobody,,,,,0.00,none,"));
        assert!(row.ends_with(",2,false"));
    }

    #[test]
    fn finds_newest_performers_file() {
        let dir = tempdir().unwrap();
        assert!(find_latest_performers_csv(dir.path()).is_err());

        fs::write(dir.path().join("old_comedians.csv"), "comedian_name\n").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(dir.path().join("new_comedians.csv"), "comedian_name\n").unwrap();
        fs::write(dir.path().join("new_shows.csv"), "show_id\n").unwrap();

        let latest = find_latest_performers_csv(dir.path()).unwrap();
        assert_eq!(latest.file_name().unwrap(), "new_comedians.csv");
    }
}
