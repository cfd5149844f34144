use chrono::{NaiveDate, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::apis::lineup::LineupSource;
use crate::error::Result;
use crate::parser::LineupParser;
use crate::shutdown::Shutdown;
use crate::tabular::{self, ExportPaths, ScrapeSummary};
use crate::types::Show;

const PROGRESS_EVERY: usize = 100;

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub paths: ExportPaths,
    /// Re-export everything collected so far every N dates; 0 disables.
    pub checkpoint_every: usize,
}

/// Result of a complete scrape run
#[derive(Debug, Serialize)]
pub struct ScrapeResult {
    pub shows: Vec<Show>,
    pub dates_requested: usize,
    pub dates_processed: usize,
    pub dates_failed: usize,
    pub interrupted: bool,
    /// `None` when no shows were found and nothing was written.
    pub summary: Option<ScrapeSummary>,
}

/// Every date from `start` to `end`, inclusive. Empty when `start > end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|date| *date <= end).collect()
}

pub struct ScrapePipeline;

impl ScrapePipeline {
    /// Fetches and parses each date in order. A failed date is logged and
    /// skipped; an interrupt abandons the in-flight date and exports what
    /// was collected.
    #[instrument(skip(source, options, shutdown), fields(start = %options.start, end = %options.end))]
    pub async fn run(
        source: &dyn LineupSource,
        options: &ScrapeOptions,
        shutdown: &mut Shutdown,
    ) -> Result<ScrapeResult> {
        let dates = date_range(options.start, options.end);
        let total = dates.len();
        let parser = LineupParser::new();

        info!("🎭 Starting lineup scrape for {} dates", total);
        println!("🎭 Scraping {} dates ({} to {})", total, options.start, options.end);

        let mut shows: Vec<Show> = Vec::new();
        let mut processed = 0;
        let mut failed = 0;
        let mut interrupted = false;

        for (i, date) in dates.iter().copied().enumerate() {
            if shutdown.is_triggered() {
                interrupted = true;
                break;
            }

            let t_fetch = std::time::Instant::now();
            let fetched = tokio::select! {
                result = source.fetch(date) => result,
                _ = shutdown.cancelled() => {
                    interrupted = true;
                    break;
                }
            };
            histogram!("lineup_fetch_duration_seconds").record(t_fetch.elapsed().as_secs_f64());
            processed += 1;

            match fetched {
                Ok(payload) => {
                    let day = payload
                        .html
                        .as_deref()
                        .map(|markup| parser.parse(date, markup))
                        .unwrap_or_default();
                    if day.is_empty() {
                        debug!("No shows on {}", date);
                    } else {
                        info!("Found {} shows for {}", day.len(), date);
                    }
                    counter!("lineup_shows_parsed_total").increment(day.len() as u64);
                    shows.extend(day);
                }
                Err(e) => {
                    failed += 1;
                    warn!("Skipping {}: {}", date, e);
                }
            }

            let done = i + 1;
            if done % PROGRESS_EVERY == 0 {
                info!("Progress: {}/{} dates processed", done, total);
                println!("   Processed {}/{} dates, {} shows so far", done, total, shows.len());
            }

            if options.checkpoint_every > 0
                && done % options.checkpoint_every == 0
                && done < total
                && !shows.is_empty()
            {
                tabular::export_shows(&shows, &options.paths, Utc::now())?;
                debug!("Checkpoint written after {} dates", done);
            }
        }

        if interrupted {
            warn!("Scrape interrupted after {} of {} dates", processed, total);
            println!("⚠️  Interrupted after {} of {} dates; exporting what was collected", processed, total);
        }

        let summary = if shows.is_empty() {
            println!("No show data was found for this range");
            None
        } else {
            let summary = tabular::export_shows(&shows, &options.paths, Utc::now())?;
            println!("💾 Saved {} shows to {}", summary.total_shows, options.paths.shows.display());
            println!("💾 Saved {} appearances to {}", summary.total_comedian_appearances, options.paths.performers.display());
            Some(summary)
        };

        info!(
            "✅ Scrape finished: {} shows, {} dates failed, interrupted={}",
            shows.len(),
            failed,
            interrupted
        );

        Ok(ScrapeResult {
            shows,
            dates_requested: total,
            dates_processed: processed,
            dates_failed: failed,
            interrupted,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let dates = date_range(start, end);

        assert_eq!(dates.len(), 4);
        assert_eq!(dates[2], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(*dates.last().unwrap(), end);
    }

    #[test]
    fn single_day_and_reversed_ranges() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(date_range(day, day), vec![day]);
        assert!(date_range(day, day.pred_opt().unwrap()).is_empty());
    }
}
