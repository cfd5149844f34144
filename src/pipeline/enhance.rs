use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::enrich::{EnrichOutcome, ProfileEnricher};
use crate::error::Result;
use crate::rate_limiter::RateLimiter;
use crate::shutdown::Shutdown;
use crate::tabular::PerformerTable;
use crate::types::ProfileMatch;

#[derive(Debug, Clone)]
pub struct EnhanceOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub name_column: String,
    /// Longer pause after every N searched names; 0 disables.
    pub names_per_pause: u64,
    pub name_pause: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnhanceReport {
    pub total_appearances: usize,
    pub unique_names: usize,
    pub names_resolved: usize,
    pub names_cached: usize,
    pub names_not_found: usize,
    pub names_skipped: usize,
    pub names_failed: usize,
    pub appearances_with_profile: usize,
    pub unique_with_profile: usize,
    pub appearances_with_followers: usize,
    pub interrupted: bool,
    pub output: PathBuf,
}

impl EnhanceReport {
    /// Share of unique names with a profile, in percent.
    pub fn discovery_rate(&self) -> f64 {
        if self.unique_names == 0 {
            0.0
        } else {
            self.unique_with_profile as f64 / self.unique_names as f64 * 100.0
        }
    }
}

pub struct EnhancePipeline;

impl EnhancePipeline {
    /// Enriches every distinct name in the input table, then writes the
    /// input rows with profile columns appended. On interrupt the rows
    /// seen so far keep their data and the rest stay blank.
    #[instrument(skip(enricher, options, shutdown), fields(input = %options.input.display()))]
    pub async fn run(
        enricher: &ProfileEnricher,
        options: &EnhanceOptions,
        shutdown: &mut Shutdown,
    ) -> Result<EnhanceReport> {
        let table = PerformerTable::read(&options.input, &options.name_column)?;
        let names = table.unique_names();
        let pacer = RateLimiter::new(Duration::ZERO, options.names_per_pause, options.name_pause);

        info!("📊 Processing {} unique names from {} rows", names.len(), table.len());
        println!("📊 {} appearances, {} unique comedians", table.len(), names.len());

        let mut report = EnhanceReport {
            total_appearances: table.len(),
            unique_names: names.len(),
            output: options.output.clone(),
            ..EnhanceReport::default()
        };
        let mut records: HashMap<String, ProfileMatch> = HashMap::new();

        for (i, name) in names.iter().enumerate() {
            if shutdown.is_triggered() {
                report.interrupted = true;
                break;
            }
            println!("🔍 [{}/{}] {}", i + 1, names.len(), name);

            let outcome = tokio::select! {
                outcome = enricher.enrich(name) => outcome,
                _ = shutdown.cancelled() => {
                    report.interrupted = true;
                    break;
                }
            };

            match outcome {
                Ok(outcome) => {
                    match &outcome {
                        EnrichOutcome::Resolved(_) => report.names_resolved += 1,
                        EnrichOutcome::Cached(_) => report.names_cached += 1,
                        EnrichOutcome::NotFound(_) => report.names_not_found += 1,
                        EnrichOutcome::Skipped(_) => report.names_skipped += 1,
                        EnrichOutcome::Failed { .. } => report.names_failed += 1,
                    }
                    let searched = outcome.searched();
                    records.insert(name.clone(), outcome.into_record());
                    if searched {
                        pacer.pause().await;
                    }
                }
                Err(e) => {
                    report.names_failed += 1;
                    counter!("enrichment_errors_total").increment(1);
                    error!("Failed to enrich {}: {}", name, e);
                }
            }
        }

        if report.interrupted {
            warn!("Enhancement interrupted; writing partial results");
        }

        table.write_enriched(&options.output, &records)?;

        report.unique_with_profile = records.values().filter(|r| r.is_resolved()).count();
        for name in table.names() {
            if let Some(record) = records.get(name) {
                if record.is_resolved() {
                    report.appearances_with_profile += 1;
                }
                if record.has_followers() {
                    report.appearances_with_followers += 1;
                }
            }
        }

        info!(
            "✅ Enhancement finished: {}/{} names with profiles ({:.1}%)",
            report.unique_with_profile,
            report.unique_names,
            report.discovery_rate()
        );
        Ok(report)
    }
}
