use anyhow::{bail, Context};
use chrono::{Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use lineup_scraper::apis::LineupGateway;
use lineup_scraper::config::{Config, SearchCredentials};
use lineup_scraper::constants::DEFAULT_NAME_COLUMN;
use lineup_scraper::enrich::ProfileEnricher;
use lineup_scraper::logging;
use lineup_scraper::pipeline::{
    EnhanceOptions, EnhancePipeline, EnhanceReport, ScrapeOptions, ScrapePipeline, ScrapeResult,
};
use lineup_scraper::popularity::format_count;
use lineup_scraper::shutdown::Shutdown;
use lineup_scraper::storage::{ProfileStore, SqliteProfileStore};
use lineup_scraper::tabular::{self, ExportPaths};

#[derive(Parser)]
#[command(name = "lineup_scraper")]
#[command(about = "Comedy Cellar lineup scraper with Instagram follower enrichment")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to $LINEUP_CONFIG, then ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct RangeArgs {
    /// First date to scrape (YYYY-MM-DD); defaults to 2020-01-01
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last date to scrape, inclusive (YYYY-MM-DD); defaults to today
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Start on January 1st of this year
    #[arg(long, conflicts_with = "start")]
    start_year: Option<i32>,
    /// End on December 31st of this year
    #[arg(long, conflicts_with = "end")]
    end_year: Option<i32>,
    /// Scrape the last N days up to today
    #[arg(long, conflicts_with_all = ["start", "end", "start_year", "end_year"])]
    last_days: Option<u32>,
    /// Base name for the exported files
    #[arg(long)]
    name: Option<String>,
}

impl RangeArgs {
    fn resolve(&self, today: NaiveDate) -> anyhow::Result<(NaiveDate, NaiveDate)> {
        if let Some(days) = self.last_days {
            let start = today
                .checked_sub_signed(chrono::Duration::days(i64::from(days)))
                .context("--last-days is out of range")?;
            return Ok((start, today));
        }

        let start = match (self.start, self.start_year) {
            (Some(date), _) => date,
            (None, Some(year)) => NaiveDate::from_ymd_opt(year, 1, 1)
                .with_context(|| format!("invalid start year {}", year))?,
            (None, None) => NaiveDate::from_ymd_opt(2020, 1, 1).context("default start date")?,
        };
        let end = match (self.end, self.end_year) {
            (Some(date), _) => date,
            (None, Some(year)) => NaiveDate::from_ymd_opt(year, 12, 31)
                .with_context(|| format!("invalid end year {}", year))?,
            (None, None) => today,
        };

        if start > end {
            bail!("start date {} is after end date {}", start, end);
        }
        Ok((start, end))
    }

    fn export_paths(&self, output_dir: &Path) -> ExportPaths {
        let base_name = self
            .name
            .clone()
            .unwrap_or_else(|| tabular::default_base_name(Utc::now()));
        ExportPaths::new(output_dir, &base_name)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape lineups for a date range and export CSV files
    Scrape {
        #[command(flatten)]
        range: RangeArgs,
        /// Directory for the exported CSV files
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Add Instagram follower data to a performer appearance CSV
    Enhance {
        /// Performer appearance CSV to enrich
        #[arg(long, required_unless_present = "auto", conflicts_with = "auto")]
        input: Option<PathBuf>,
        /// Use the newest *_comedians.csv in the output directory
        #[arg(long)]
        auto: bool,
        /// Where to write the enriched CSV
        #[arg(long)]
        output: Option<PathBuf>,
        /// Column holding performer names
        #[arg(long, default_value = DEFAULT_NAME_COLUMN)]
        name_column: String,
        /// Search again for names already in the profile store
        #[arg(long)]
        refresh: bool,
    },
    /// Scrape a date range, then enhance the resulting performer CSV
    Run {
        #[command(flatten)]
        range: RangeArgs,
        /// Search again for names already in the profile store
        #[arg(long)]
        refresh: bool,
    },
    /// Show profile store statistics
    Stats,
    /// Export the profile store to CSV
    ExportDb {
        /// Where to write the CSV snapshot
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

async fn scrape(
    config: &Config,
    range: &RangeArgs,
    paths: ExportPaths,
    shutdown: &mut Shutdown,
) -> anyhow::Result<ScrapeResult> {
    let (start, end) = range.resolve(Local::now().date_naive())?;
    let options = ScrapeOptions {
        start,
        end,
        paths,
        checkpoint_every: config.storage.checkpoint_every,
    };

    let gateway = LineupGateway::new(&config.lineup)?;
    let result = ScrapePipeline::run(&gateway, &options, shutdown).await?;

    println!("\n📊 Scrape Results:");
    println!("   Dates requested: {}", result.dates_requested);
    println!("   Dates processed: {}", result.dates_processed);
    println!("   Dates failed: {}", result.dates_failed);
    println!("   Shows found: {}", result.shows.len());
    if let Some(summary) = &result.summary {
        println!("   Unique comedians: {}", summary.unique_comedians);
        println!("   Appearances: {}", summary.total_comedian_appearances);
    }
    Ok(result)
}

async fn enhance(
    config: &Config,
    credentials: SearchCredentials,
    options: EnhanceOptions,
    refresh: bool,
    shutdown: &mut Shutdown,
) -> anyhow::Result<EnhanceReport> {
    let store: Arc<dyn ProfileStore> = Arc::new(SqliteProfileStore::open(&config.storage.database_path)?);
    let enricher = ProfileEnricher::from_config(&config.search, credentials, store)?.refreshing(refresh);

    println!("🔄 Enhancing {}", options.input.display());
    let report = EnhancePipeline::run(&enricher, &options, shutdown).await?;

    println!("\n📊 Enhancement Results:");
    println!("   Total appearances: {}", report.total_appearances);
    println!("   Unique comedians: {}", report.unique_names);
    println!("   Resolved this run: {}", report.names_resolved);
    println!("   Reused from store: {}", report.names_cached);
    println!("   Not found: {}", report.names_not_found);
    println!("   Skipped (attempt cap): {}", report.names_skipped);
    println!("   Failed: {}", report.names_failed);
    println!("   Appearances with Instagram: {}", report.appearances_with_profile);
    println!("   Unique comedians with Instagram: {}", report.unique_with_profile);
    println!("   Rows with follower data: {}", report.appearances_with_followers);
    println!("   Discovery rate: {:.1}%", report.discovery_rate());
    println!("💾 Enhanced data saved to {}", report.output.display());
    if report.interrupted {
        println!("⚠️  Run was interrupted; unprocessed names have blank Instagram columns");
    }
    Ok(report)
}

fn enhance_options(config: &Config, input: PathBuf, output: Option<PathBuf>, name_column: String) -> EnhanceOptions {
    let output = output.unwrap_or_else(|| {
        config.storage.enriched_dir.join(format!(
            "enhanced_comedians_{}.csv",
            Utc::now().format("%Y%m%d_%H%M%S")
        ))
    });
    EnhanceOptions {
        input,
        output,
        name_column,
        names_per_pause: config.search.names_per_pause,
        name_pause: Duration::from_secs(config.search.name_pause_secs),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let mut shutdown = Shutdown::on_ctrl_c();

    match cli.command {
        Commands::Scrape { range, output_dir } => {
            println!("🔄 Running lineup scraper...");
            let output_dir = output_dir.unwrap_or_else(|| config.storage.output_dir.clone());
            scrape(&config, &range, range.export_paths(&output_dir), &mut shutdown).await?;
        }
        Commands::Enhance {
            input,
            auto,
            output,
            name_column,
            refresh,
        } => {
            let credentials = SearchCredentials::from_env()?;
            let input = match input {
                Some(path) if !auto => path,
                _ => {
                    let latest = tabular::find_latest_performers_csv(&config.storage.output_dir)?;
                    println!("📁 Using latest file: {}", latest.display());
                    latest
                }
            };
            let options = enhance_options(&config, input, output, name_column);
            enhance(&config, credentials, options, refresh, &mut shutdown).await?;
        }
        Commands::Run { range, refresh } => {
            // Fail on missing credentials before spending hours scraping
            let credentials = SearchCredentials::from_env()?;

            println!("🚀 Running full pipeline: scrape, then enhance");
            let paths = range.export_paths(&config.storage.output_dir);
            let performers = paths.performers.clone();
            let result = scrape(&config, &range, paths, &mut shutdown).await?;
            if result.interrupted {
                info!("Scrape interrupted; skipping enhancement");
                return Ok(());
            }
            if result.summary.is_none() {
                println!("Nothing to enhance");
                return Ok(());
            }

            let options = enhance_options(&config, performers, None, DEFAULT_NAME_COLUMN.to_string());
            enhance(&config, credentials, options, refresh, &mut shutdown).await?;
        }
        Commands::Stats => {
            let store = SqliteProfileStore::open(&config.storage.database_path)?;
            let stats = store.stats().await?;

            println!("📊 Profile store statistics ({})", config.storage.database_path.display());
            println!("   Total comedians: {}", stats.total);
            println!("   With Instagram: {}", stats.with_profile);
            println!("   With follower data: {}", stats.with_followers);
            println!("   Discovery rate: {:.1}%", stats.found_rate());
            println!("   Average followers: {}", format_count(stats.average_followers));
        }
        Commands::ExportDb { output } => {
            let store = SqliteProfileStore::open(&config.storage.database_path)?;
            let records = store.export_all().await?;
            let output = output.unwrap_or_else(|| {
                config.storage.enriched_dir.join(format!(
                    "comedian_database_export_{}.csv",
                    Utc::now().format("%Y%m%d_%H%M%S")
                ))
            });
            if let Err(e) = tabular::export_store(&records, &output) {
                error!("Export failed: {}", e);
                return Err(e.into());
            }
            println!("💾 Exported {} records to {}", records.len(), output.display());
        }
    }

    Ok(())
}
