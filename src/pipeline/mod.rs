// Run loops: date range -> lineup shows, appearance table -> enriched table

pub mod enhance;
pub mod scrape;

pub use enhance::{EnhanceOptions, EnhancePipeline, EnhanceReport};
pub use scrape::{date_range, ScrapeOptions, ScrapePipeline, ScrapeResult};
