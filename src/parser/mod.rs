use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{Performer, Show};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid lineup selector")
}

static SET_HEADER: Lazy<Selector> = Lazy::new(|| selector("div.set-header"));
static TIME_LABEL: Lazy<Selector> = Lazy::new(|| selector("span.bold"));
static VENUE_LABEL: Lazy<Selector> = Lazy::new(|| selector("span.title"));
static LINEUP_TOGGLE: Lazy<Selector> = Lazy::new(|| selector("span.lineup-toggle"));
static LINEUP_BLOCK: Lazy<Selector> = Lazy::new(|| selector("div[data-set-content]"));
static PERFORMER_ENTRY: Lazy<Selector> = Lazy::new(|| selector("div.set-content"));
static PERFORMER_NAME: Lazy<Selector> = Lazy::new(|| selector("span.name"));
static LINK: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("img[src]"));

static SHOW_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*show\s*$").expect("valid show suffix pattern"));

/// A record the parser dropped. Logged, never fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseSkip {
    #[error("show header {index} has no time label")]
    MissingTime { index: usize },

    #[error("show header {index} has no venue label")]
    MissingVenue { index: usize },

    #[error("entry {order} of lineup {lineup_id} has no performer name")]
    MissingName { lineup_id: String, order: usize },
}

/// Turns the lineup HTML fragment for one date into shows.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineupParser;

impl LineupParser {
    pub fn new() -> Self {
        Self
    }

    /// Malformed headers and entries are skipped; everything else on the
    /// page still parses.
    pub fn parse(&self, date: NaiveDate, markup: &str) -> Vec<Show> {
        let document = Html::parse_fragment(markup);
        let mut shows = Vec::new();

        for (index, header) in document.select(&SET_HEADER).enumerate() {
            match self.parse_show(&document, date, index, header) {
                Ok(show) => shows.push(show),
                Err(skip) => warn!(%date, "Skipping show: {}", skip),
            }
        }

        debug!(%date, "Parsed {} shows", shows.len());
        shows
    }

    fn parse_show(
        &self,
        document: &Html,
        date: NaiveDate,
        index: usize,
        header: ElementRef<'_>,
    ) -> Result<Show, ParseSkip> {
        // Only an absent label skips the header; a blank one is kept as is.
        let time = first_text(header, &TIME_LABEL)
            .map(|label| SHOW_SUFFIX.replace(&label, "").trim().to_string())
            .ok_or(ParseSkip::MissingTime { index })?;
        let venue = first_text(header, &VENUE_LABEL).ok_or(ParseSkip::MissingVenue { index })?;

        let correlation = header
            .select(&LINEUP_TOGGLE)
            .find_map(|toggle| toggle.value().attr("data-lineup-id"))
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let lineup_id = correlation.map_or_else(|| index.to_string(), str::to_string);

        let performers = document
            .select(&LINEUP_BLOCK)
            .find(|block| block.value().attr("data-set-content") == Some(lineup_id.as_str()))
            .map(|block| self.parse_performers(block, &lineup_id))
            .unwrap_or_default();

        Ok(Show {
            show_id: show_id(correlation, date, &time, &venue),
            date,
            title: format!("{} - {}", time, venue),
            time,
            hour_key: None,
            venue,
            performers,
        })
    }

    fn parse_performers(&self, block: ElementRef<'_>, lineup_id: &str) -> Vec<Performer> {
        block
            .select(&PERFORMER_ENTRY)
            .filter(|entry| entry.id() != block.id())
            .enumerate()
            .filter_map(|(order, entry)| match parse_performer(entry, order, lineup_id) {
                Ok(performer) => Some(performer),
                Err(skip) => {
                    warn!("Skipping performer: {}", skip);
                    None
                }
            })
            .collect()
    }
}

fn parse_performer(entry: ElementRef<'_>, order: usize, lineup_id: &str) -> Result<Performer, ParseSkip> {
    let missing = || ParseSkip::MissingName {
        lineup_id: lineup_id.to_string(),
        order,
    };
    let name_element = entry.select(&PERFORMER_NAME).next().ok_or_else(missing)?;
    let name = element_text(name_element);
    if name.is_empty() {
        return Err(missing());
    }

    let description = name_element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "p")
        .map(|paragraph| element_text(paragraph).replacen(&name, "", 1).trim().to_string())
        .unwrap_or_default();

    Ok(Performer {
        external_id: None,
        description,
        website: first_attr(entry, &LINK, "href"),
        thumb_url: first_attr(entry, &IMAGE, "src"),
        order,
        name,
    })
}

/// Correlation ids are numeric on the live site; anything else hashes.
pub fn show_id(correlation: Option<&str>, date: NaiveDate, time: &str, venue: &str) -> u64 {
    correlation
        .filter(|id| id.chars().all(|c| c.is_ascii_digit()))
        .and_then(|id| id.parse::<u64>().ok())
        .unwrap_or_else(|| fallback_show_id(date, time, venue))
}

fn fallback_show_id(date: NaiveDate, time: &str, venue: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}_{}", date.format("%Y-%m-%d"), time, venue).as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Text nodes trimmed and joined by single spaces.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().map(element_text)
}

fn first_attr(scope: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    scope
        .select(selector)
        .filter_map(|element| element.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
