//! Follower counts from search results and profile pages.
//!
//! Counts are whole numbers after the suffix multiplier is applied; any
//! fractional remainder is truncated. Zero means no count was found.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::apis::search::SearchItem;
use crate::types::CountSource;

/// `og:description` on profile results reads like "2M Followers, 1,038 Following, 757 Posts".
static STRUCTURED_FOLLOWERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*([km]?)\s*followers").expect("valid followers pattern")
});

struct TextPattern {
    regex: Regex,
    /// Capture 2 holds a k/m/b suffix.
    suffixed: bool,
}

impl TextPattern {
    fn new(pattern: &str, suffixed: bool) -> Self {
        Self {
            regex: Regex::new(pattern).expect("valid free-text pattern"),
            suffixed,
        }
    }

    fn count(&self, caps: &Captures<'_>) -> u64 {
        let unit = if self.suffixed {
            caps.get(2).map_or("", |m| m.as_str())
        } else {
            ""
        };
        scale(&caps[1], multiplier(unit))
    }
}

// Applied in order to lowercased title + snippet.
static TEXT_PATTERNS: Lazy<Vec<TextPattern>> = Lazy::new(|| {
    vec![
        TextPattern::new(r"(\d+(?:\.\d+)?)\s*([kmb])\s*followers", true),
        TextPattern::new(r"\b(\d{1,3}(?:,\d{3})+|\d+)\s*followers", false),
        TextPattern::new(r"followers[\s:]*(\d+(?:\.\d+)?)\s*([kmb])", true),
        TextPattern::new(r"(\d+(?:\.\d+)?)\s*([kmb])\s*instagram\s*followers", true),
        TextPattern::new(r"(\d+(?:\.\d+)?)\s*([kmb])\s*(?:instagram\s*)?(?:followers|following)", true),
        TextPattern::new(r"\b(\d{1,3}(?:,\d{3})+|\d+)\s*(?:instagram\s*)?followers", false),
    ]
});

// Profile page markup, most to least specific.
static PAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#""edge_followed_by":\{"count":(\d+)\}"#,
        r#""follower_count":(\d+)"#,
        r#"(?i)content="(\d+(?:,\d+)*)\s*Followers"#,
        r"(?i)(\d+(?:\.\d+)?[kmb]?)\s*followers",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid page pattern"))
    .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountExtraction {
    pub count: u64,
    pub source: CountSource,
}

impl CountExtraction {
    fn none() -> Self {
        Self {
            count: 0,
            source: CountSource::None,
        }
    }
}

/// Structured metadata first, then the free-text patterns.
pub fn extract_count(item: &SearchItem) -> CountExtraction {
    let structured = extract_structured_count(item);
    if structured > 0 {
        return CountExtraction {
            count: structured,
            source: CountSource::StructuredMetadata,
        };
    }

    let text = extract_text_count(&item.text());
    if text > 0 {
        return CountExtraction {
            count: text,
            source: CountSource::FreeText,
        };
    }

    CountExtraction::none()
}

pub fn extract_structured_count(item: &SearchItem) -> u64 {
    let Some(description) = item.og_description() else {
        return 0;
    };
    STRUCTURED_FOLLOWERS
        .captures(description)
        .map(|caps| {
            let unit = caps.get(2).map_or("", |m| m.as_str());
            scale(&caps[1], multiplier(unit))
        })
        .unwrap_or(0)
}

/// The first pattern with any match decides; its first match is the count.
pub fn extract_text_count(text: &str) -> u64 {
    let lower = text.to_lowercase();
    for pattern in TEXT_PATTERNS.iter() {
        if let Some(caps) = pattern.regex.captures(&lower) {
            return pattern.count(&caps);
        }
    }
    0
}

/// Scans profile page HTML. Returns the count and the raw matched text.
pub fn extract_page_count(html: &str) -> Option<(u64, String)> {
    PAGE_PATTERNS.iter().find_map(|regex| {
        let raw = regex.captures(html)?.get(1)?.as_str().to_string();
        let count = parse_count_text(&raw);
        (count > 0).then_some((count, raw))
    })
}

/// Parses "1,234", "5.2k", "3M" and similar.
pub fn parse_count_text(text: &str) -> u64 {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect::<String>()
        .to_lowercase();

    match cleaned.char_indices().last() {
        Some((idx, unit @ ('k' | 'm' | 'b'))) => {
            scale(&cleaned[..idx], multiplier(&unit.to_string()))
        }
        Some(_) => scale(&cleaned, 1),
        None => 0,
    }
}

/// "1.2M", "50.0K", or the plain number below one thousand.
pub fn format_count(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

fn multiplier(unit: &str) -> u64 {
    match unit.to_ascii_lowercase().as_str() {
        "k" => 1_000,
        "m" => 1_000_000,
        "b" => 1_000_000_000,
        _ => 1,
    }
}

/// `number * multiplier` in exact decimal arithmetic, truncated.
fn scale(number: &str, multiplier: u64) -> u64 {
    let digits: String = number.chars().filter(|c| *c != ',').collect();
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));

    let Ok(whole) = whole.parse::<u128>() else {
        return 0;
    };
    let multiplier = u128::from(multiplier);
    let mut value = whole.saturating_mul(multiplier);

    let fraction = fraction.get(..18).unwrap_or(fraction);
    if !fraction.is_empty() {
        if let Ok(numerator) = fraction.parse::<u128>() {
            let denominator = 10u128.pow(fraction.len() as u32);
            value = value.saturating_add(numerator * multiplier / denominator);
        }
    }

    u64::try_from(value).unwrap_or(u64::MAX)
}
