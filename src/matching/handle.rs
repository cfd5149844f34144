use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{NON_PROFILE_SEGMENTS, PROFILE_DOMAIN, PROFILE_URL_PREFIX};

static HANDLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"instagram\.com/([A-Za-z0-9_.]+)").expect("valid handle pattern"));

pub fn is_profile_domain(link: &str) -> bool {
    link.contains(PROFILE_DOMAIN)
}

/// First path segment after the domain, with query and fragment removed.
/// Post, reel and other non-profile paths yield `None`.
pub fn extract_handle(url: &str) -> Option<String> {
    let base = url.split(|c| c == '?' || c == '#').next().unwrap_or(url);
    let handle = HANDLE.captures(base)?.get(1)?.as_str();

    if NON_PROFILE_SEGMENTS.contains(&handle) {
        None
    } else {
        Some(handle.to_string())
    }
}

pub fn canonical_profile_url(handle: &str) -> String {
    format!("{}{}/", PROFILE_URL_PREFIX, handle)
}
