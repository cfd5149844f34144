use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION};
use std::time::Duration;

use crate::constants::BROWSER_USER_AGENT;
use crate::error::Result;

/// Client for the lineup endpoint. It only answers requests that look like
/// the site's own XHR calls.
pub fn lineup_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = browser_headers();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
    );
    headers.insert("x-requested-with", HeaderValue::from_static("XMLHttpRequest"));
    build(headers, timeout)
}

pub fn search_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    build(headers, timeout)
}

pub fn page_client(timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = browser_headers();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    build(headers, timeout)
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
}

fn build(headers: HeaderMap, timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}
