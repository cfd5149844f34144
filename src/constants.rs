/// Endpoint and parameter constants shared by the gateway, matcher, and exports.

// Lineup API
pub const DEFAULT_LINEUP_URL: &str = "https://www.comedycellar.com/lineup/api/";
pub const LINEUP_ACTION: &str = "cc_get_shows";
pub const DEFAULT_VENUE: &str = "newyork";
pub const DEFAULT_REQUEST_TYPE: &str = "past";

// Search API
pub const DEFAULT_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";
/// Google Custom Search caps `num` at 10.
pub const MAX_RESULTS_PER_QUERY: u32 = 10;

// Credentials and config file
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const GOOGLE_CSE_ID_ENV: &str = "GOOGLE_CSE_ID";
pub const CONFIG_PATH_ENV: &str = "LINEUP_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

// Profile resolution
pub const PROFILE_DOMAIN: &str = "instagram.com";
pub const PROFILE_URL_PREFIX: &str = "https://www.instagram.com/";
/// Path segments under the profile domain that are never user handles.
pub const NON_PROFILE_SEGMENTS: &[&str] = &["p", "reel", "tv", "explore", "accounts", "stories"];
pub const DOMAIN_KEYWORDS: &[&str] = &["comedian", "comedy", "stand-up", "standup", "comic"];
pub const VERIFIED_WORD: &str = "verified";
pub const VERIFIED_GLYPH: char = '✓';

pub const NAME_PLACEHOLDER: &str = "{name}";
pub const DEFAULT_QUERY_TEMPLATES: &[&str] = &[
    "{name} comedian instagram",
    "{name} stand up comedy instagram",
    "{name} instagram profile",
    "\"{name}\" instagram comedian",
];

// Output files
pub const DEFAULT_OUTPUT_DIR: &str = "comedy_cellar_data";
pub const DEFAULT_ENRICHED_DIR: &str = "comedian_data";
pub const DEFAULT_DATABASE_PATH: &str = "comedian_instagram_data.db";
pub const SHOWS_FILE_SUFFIX: &str = "_shows.csv";
pub const PERFORMERS_FILE_SUFFIX: &str = "_comedians.csv";
pub const SUMMARY_FILE_SUFFIX: &str = "_summary.csv";
pub const DEFAULT_NAME_COLUMN: &str = "comedian_name";
