use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants;
use crate::error::{Result, ScraperError};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lineup: LineupConfig,
    pub search: SearchConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LineupConfig {
    pub base_url: String,
    pub venue: String,
    pub request_type: String,
    pub timeout_secs: u64,
    /// Sleep after every lineup request.
    pub delay_ms: u64,
    /// Take a longer break every `batch_size` requests; 0 disables it.
    pub batch_size: u64,
    pub batch_pause_secs: u64,
}

impl Default for LineupConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_LINEUP_URL.to_string(),
            venue: constants::DEFAULT_VENUE.to_string(),
            request_type: constants::DEFAULT_REQUEST_TYPE.to_string(),
            timeout_secs: 30,
            delay_ms: 1000,
            batch_size: 50,
            batch_pause_secs: 5,
        }
    }
}

impl LineupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub results_per_query: u32,
    pub timeout_secs: u64,
    /// Sleep after every search call.
    pub delay_ms: u64,
    /// Take a longer break every `names_per_pause` names; 0 disables it.
    pub names_per_pause: u64,
    pub name_pause_secs: u64,
    /// Unresolved names stop being searched once they reach this many attempts.
    /// 0, the default, searches them again on every pass.
    pub max_attempts: u32,
    /// Query templates; `{name}` is replaced with the performer name.
    pub query_templates: Vec<String>,
    pub fetch_profile_pages: bool,
    pub profile_page_delay_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_SEARCH_URL.to_string(),
            results_per_query: constants::MAX_RESULTS_PER_QUERY,
            timeout_secs: 30,
            delay_ms: 1000,
            names_per_pause: 10,
            name_pause_secs: 5,
            max_attempts: 0,
            query_templates: constants::DEFAULT_QUERY_TEMPLATES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            fetch_profile_pages: false,
            profile_page_delay_ms: 2000,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
    pub output_dir: PathBuf,
    pub enriched_dir: PathBuf,
    /// Re-export collected shows every N dates; 0 only writes at the end.
    pub checkpoint_every: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(constants::DEFAULT_DATABASE_PATH),
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            enriched_dir: PathBuf::from(constants::DEFAULT_ENRICHED_DIR),
            checkpoint_every: 100,
        }
    }
}

impl Config {
    /// Loads `config.toml` (or the file named by `LINEUP_CONFIG`).
    /// A missing default file yields the built-in defaults.
    pub fn load() -> Result<Self> {
        match std::env::var(constants::CONFIG_PATH_ENV) {
            Ok(path) => Self::load_from(Path::new(&path)),
            Err(_) => {
                let path = Path::new(constants::DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    debug!("No {} found, using defaults", constants::DEFAULT_CONFIG_PATH);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads an explicitly named config file; it must exist.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }
}

/// Google Custom Search credentials.
#[derive(Clone)]
pub struct SearchCredentials {
    pub api_key: String,
    pub cse_id: String,
}

impl std::fmt::Debug for SearchCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCredentials")
            .field("api_key", &"<redacted>")
            .field("cse_id", &self.cse_id)
            .finish()
    }
}

impl SearchCredentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    ScraperError::Config(format!(
                        "{} must be set in the environment or a .env file",
                        key
                    ))
                })
        };

        Ok(Self {
            api_key: required(constants::GOOGLE_API_KEY_ENV)?,
            cse_id: required(constants::GOOGLE_CSE_ID_ENV)?,
        })
    }
}
