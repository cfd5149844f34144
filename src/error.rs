use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("decode failure: {message}")]
    Decode { message: String },

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ScraperError {
    pub fn decode(message: impl Into<String>) -> Self {
        ScraperError::Decode { message: message.into() }
    }

    /// Transport, timeout, or non-success status.
    pub fn is_network(&self) -> bool {
        matches!(self, ScraperError::Network(_))
    }

    /// Body was not JSON or did not fit the expected schema.
    pub fn is_decode(&self) -> bool {
        matches!(self, ScraperError::Decode { .. } | ScraperError::Json(_))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, ScraperError::Config(_) | ScraperError::Toml(_))
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
