use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum PagefeedError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache entry already exists: {0}")]
    DuplicateUrl(String),

    #[error("Cache entry not found: {0}")]
    CacheEntryNotFound(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("Pattern error: {0}")]
    Pattern(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("RSS serialization error: {0}")]
    Xml(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(String),
}

impl PagefeedError {
    /// Transport-level failures, i.e. the ones a stale cache entry may paper over.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::HttpStatus { .. })
    }
}

pub type Result<T> = std::result::Result<T, PagefeedError>;
