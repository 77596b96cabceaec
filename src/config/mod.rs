//! Configuration file loading.
//!
//! Targets are read from a TOML file, or from JSON when the file name ends in
//! `.json`. Keys from the older `Feed.URL`-style JSON layout are accepted as
//! aliases:
//!
//! ```toml
//! cache_lifetime = "2d"
//!
//! [[targets]]
//! title = "Example blog"
//! urls = ["https://blog.example.com/"]
//! index_patterns = ['<h2><a href="{link}">{title}</a></h2>']
//! content_patterns = ['<div class="post">{description}</div>']
//! feed_path = "feeds/example.xml"
//! request_interval_secs = 1
//! ```

mod lifetime;

pub use lifetime::HardLifetime;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Offset};
use serde::{Deserialize, Serialize};

use crate::domain::Target;
use crate::pattern::PatternSet;

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file holding the page cache.
    #[serde(alias = "CacheDB")]
    pub cache_db: Option<PathBuf>,

    /// Hard lifetime shared by all targets, `""` keeps pages forever.
    #[serde(alias = "CacheLifetime")]
    pub cache_lifetime: String,

    /// Per-request timeout in milliseconds.
    #[serde(alias = "HttpTimeout")]
    pub http_timeout_ms: Option<u64>,

    /// UTC offset for publish dates without one, e.g. `"+08:00"`.
    pub default_timezone: Option<String>,

    #[serde(alias = "Targets")]
    pub targets: Vec<TargetConfig>,
}

/// One feed to generate, as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    #[serde(alias = "Feed.Title")]
    pub title: String,

    #[serde(alias = "Feed.Description")]
    pub description: String,

    #[serde(alias = "Feed.URL")]
    pub urls: Vec<String>,

    #[serde(alias = "Feed.IndexPattern")]
    pub index_patterns: Vec<String>,

    #[serde(alias = "Feed.ContentPattern")]
    pub content_patterns: Vec<String>,

    #[serde(alias = "Feed.IndexFilterPattern")]
    pub index_filter_patterns: Vec<String>,

    #[serde(alias = "Feed.ContentFilterPattern")]
    pub content_filter_patterns: Vec<String>,

    #[serde(alias = "Feed.PubDateFormat")]
    pub pubdate_formats: Vec<String>,

    #[serde(alias = "Feed.Path")]
    pub feed_path: PathBuf,

    /// Delay before each content page request, in seconds.
    #[serde(alias = "Request.Interval")]
    pub request_interval_secs: u64,

    /// Overrides the global hard lifetime for this target.
    pub cache_lifetime: Option<String>,
}

impl TargetConfig {
    pub fn pattern_set(&self) -> PatternSet<'_> {
        PatternSet {
            url_count: self.urls.len(),
            index: &self.index_patterns,
            content: &self.content_patterns,
            index_filters: &self.index_filter_patterns,
            content_filters: &self.content_filter_patterns,
            pubdate_formats: &self.pubdate_formats,
        }
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.request_interval_secs)
    }
}

impl Config {
    /// Load and parse the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config: Config = if is_json {
            serde_json::from_str(&content).map_err(|e| ConfigError::Json {
                path: path.to_path_buf(),
                source: e,
            })?
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?
        };

        if config.targets.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "no targets in config file {}",
                path.display()
            )));
        }

        Ok(config)
    }

    pub fn hard_lifetime(&self) -> Result<HardLifetime, ConfigError> {
        self.cache_lifetime.parse()
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_ms.map(Duration::from_millis)
    }

    pub fn timezone(&self) -> Result<Option<FixedOffset>, ConfigError> {
        self.default_timezone
            .as_deref()
            .map(parse_offset)
            .transpose()
    }

    /// Validate and compile every target. Any error aborts the whole run.
    pub fn build_targets(&self) -> Result<Vec<Target>, ConfigError> {
        let global_lifetime = self.hard_lifetime()?;

        self.targets
            .iter()
            .enumerate()
            .map(|(i, tar)| {
                let lifetime = match &tar.cache_lifetime {
                    Some(lifetime) => lifetime.parse()?,
                    None => global_lifetime,
                };
                prepare_feed_path(&tar.feed_path)?;
                Target::from_config(tar, lifetime).map_err(|e| {
                    ConfigError::Invalid(format!(
                        "target #{} ({}): {}",
                        i + 1,
                        tar.feed_path.display(),
                        e
                    ))
                })
            })
            .collect()
    }
}

/// Parse `"+08:00"`, `"-0500"`, `"Z"` or `"UTC"`.
fn parse_offset(s: &str) -> Result<FixedOffset, ConfigError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("utc") || s == "Z" {
        return Ok(chrono::Utc.fix());
    }
    s.parse::<FixedOffset>()
        .map_err(|e| ConfigError::Invalid(format!("invalid timezone offset {:?}: {}", s, e)))
}

/// The feed path must not be a directory; its parent is created if missing.
fn prepare_feed_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("target has no feed path".into()));
    }
    if path.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "feed path {} is a directory",
            path.display()
        )));
    }
    if path.exists() {
        tracing::debug!("Feed {} already exists, will overwrite it", path.display());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if parent.exists() && !parent.is_dir() {
            return Err(ConfigError::Invalid(format!(
                "parent of feed path {} is a file",
                path.display()
            )));
        }
        if !parent.exists() {
            tracing::info!("Creating directory {} for feed {}", parent.display(), path.display());
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid cache lifetime {0}")]
    Lifetime(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
