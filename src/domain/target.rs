use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::app::Result;
use crate::config::{HardLifetime, TargetConfig};
use crate::pattern::{self, CompiledPattern};

/// A validated, compiled target. Immutable for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct Target {
    pub title: String,
    pub description: String,
    pub urls: Vec<Url>,
    pub index_patterns: Vec<CompiledPattern>,
    pub content_patterns: Vec<CompiledPattern>,
    /// Paired with `index_patterns`; `None` where the filter is blank.
    pub index_filters: Vec<Option<CompiledPattern>>,
    pub content_filters: Vec<Option<CompiledPattern>>,
    pub pubdate_formats: Vec<String>,
    pub request_interval: Duration,
    pub lifetime: HardLifetime,
    pub feed_path: PathBuf,
}

/// Item for URL `i` of a broadcast (len 1) or paired (len N) list.
fn select<T>(items: &[T], url_index: usize) -> Option<&T> {
    match items.len() {
        1 => items.first(),
        _ => items.get(url_index),
    }
}

fn compile_filters(templates: &[String]) -> Result<Vec<Option<CompiledPattern>>> {
    templates
        .iter()
        .map(|t| {
            if t.trim().is_empty() {
                Ok(None)
            } else {
                CompiledPattern::new(t).map(Some)
            }
        })
        .collect()
}

/// Give scheme-less URLs an `http://` prefix before parsing.
pub fn normalize_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.contains("://") {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("http://{}", raw))?)
    }
}

impl Target {
    pub fn from_config(config: &TargetConfig, lifetime: HardLifetime) -> Result<Self> {
        pattern::validate(&config.pattern_set())?;

        let urls = config
            .urls
            .iter()
            .map(|u| normalize_url(u))
            .collect::<Result<Vec<_>>>()?;

        let index_patterns = config
            .index_patterns
            .iter()
            .map(|p| CompiledPattern::new(p))
            .collect::<Result<Vec<_>>>()?;
        let content_patterns = config
            .content_patterns
            .iter()
            .map(|p| CompiledPattern::new(p))
            .collect::<Result<Vec<_>>>()?;

        let title = if config.title.is_empty() {
            default_title(&config.feed_path)
        } else {
            config.title.clone()
        };

        Ok(Self {
            title,
            description: config.description.clone(),
            urls,
            index_patterns,
            content_patterns,
            index_filters: compile_filters(&config.index_filter_patterns)?,
            content_filters: compile_filters(&config.content_filter_patterns)?,
            pubdate_formats: config.pubdate_formats.clone(),
            request_interval: config.request_interval(),
            lifetime,
            feed_path: config.feed_path.clone(),
        })
    }

    pub fn index_pattern_index(&self, url_index: usize) -> usize {
        if self.index_patterns.len() == 1 {
            0
        } else {
            url_index
        }
    }

    pub fn index_pattern(&self, url_index: usize) -> Option<&CompiledPattern> {
        select(&self.index_patterns, url_index)
    }

    pub fn index_filter(&self, pattern_index: usize) -> Option<&CompiledPattern> {
        self.index_filters.get(pattern_index).and_then(Option::as_ref)
    }

    pub fn content_pattern(&self, url_index: usize) -> Option<&CompiledPattern> {
        select(&self.content_patterns, url_index)
    }

    pub fn content_filter(&self, url_index: usize) -> Option<&CompiledPattern> {
        let pattern_index = if self.content_patterns.len() == 1 {
            0
        } else {
            url_index
        };
        self.content_filters.get(pattern_index).and_then(Option::as_ref)
    }

    pub fn pubdate_format(&self, url_index: usize) -> Option<&str> {
        select(&self.pubdate_formats, url_index).map(String::as_str)
    }

    /// Name used in log lines.
    pub fn name(&self) -> String {
        self.feed_path.display().to_string()
    }
}

fn default_title(feed_path: &Path) -> String {
    feed_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
