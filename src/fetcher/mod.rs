pub mod cache;
pub mod http_fetcher;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::CachedDocument;

pub use cache::CacheFetcher;
pub use http_fetcher::HttpFetcher;

/// Conditional request headers taken from a stale cache entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditions {
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_none_match: Option<String>,
    pub cache_control: Option<String>,
}

impl Conditions {
    pub fn from_document(doc: &CachedDocument) -> Self {
        Self {
            if_modified_since: doc.last_modified,
            if_none_match: doc.etag.clone().filter(|s| !s.is_empty()),
            cache_control: doc.cache_control.clone().filter(|s| !s.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.if_modified_since.is_none()
            && self.if_none_match.is_none()
            && self.cache_control.is_none()
    }
}

/// Cache-related response headers. A missing or unparseable header is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    pub date: Option<DateTime<Utc>>,
    pub cache_control: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub expires: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub enum FetchResult {
    /// A 2xx response with its full body
    Content {
        body: Vec<u8>,
        headers: ResponseHeaders,
    },
    /// Content not modified (HTTP 304)
    NotModified { headers: ResponseHeaders },
}

/// One HTTP GET, optionally conditional. Status codes other than 2xx and 304
/// are errors.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str, conditions: &Conditions) -> Result<FetchResult>;
}

/// Parse an HTTP-date (`Mon, 01 Jan 2024 00:00:00 GMT`).
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

pub fn format_http_date(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
