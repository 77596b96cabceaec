use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::config::HardLifetime;

/// Outcome of the last cache decision for a document. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStatus {
    /// Served from the store without touching the network, or revalidated with a 304.
    #[default]
    NotModified,
    /// No previous row existed for the URL.
    New,
    /// A previous row existed and the server sent a new body.
    Modified,
    /// A previous row exists but is past its freshness window.
    Expired,
}

/// A cached HTTP response, one per URL.
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub url: String,
    /// Time of the last completed exchange (server `Date`, falling back to the local clock).
    pub fetch_date: DateTime<Utc>,
    pub cache_control: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub body: Vec<u8>,
    pub status: CacheStatus,
}

impl CachedDocument {
    pub fn new(url: String) -> Self {
        Self {
            url,
            fetch_date: Utc::now(),
            cache_control: None,
            last_modified: None,
            etag: None,
            expires: None,
            body: Vec::new(),
            status: CacheStatus::New,
        }
    }

    /// `max-age` from the stored Cache-Control value, zero when absent or unparseable.
    pub fn max_age(&self) -> Duration {
        self.cache_control
            .as_deref()
            .and_then(parse_max_age)
            .unwrap_or(Duration::ZERO)
    }

    /// End of the freshness window: the later of `fetch_date + max-age` and `Expires`.
    pub fn fresh_until(&self) -> DateTime<Utc> {
        let by_max_age = chrono::Duration::from_std(self.max_age())
            .ok()
            .and_then(|age| self.fetch_date.checked_add_signed(age))
            .unwrap_or(self.fetch_date);

        match self.expires {
            Some(expires) if expires > by_max_age => expires,
            _ => by_max_age,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.fresh_until()
    }

    /// True once the locally configured hard lifetime has run out.
    pub fn is_dead(&self, now: DateTime<Utc>, lifetime: HardLifetime) -> bool {
        match lifetime.as_duration() {
            Some(limit) => {
                let age = now.signed_duration_since(self.fetch_date);
                age.to_std().map(|age| age > limit).unwrap_or(false)
            }
            None => false,
        }
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Contents of the page's `<title>` element, if any.
    pub fn html_title(&self) -> Option<String> {
        static TITLE: OnceLock<Regex> = OnceLock::new();
        let re = TITLE.get_or_init(|| {
            Regex::new(r"(?is)<\s*title[^>]*>(?P<title>.+?)</\s*title")
                .expect("static title regex is valid")
        });

        let body = self.body_text();
        re.captures(&body)
            .and_then(|caps| caps.name("title"))
            .map(|m| m.as_str().trim().to_string())
            .filter(|title| !title.is_empty())
    }
}

/// Extract `max-age=N` from a Cache-Control header value.
pub fn parse_max_age(cache_control: &str) -> Option<Duration> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("max-age") {
            return None;
        }
        value
            .trim()
            .trim_matches('"')
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    })
}
