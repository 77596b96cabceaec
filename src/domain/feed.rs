use chrono::{DateTime, FixedOffset, Utc};
use url::Url;

use crate::domain::CachedDocument;

/// Which configured URL and index pattern discovered an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntrySource {
    pub url_index: usize,
    pub pattern_index: usize,
}

#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    /// Absolute link; `None` when the captured reference could not be resolved.
    pub link: Option<Url>,
    pub publish_date: Option<DateTime<FixedOffset>>,
    pub content: String,
    pub source: EntrySource,
    /// The content page, once fetched.
    pub document: Option<CachedDocument>,
}

impl FeedEntry {
    pub fn new(title: String, link: Option<Url>, source: EntrySource) -> Self {
        Self {
            title,
            link,
            publish_date: None,
            content: String::new(),
            source,
            document: None,
        }
    }

    pub fn link_str(&self) -> &str {
        self.link.as_ref().map(Url::as_str).unwrap_or("")
    }

    /// Fill a missing publish date from the content page validators, then the clock.
    pub fn resolve_publish_date(&mut self, now: DateTime<Utc>) {
        if self.publish_date.is_some() {
            return;
        }
        let fallback = self
            .document
            .as_ref()
            .map(|doc| doc.last_modified.unwrap_or(doc.fetch_date))
            .unwrap_or(now);
        self.publish_date = Some(fallback.fixed_offset());
    }
}

#[derive(Debug, Clone)]
pub struct Feed {
    pub title: String,
    pub description: String,
    /// First index URL of the target.
    pub url: Url,
    /// Latest fetch date across the index pages.
    pub last_modified: DateTime<Utc>,
    pub entries: Vec<FeedEntry>,
}

impl Feed {
    pub fn new(title: String, description: String, url: Url) -> Self {
        Self {
            title,
            description,
            url,
            last_modified: Utc::now(),
            entries: Vec::new(),
        }
    }

    /// Drop entries whose link repeats an earlier one, keeping the first.
    pub fn dedup_entries(&mut self) {
        let mut seen = std::collections::HashSet::new();
        let entries = std::mem::take(&mut self.entries);
        self.entries = entries
            .into_iter()
            .filter(|entry| match &entry.link {
                Some(link) => seen.insert(link.as_str().to_string()),
                None => true,
            })
            .collect();
    }

    /// Newest first; entries with equal dates keep their discovery order.
    pub fn sort_entries(&mut self) {
        self.entries
            .sort_by(|a, b| b.publish_date.cmp(&a.publish_date));
    }
}
