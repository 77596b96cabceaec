//! Turns index and content pages into feed entries.
//!
//! # Architecture
//!
//! ```text
//! index URLs ─▶ CacheFetcher ─▶ clean ─▶ [index filter] ─▶ index pattern (all matches)
//!                                                              │
//!                                                   dedup by link
//!                                                              │
//! entry links ─▶ CacheFetcher ─▶ clean ─▶ [content filter] ─▶ content pattern (first match)
//!                                                              │
//!                                                 publish dates ─▶ sort, newest first
//! ```
//!
//! Failures are per URL or per entry: a page that cannot be fetched or
//! matched is logged and skipped, and the rest of the target carries on.

pub mod html;
pub mod parallel;
pub mod pubdate;

pub use parallel::{RunSummary, TargetRunner};

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use html_escape::decode_html_entities;
use regex::Captures;
use tracing::{debug, error, warn};
use url::Url;

use crate::app::{PagefeedError, Result, RunOptions};
use crate::domain::{EntrySource, Feed, FeedEntry, Target};
use crate::fetcher::CacheFetcher;
use crate::pattern::CompiledPattern;

pub struct Scraper {
    engine: Arc<CacheFetcher>,
    options: RunOptions,
}

/// What a content page contributed to its entry.
struct ContentMatch {
    content: String,
    publish_date: Option<DateTime<FixedOffset>>,
}

impl Scraper {
    pub fn new(engine: Arc<CacheFetcher>, options: RunOptions) -> Self {
        Self { engine, options }
    }

    /// Build the feed for one target: index pages, then content pages.
    pub async fn scrape(&self, target: &Target) -> Result<Feed> {
        let mut feed = self.parse_index(target).await?;
        self.parse_content(target, &mut feed).await;
        Ok(feed)
    }

    /// Collect entries from every index URL of `target`.
    ///
    /// Fails only when none of the index pages could be fetched.
    pub async fn parse_index(&self, target: &Target) -> Result<Feed> {
        let name = target.name();
        let first_url = target
            .urls
            .first()
            .ok_or_else(|| PagefeedError::Extraction(format!("target {} has no URLs", name)))?;

        let mut feed = Feed::new(
            target.title.clone(),
            target.description.clone(),
            first_url.clone(),
        );
        let mut latest_fetch: Option<DateTime<Utc>> = None;

        for (url_index, url) in target.urls.iter().enumerate() {
            let doc = match self.engine.fetch(url, target.lifetime).await {
                Ok(doc) => doc,
                Err(e) => {
                    error!(feed = %name, url = %url, "Failed to fetch index page: {}", e);
                    continue;
                }
            };
            latest_fetch = latest_fetch.max(Some(doc.fetch_date));

            let body = html::clean(&doc.body_text());
            let pattern_index = target.index_pattern_index(url_index);
            let Some(pattern) = target.index_pattern(url_index) else {
                continue;
            };

            let Some(haystack) = self.apply_filter(target.index_filter(pattern_index), &body, url)
            else {
                continue;
            };

            let source = EntrySource {
                url_index,
                pattern_index,
            };
            let entries = self.match_index(target, url, pattern, &haystack, source);

            if entries.is_empty() {
                warn!(feed = %name, url = %url, "Index pattern {} matched nothing", pattern);
                if let Some(snippet) = self.options.snippet(&haystack) {
                    debug!("{}", snippet);
                }
            } else {
                debug!(feed = %name, url = %url, "Found {} entries", entries.len());
            }

            feed.entries.extend(entries);
        }

        let Some(latest_fetch) = latest_fetch else {
            return Err(PagefeedError::Extraction(format!(
                "no index page of {} could be fetched",
                name
            )));
        };
        feed.last_modified = latest_fetch;

        let before = feed.entries.len();
        feed.dedup_entries();
        if feed.entries.len() < before {
            debug!(feed = %name, "Dropped {} duplicate entries", before - feed.entries.len());
        }

        Ok(feed)
    }

    /// Fetch every entry's link and fill in its content.
    ///
    /// Entries without a usable link, or whose page cannot be fetched or
    /// matched, are removed. The survivors end up sorted newest first.
    pub async fn parse_content(&self, target: &Target, feed: &mut Feed) {
        let name = target.name();
        let now = Utc::now();
        let entries = std::mem::take(&mut feed.entries);
        let mut kept = Vec::with_capacity(entries.len());

        for mut entry in entries {
            let Some(link) = entry.link.clone() else {
                warn!(feed = %name, "Dropping {:?}: link could not be resolved", entry.title);
                continue;
            };

            if !target.request_interval.is_zero() {
                tokio::time::sleep(target.request_interval).await;
            }

            let doc = match self.engine.fetch(&link, target.lifetime).await {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(feed = %name, url = %link, "Dropping entry, fetch failed: {}", e);
                    continue;
                }
            };

            let body = html::clean(&doc.body_text());
            let Some(matched) = self.match_content(target, &entry, &link, &body) else {
                continue;
            };

            if matched.content.trim().is_empty() {
                warn!(feed = %name, url = %link, "Extracted empty content");
            }
            entry.content = matched.content;
            if entry.publish_date.is_none() {
                entry.publish_date = matched.publish_date;
            }
            entry.document = Some(doc);
            entry.resolve_publish_date(now);
            kept.push(entry);
        }

        feed.entries = kept;
        feed.sort_entries();
    }

    /// Narrow `body` to its filter captures. `None` when the filter matches
    /// nothing; the body itself when there is no filter.
    fn apply_filter<'a>(
        &self,
        filter: Option<&CompiledPattern>,
        body: &'a str,
        url: &Url,
    ) -> Option<Cow<'a, str>> {
        let Some(filter) = filter else {
            return Some(Cow::Borrowed(body));
        };

        match filter.filter(body) {
            Some(filtered) => Some(Cow::Owned(filtered)),
            None => {
                warn!(url = %url, "Filter pattern {} matched nothing", filter);
                if let Some(snippet) = self.options.snippet(body) {
                    debug!("{}", snippet);
                }
                None
            }
        }
    }

    fn match_index(
        &self,
        target: &Target,
        page_url: &Url,
        pattern: &CompiledPattern,
        body: &str,
        source: EntrySource,
    ) -> Vec<FeedEntry> {
        pattern
            .regex()
            .captures_iter(body)
            .map(|caps| {
                let title = caps
                    .name("title")
                    .map(|m| decode_html_entities(m.as_str()).trim().to_string())
                    .unwrap_or_default();
                let link = caps
                    .name("link")
                    .and_then(|m| resolve_link(page_url, m.as_str()));

                let mut entry = FeedEntry::new(title, link, source);
                entry.publish_date = self.publish_date(target, source.url_index, &caps);
                entry
            })
            .collect()
    }

    fn match_content(
        &self,
        target: &Target,
        entry: &FeedEntry,
        link: &Url,
        body: &str,
    ) -> Option<ContentMatch> {
        let url_index = entry.source.url_index;
        let pattern = target.content_pattern(url_index)?;
        let haystack = self.apply_filter(target.content_filter(url_index), body, link)?;

        let Some(caps) = pattern.regex().captures(&haystack) else {
            warn!(url = %link, "Content pattern {} matched nothing, dropping entry", pattern);
            if let Some(snippet) = self.options.snippet(&haystack) {
                debug!("{}", snippet);
            }
            return None;
        };

        Some(ContentMatch {
            content: caps
                .name("description")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            publish_date: self.publish_date(target, url_index, &caps),
        })
    }

    fn publish_date(
        &self,
        target: &Target,
        url_index: usize,
        caps: &Captures<'_>,
    ) -> Option<DateTime<FixedOffset>> {
        let raw = caps.name("pubdate")?.as_str();
        let parsed = pubdate::parse(
            raw,
            target.pubdate_format(url_index),
            &self.options.default_timezone,
        );
        if parsed.is_none() {
            warn!("Could not parse publish date {:?}", raw);
        }
        parsed
    }
}

/// Resolve a captured href against the page it was found on.
fn resolve_link(base: &Url, raw: &str) -> Option<Url> {
    let raw = decode_html_entities(raw.trim());
    match base.join(&raw) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(url = %base, "Cannot resolve link {:?}: {}", raw, e);
            None
        }
    }
}
