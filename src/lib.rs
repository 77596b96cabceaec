//! # pagefeed
//!
//! Generates RSS 2.0 feeds for web sites that do not publish one, by
//! matching their HTML against regex templates.
//!
//! ## Architecture
//!
//! ```text
//! Config → Target → Scraper ─┬─ CacheFetcher ─┬─ Fetcher (HTTP)
//!                            │                └─ CacheStore (SQLite)
//!                            └─ Emitter → feed file
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Generate every feed in the config file
//! pagefeed feeds.toml
//!
//! # Verbose, serving cached pages when a site is down
//! pagefeed -v -a feeds.toml
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Run options, context and error types
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: Config file and hard-lifetime parsing
//! - [`domain`]: Cached pages, targets, feeds and entries
//! - [`emitter`]: RSS 2.0 serialization
//! - [`fetcher`]: HTTP fetching with conditional requests and caching
//! - [`pattern`]: Placeholder templates and their validation
//! - [`scraper`]: Index and content extraction, target runner
//! - [`store`]: SQLite page cache

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// conditional fetcher, scraper and target runner.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration file loading (TOML or JSON).
///
/// Also parses hard cache lifetimes such as `"2d5h"`.
pub mod config;

/// Core domain models.
///
/// - [`CachedDocument`](domain::CachedDocument): A cached page with its HTTP validators
/// - [`Target`](domain::Target): A compiled feed definition
/// - [`Feed`](domain::Feed) / [`FeedEntry`](domain::FeedEntry): Extraction output
pub mod domain;

/// RSS 2.0 output via quick-xml.
pub mod emitter;

/// HTTP fetching with conditional request support.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for a single HTTP GET
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
/// - [`CacheFetcher`](fetcher::CacheFetcher): Freshness, revalidation and cache writes
pub mod fetcher;

/// Template placeholders (`{title}`, `{link}`, ...) compiled to regexes.
pub mod pattern;

/// Extraction pipeline.
///
/// - [`Scraper`](scraper::Scraper): Index and content page matching
/// - [`TargetRunner`](scraper::TargetRunner): Concurrent targets with semaphore
pub mod scraper;

/// SQLite persistence layer.
///
/// - [`CacheStore`](store::CacheStore): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation with gzip bodies
pub mod store;

#[cfg(test)]
mod testing;
