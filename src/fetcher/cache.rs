//! Conditional fetching on top of the page cache.
//!
//! For every URL the engine decides between serving the cached copy,
//! revalidating it with `If-Modified-Since`/`If-None-Match`, or fetching it
//! from scratch:
//!
//! ```text
//! lookup ─ miss ──────────────────────────────┐
//!    │                                        ▼
//!    hit ─ dead (hard lifetime) ─ delete ─▶ GET (unconditional) ─▶ insert
//!    │
//!    ├─ fresh (max-age / Expires) ─▶ cached copy, no request
//!    │
//!    └─ stale ─▶ conditional GET ─┬─ 304 ─▶ cached body, new fetch date
//!                                 └─ 2xx ─▶ new body and validators ─▶ update
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use url::Url;

use crate::app::{PagefeedError, Result, RunOptions};
use crate::config::HardLifetime;
use crate::domain::{CacheStatus, CachedDocument};
use crate::fetcher::{Conditions, FetchResult, Fetcher};
use crate::store::CacheStore;

pub struct CacheFetcher {
    store: Arc<dyn CacheStore + Send + Sync>,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    serve_stale: bool,
}

/// New fetch date: the server's clock if it sent one, never earlier than before.
fn next_fetch_date(
    previous: Option<DateTime<Utc>>,
    server_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let candidate = server_date.unwrap_or(now);
    match previous {
        Some(prev) if prev > candidate => prev,
        _ => candidate,
    }
}

impl CacheFetcher {
    pub fn new(
        store: Arc<dyn CacheStore + Send + Sync>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        options: &RunOptions,
    ) -> Self {
        Self {
            store,
            fetcher,
            serve_stale: options.serve_stale,
        }
    }

    /// Fetch `url` through the cache. The returned document's `status` tells
    /// how it was obtained.
    pub async fn fetch(&self, url: &Url, lifetime: HardLifetime) -> Result<CachedDocument> {
        self.fetch_at(url, lifetime, Utc::now()).await
    }

    pub async fn fetch_at(
        &self,
        url: &Url,
        lifetime: HardLifetime,
        now: DateTime<Utc>,
    ) -> Result<CachedDocument> {
        let key = url.as_str();

        let previous = match self.store.get(key)? {
            Some(doc) if doc.is_dead(now, lifetime) => {
                info!("Cache for {} outlived its hard lifetime ({}), discarding it", key, lifetime);
                self.store.delete(key)?;
                None
            }
            Some(mut doc) => {
                if doc.is_fresh(now) {
                    debug!("Cache for {} is fresh until {}", key, doc.fresh_until());
                    doc.status = CacheStatus::NotModified;
                    return Ok(doc);
                }
                debug!("Cache for {} is stale, revalidating", key);
                doc.status = CacheStatus::Expired;
                Some(doc)
            }
            None => {
                debug!("Cache not found for {}", key);
                None
            }
        };

        let conditions = previous
            .as_ref()
            .map(Conditions::from_document)
            .unwrap_or_default();

        let result = match self.fetcher.fetch(key, &conditions).await {
            Ok(result) => result,
            Err(e) => {
                return match previous {
                    Some(doc) if self.serve_stale && e.is_transport() => {
                        warn!("Failed to download {}, using cached copy instead: {}", key, e);
                        Ok(doc)
                    }
                    _ => Err(e),
                };
            }
        };

        match result {
            FetchResult::NotModified { headers } => {
                let mut doc = previous.ok_or_else(|| PagefeedError::HttpStatus {
                    url: key.to_string(),
                    status: 304,
                })?;
                debug!("Cache for {} not modified", key);
                doc.fetch_date = next_fetch_date(Some(doc.fetch_date), headers.date, now);
                doc.status = CacheStatus::NotModified;
                Ok(doc)
            }
            FetchResult::Content { body, headers } => {
                let (mut doc, status) = match previous {
                    Some(doc) => (doc, CacheStatus::Modified),
                    None => (CachedDocument::new(key.to_string()), CacheStatus::New),
                };
                let previous_date = (status == CacheStatus::Modified).then_some(doc.fetch_date);

                doc.fetch_date = next_fetch_date(previous_date, headers.date, now);
                doc.cache_control = headers.cache_control;
                doc.last_modified = headers.last_modified;
                doc.etag = headers.etag;
                doc.expires = headers.expires;
                doc.body = body;
                doc.status = status;

                if doc.html_title().is_none() {
                    debug!("No <title> found in {}", key);
                }

                match status {
                    CacheStatus::New => self.store.put(std::slice::from_ref(&doc))?,
                    _ => self.store.update(std::slice::from_ref(&doc))?,
                }
                debug!("Cache for {} saved ({:?})", key, status);

                Ok(doc)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::TimeZone;

    use crate::fetcher::ResponseHeaders;
    use crate::store::{BodyCodec, SqliteStore};
    use crate::testing::{MockFetcher, MockResponse};

    const URL: &str = "https://example.com/index.html";

    fn url() -> Url {
        Url::parse(URL).unwrap()
    }

    fn setup(serve_stale: bool) -> (Arc<SqliteStore>, Arc<MockFetcher>, CacheFetcher) {
        let store = Arc::new(SqliteStore::in_memory(BodyCodec::default()).unwrap());
        let mock = Arc::new(MockFetcher::probing(store.clone()));
        let options = RunOptions {
            serve_stale,
            ..Default::default()
        };
        let engine = CacheFetcher::new(store.clone(), mock.clone(), &options);
        (store, mock, engine)
    }

    fn cached(store: &SqliteStore, fetch_date: DateTime<Utc>, body: &str) -> CachedDocument {
        let mut doc = CachedDocument::new(URL.into());
        doc.fetch_date = fetch_date;
        doc.body = body.as_bytes().to_vec();
        doc.etag = Some("\"v1\"".into());
        doc.last_modified = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        doc.cache_control = Some("max-age=60".into());
        store.put(&[doc.clone()]).unwrap();
        doc
    }

    fn with_headers(body: &str, headers: ResponseHeaders) -> MockResponse {
        MockResponse::Page {
            body: body.into(),
            headers,
        }
    }

    #[tokio::test]
    async fn test_miss_fetches_unconditionally_and_inserts() {
        let (store, mock, engine) = setup(false);
        let server_date = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        mock.route(
            URL,
            with_headers(
                "<html><title>t</title></html>",
                ResponseHeaders {
                    date: Some(server_date),
                    etag: Some("\"abc\"".into()),
                    ..Default::default()
                },
            ),
        );

        let doc = engine.fetch(&url(), HardLifetime::Forever).await.unwrap();
        assert_eq!(doc.status, CacheStatus::New);
        assert_eq!(doc.fetch_date, server_date);

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.is_empty());

        let stored = store.get(URL).unwrap().unwrap();
        assert_eq!(stored.etag.as_deref(), Some("\"abc\""));
        assert_eq!(stored.body, b"<html><title>t</title></html>");
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_network() {
        let (store, mock, engine) = setup(false);
        let now = Utc::now();
        cached(&store, now - chrono::Duration::seconds(10), "cached");

        let doc = engine
            .fetch_at(&url(), HardLifetime::Forever, now)
            .await
            .unwrap();
        assert_eq!(doc.status, CacheStatus::NotModified);
        assert_eq!(doc.body, b"cached");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fresh_by_expires() {
        let (store, mock, engine) = setup(false);
        let now = Utc::now();
        let mut doc = CachedDocument::new(URL.into());
        doc.fetch_date = now - chrono::Duration::hours(2);
        doc.expires = Some(now + chrono::Duration::hours(1));
        store.put(&[doc]).unwrap();

        engine
            .fetch_at(&url(), HardLifetime::Forever, now)
            .await
            .unwrap();
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stale_hit_sends_validators_and_handles_304() {
        let (store, mock, engine) = setup(false);
        let now = Utc::now();
        let before = cached(&store, now - chrono::Duration::minutes(5), "old body");
        let server_date = now - chrono::Duration::seconds(1);
        mock.route(
            URL,
            MockResponse::NotModified(ResponseHeaders {
                date: Some(server_date),
                etag: Some("\"ignored\"".into()),
                ..Default::default()
            }),
        );

        let doc = engine
            .fetch_at(&url(), HardLifetime::Forever, now)
            .await
            .unwrap();

        let (_, conditions) = &mock.calls()[0];
        assert_eq!(conditions.if_none_match.as_deref(), Some("\"v1\""));
        assert_eq!(conditions.if_modified_since, before.last_modified);
        assert_eq!(conditions.cache_control.as_deref(), Some("max-age=60"));

        assert_eq!(doc.status, CacheStatus::NotModified);
        assert_eq!(doc.body, b"old body");
        assert_eq!(doc.etag, before.etag);
        assert_eq!(doc.last_modified, before.last_modified);
        assert_eq!(doc.cache_control, before.cache_control);
        assert_eq!(doc.fetch_date, server_date);

        // 304s are not written back
        let stored = store.get(URL).unwrap().unwrap();
        assert_eq!(stored.fetch_date, before.fetch_date);
    }

    #[tokio::test]
    async fn test_modified_overwrites_validators() {
        let (store, mock, engine) = setup(false);
        let now = Utc::now();
        cached(&store, now - chrono::Duration::minutes(5), "old body");
        mock.route(
            URL,
            with_headers(
                "new body",
                ResponseHeaders {
                    cache_control: Some("no-cache".into()),
                    ..Default::default()
                },
            ),
        );

        let doc = engine
            .fetch_at(&url(), HardLifetime::Forever, now)
            .await
            .unwrap();
        assert_eq!(doc.status, CacheStatus::Modified);
        assert_eq!(doc.fetch_date, now);

        let stored = store.get(URL).unwrap().unwrap();
        assert_eq!(stored.body, b"new body");
        assert_eq!(stored.etag, None);
        assert_eq!(stored.last_modified, None);
        assert_eq!(stored.cache_control.as_deref(), Some("no-cache"));
        assert_eq!(stored.fetch_date, now);
    }

    #[tokio::test]
    async fn test_dead_row_deleted_before_request() {
        let (store, mock, engine) = setup(false);
        let now = Utc::now();
        cached(&store, now - chrono::Duration::days(2), "ancient");
        mock.page(URL, "fresh body");

        let doc = engine
            .fetch_at(&url(), HardLifetime::For(Duration::from_secs(86400)), now)
            .await
            .unwrap();

        assert_eq!(mock.cached_at_call(), vec![false]);
        assert!(mock.calls()[0].1.is_empty());
        assert_eq!(doc.status, CacheStatus::New);
        assert_eq!(store.get(URL).unwrap().unwrap().body, b"fresh body");
    }

    #[tokio::test]
    async fn test_hard_lifetime_overrides_fresh_expires() {
        let (store, mock, engine) = setup(false);
        let now = Utc::now();
        let mut doc = cached(&store, now - chrono::Duration::hours(2), "expired by ttl");
        doc.cache_control = None;
        doc.expires = Some(now + chrono::Duration::days(1));
        store.update(&[doc.clone()]).unwrap();
        assert!(doc.is_fresh(now));

        mock.page(URL, "refetched");
        let doc = engine
            .fetch_at(&url(), HardLifetime::For(Duration::from_secs(3600)), now)
            .await
            .unwrap();

        assert_eq!(mock.cached_at_call(), vec![false]);
        assert!(mock.calls()[0].1.is_empty());
        assert_eq!(doc.status, CacheStatus::New);
        assert_eq!(store.get(URL).unwrap().unwrap().body, b"refetched");
    }

    #[tokio::test]
    async fn test_forever_never_expires_row() {
        let (store, mock, engine) = setup(false);
        let now = Utc::now();
        cached(&store, now - chrono::Duration::days(3650), "old");
        mock.route(URL, MockResponse::NotModified(ResponseHeaders::default()));

        let doc = engine
            .fetch_at(&url(), HardLifetime::Forever, now)
            .await
            .unwrap();
        assert_eq!(mock.cached_at_call(), vec![true]);
        assert_eq!(doc.body, b"old");
    }

    #[tokio::test]
    async fn test_new_fetch_failure_is_error() {
        let (store, _mock, engine) = setup(true);
        assert!(engine.fetch(&url(), HardLifetime::Forever).await.is_err());
        assert!(store.get(URL).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_serves_stale_when_enabled() {
        let (store, mock, engine) = setup(true);
        let now = Utc::now();
        cached(&store, now - chrono::Duration::minutes(5), "stale body");
        mock.enqueue(URL, MockResponse::Status(503));
        mock.page(URL, "recovered");

        let doc = engine
            .fetch_at(&url(), HardLifetime::Forever, now)
            .await
            .unwrap();
        assert_eq!(doc.body, b"stale body");
        assert_eq!(doc.status, CacheStatus::Expired);
        assert_eq!(store.get(URL).unwrap().unwrap().body, b"stale body");

        let doc = engine
            .fetch_at(&url(), HardLifetime::Forever, now)
            .await
            .unwrap();
        assert_eq!(doc.body, b"recovered");
        assert_eq!(doc.status, CacheStatus::Modified);
        assert_eq!(mock.call_count(URL), 2);
    }

    #[tokio::test]
    async fn test_failure_without_serve_stale_is_error() {
        let (store, mock, engine) = setup(false);
        let now = Utc::now();
        cached(&store, now - chrono::Duration::minutes(5), "stale body");
        mock.route(URL, MockResponse::Status(500));

        let err = engine
            .fetch_at(&url(), HardLifetime::Forever, now)
            .await
            .unwrap_err();
        assert!(matches!(err, PagefeedError::HttpStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_fetch_date_never_moves_backwards() {
        let (store, mock, engine) = setup(false);
        let now = Utc::now();
        let before = cached(&store, now - chrono::Duration::minutes(5), "body");
        // Server clock lags far behind ours
        mock.route(
            URL,
            with_headers(
                "body 2",
                ResponseHeaders {
                    date: Some(before.fetch_date - chrono::Duration::days(1)),
                    ..Default::default()
                },
            ),
        );

        let doc = engine
            .fetch_at(&url(), HardLifetime::Forever, now)
            .await
            .unwrap();
        assert!(doc.fetch_date >= before.fetch_date);
    }

    #[tokio::test]
    async fn test_unconditional_304_is_error() {
        let (_store, mock, engine) = setup(false);
        mock.route(URL, MockResponse::NotModified(ResponseHeaders::default()));
        assert!(engine.fetch(&url(), HardLifetime::Forever).await.is_err());
    }

    /// Inserts the row itself mid-request, like a sibling task would.
    struct RacingFetcher {
        store: Arc<SqliteStore>,
    }

    #[async_trait::async_trait]
    impl Fetcher for RacingFetcher {
        async fn fetch(&self, url: &str, _conditions: &Conditions) -> Result<FetchResult> {
            self.store.put(&[CachedDocument::new(url.to_string())])?;
            Ok(FetchResult::Content {
                body: b"mine".to_vec(),
                headers: ResponseHeaders::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_insert_is_error() {
        let store = Arc::new(SqliteStore::in_memory(BodyCodec::default()).unwrap());
        let fetcher = Arc::new(RacingFetcher {
            store: store.clone(),
        });
        let engine = CacheFetcher::new(store.clone(), fetcher, &RunOptions::default());

        let err = engine.fetch(&url(), HardLifetime::Forever).await.unwrap_err();
        assert!(matches!(err, PagefeedError::DuplicateUrl(_)));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_next_fetch_date() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(next_fetch_date(None, None, a), a);
        assert_eq!(next_fetch_date(None, Some(b), a), b);
        assert_eq!(next_fetch_date(Some(b), Some(a), a), b);
    }
}
