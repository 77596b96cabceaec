//! In-process HTTP transport for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::app::{PagefeedError, Result};
use crate::fetcher::{Conditions, FetchResult, Fetcher, ResponseHeaders};
use crate::store::{CacheStore, SqliteStore};

#[derive(Debug, Clone)]
pub enum MockResponse {
    Page {
        body: String,
        headers: ResponseHeaders,
    },
    NotModified(ResponseHeaders),
    Status(u16),
}

impl MockResponse {
    pub fn page(body: &str) -> Self {
        Self::Page {
            body: body.to_string(),
            headers: ResponseHeaders::default(),
        }
    }
}

#[derive(Default)]
pub struct MockFetcher {
    routes: Mutex<HashMap<String, MockResponse>>,
    queued: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    calls: Mutex<Vec<(String, Conditions)>>,
    probe: Option<Arc<SqliteStore>>,
    cached_at_call: Mutex<Vec<bool>>,
    call_times: Mutex<Vec<Instant>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record, on every call, whether the store held a row for the URL.
    pub fn probing(store: Arc<SqliteStore>) -> Self {
        Self {
            probe: Some(store),
            ..Self::default()
        }
    }

    /// Serve `response` for `url` on every request.
    pub fn route(&self, url: &str, response: MockResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    pub fn page(&self, url: &str, body: &str) {
        self.route(url, MockResponse::page(body));
    }

    /// Serve `response` once, ahead of any route.
    pub fn enqueue(&self, url: &str, response: MockResponse) {
        self.queued
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<(String, Conditions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .count()
    }

    pub fn cached_at_call(&self) -> Vec<bool> {
        self.cached_at_call.lock().unwrap().clone()
    }

    /// Clock reading taken at each call, in call order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, conditions: &Conditions) -> Result<FetchResult> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), conditions.clone()));
        self.call_times.lock().unwrap().push(Instant::now());

        if let Some(store) = &self.probe {
            let cached = store.get(url)?.is_some();
            self.cached_at_call.lock().unwrap().push(cached);
        }

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        let response = queued.or_else(|| self.routes.lock().unwrap().get(url).cloned());

        match response {
            Some(MockResponse::Page { body, headers }) => Ok(FetchResult::Content {
                body: body.into_bytes(),
                headers,
            }),
            Some(MockResponse::NotModified(headers)) => Ok(FetchResult::NotModified { headers }),
            Some(MockResponse::Status(status)) => Err(PagefeedError::HttpStatus {
                url: url.to_string(),
                status,
            }),
            None => Err(PagefeedError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
