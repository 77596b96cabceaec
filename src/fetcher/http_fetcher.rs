use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, DATE, ETAG, EXPIRES, IF_MODIFIED_SINCE,
    IF_NONE_MATCH, LAST_MODIFIED,
};
use reqwest::{Client, StatusCode};

use crate::app::{PagefeedError, Result};
use crate::fetcher::{
    format_http_date, parse_http_date, Conditions, FetchResult, Fetcher, ResponseHeaders,
};

pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; pagefeed/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    fn request_headers(conditions: &Conditions) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(since) = conditions.if_modified_since {
            if let Ok(value) = HeaderValue::from_str(&format_http_date(since)) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        if let Some(etag) = &conditions.if_none_match {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }

        if let Some(cache_control) = &conditions.cache_control {
            if let Ok(value) = HeaderValue::from_str(cache_control) {
                headers.insert(CACHE_CONTROL, value);
            }
        }

        headers
    }

    fn response_headers(headers: &HeaderMap) -> ResponseHeaders {
        let text = |name: HeaderName| -> Option<String> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        ResponseHeaders {
            date: text(DATE).as_deref().and_then(parse_http_date),
            cache_control: text(CACHE_CONTROL),
            last_modified: text(LAST_MODIFIED).as_deref().and_then(parse_http_date),
            etag: text(ETAG),
            expires: text(EXPIRES).as_deref().and_then(parse_http_date),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, conditions: &Conditions) -> Result<FetchResult> {
        tracing::debug!("Requesting {}", url);

        let response = self
            .client
            .get(url)
            .headers(Self::request_headers(conditions))
            .send()
            .await?;

        let headers = Self::response_headers(response.headers());

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(FetchResult::NotModified { headers });
        }

        if !response.status().is_success() {
            return Err(PagefeedError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?.to_vec();

        Ok(FetchResult::Content { body, headers })
    }
}
