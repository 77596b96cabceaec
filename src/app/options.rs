use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest body excerpt written to the log in debug mode.
pub const DEBUG_SNIPPET_LEN: usize = 512;

/// Immutable run-wide settings, handed to the cache engine and the scraper
/// instead of living in process-wide flags.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Enables body snippets in failure logs.
    pub debug: bool,
    /// Serve the previous cached body when a revalidation request fails.
    pub serve_stale: bool,
    /// gzip level for cached bodies, 0 disables compression.
    pub compression_level: u32,
    pub workers: usize,
    pub http_timeout: Duration,
    /// Offset assigned to publish dates that carry no timezone.
    pub default_timezone: FixedOffset,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            debug: false,
            serve_stale: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            workers: DEFAULT_WORKERS,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            default_timezone: default_timezone(),
        }
    }
}

impl RunOptions {
    /// Clamp an out-of-range compression level back to the default.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        if level > 9 {
            tracing::warn!(
                "Invalid gzip compression level {}, using {}",
                level,
                DEFAULT_COMPRESSION_LEVEL
            );
            self.compression_level = DEFAULT_COMPRESSION_LEVEL;
        } else {
            self.compression_level = level;
        }
        self
    }

    /// Truncated excerpt of a page body for debug logging, `None` outside debug mode.
    pub fn snippet<'a>(&self, body: &'a str) -> Option<&'a str> {
        if !self.debug {
            return None;
        }
        let mut end = body.len().min(DEBUG_SNIPPET_LEN);
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        Some(&body[..end])
    }
}

/// UTC+08:00, the zone the scraped sites were historically assumed to publish in.
pub fn default_timezone() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_level_clamped() {
        let options = RunOptions::default().with_compression_level(12);
        assert_eq!(options.compression_level, DEFAULT_COMPRESSION_LEVEL);

        let options = RunOptions::default().with_compression_level(0);
        assert_eq!(options.compression_level, 0);
    }

    #[test]
    fn test_snippet_only_in_debug() {
        let body = "x".repeat(2000);
        let quiet = RunOptions::default();
        assert!(quiet.snippet(&body).is_none());

        let debug = RunOptions {
            debug: true,
            ..Default::default()
        };
        assert_eq!(debug.snippet(&body).unwrap().len(), DEBUG_SNIPPET_LEN);
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        let body = "é".repeat(DEBUG_SNIPPET_LEN);
        let debug = RunOptions {
            debug: true,
            ..Default::default()
        };
        let snippet = debug.snippet(&body).unwrap();
        assert!(snippet.len() <= DEBUG_SNIPPET_LEN);
        assert!(snippet.chars().all(|c| c == 'é'));
    }
}
