use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{PagefeedError, Result};
use crate::app::RunOptions;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::{CacheFetcher, Fetcher};
use crate::scraper::{Scraper, TargetRunner};
use crate::store::sqlite::SqliteStore;
use crate::store::BodyCodec;

pub struct AppContext {
    pub options: RunOptions,
    pub store: Arc<SqliteStore>,
    pub runner: TargetRunner,
}

impl AppContext {
    pub fn new(db_path: Option<PathBuf>, options: RunOptions) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        tracing::debug!("Using cache database {}", db_path.display());

        let store = Arc::new(SqliteStore::new(
            &db_path,
            BodyCodec::new(options.compression_level),
        )?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::new(options.http_timeout)?);
        Ok(Self::with_parts(store, fetcher, options))
    }

    pub fn in_memory(options: RunOptions) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory(BodyCodec::new(
            options.compression_level,
        ))?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::new(options.http_timeout)?);
        Ok(Self::with_parts(store, fetcher, options))
    }

    /// Wire the engine, scraper and runner around an existing store and transport.
    pub fn with_parts(
        store: Arc<SqliteStore>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        options: RunOptions,
    ) -> Self {
        let engine = Arc::new(CacheFetcher::new(store.clone(), fetcher, &options));
        let scraper = Arc::new(Scraper::new(engine, options.clone()));
        let runner = TargetRunner::with_workers(scraper, options.workers);

        Self {
            options,
            store,
            runner,
        }
    }

    /// `<data dir>/pagefeed/cache.db`
    pub fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| PagefeedError::Other("Could not find data directory".into()))?;
        let pagefeed_dir = data_dir.join("pagefeed");
        std::fs::create_dir_all(&pagefeed_dir)?;
        Ok(pagefeed_dir.join("cache.db"))
    }
}
