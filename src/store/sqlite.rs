use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{PagefeedError, Result};
use crate::domain::{CacheStatus, CachedDocument};
use crate::store::{BodyCodec, CacheStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
    codec: BodyCodec,
}

/// Columns as stored, before the body is decoded.
struct StoredRow {
    url: String,
    fetch_date: Option<String>,
    cache_control: Option<String>,
    last_modified: Option<String>,
    etag: Option<String>,
    expires: Option<String>,
    body: Vec<u8>,
    compressed: bool,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            fetch_date: row.get(1)?,
            cache_control: row.get(2)?,
            last_modified: row.get(3)?,
            etag: row.get(4)?,
            expires: row.get(5)?,
            body: row.get(6)?,
            compressed: row.get(7)?,
        })
    }
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P, codec: BodyCodec) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
            codec,
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory(codec: BodyCodec) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            codec,
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| PagefeedError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            PagefeedError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| DateTime::parse_from_rfc2822(s).map(|dt| dt.with_timezone(&Utc)).ok())
    }

    fn format_datetime(dt: Option<DateTime<Utc>>) -> Option<String> {
        dt.map(|dt| dt.to_rfc3339())
    }

    fn into_document(&self, row: StoredRow) -> CachedDocument {
        let fetch_date = row
            .fetch_date
            .as_deref()
            .and_then(Self::parse_datetime)
            .unwrap_or_else(|| {
                tracing::warn!("Cache entry for {} has an unreadable fetch date", row.url);
                DateTime::<Utc>::UNIX_EPOCH
            });

        CachedDocument {
            fetch_date,
            cache_control: row.cache_control.filter(|s| !s.is_empty()),
            last_modified: row.last_modified.as_deref().and_then(Self::parse_datetime),
            etag: row.etag.filter(|s| !s.is_empty()),
            expires: row.expires.as_deref().and_then(Self::parse_datetime),
            body: self.codec.decode(row.body, row.compressed, &row.url),
            status: CacheStatus::NotModified,
            url: row.url,
        }
    }

    fn is_unique_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
        )
    }

    pub fn count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM html_cache", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl CacheStore for SqliteStore {
    fn get(&self, url: &str) -> Result<Option<CachedDocument>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT url, fetch_date, cache_control, last_modified, etag, expires, body,
                        compressed
                 FROM html_cache WHERE url = ?1",
                params![url],
                StoredRow::from_row,
            )
            .optional()?;
        drop(conn);

        Ok(row.map(|row| self.into_document(row)))
    }

    fn put(&self, docs: &[CachedDocument]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for doc in docs {
            let (body, compressed) = self.codec.encode(&doc.body, &doc.url);
            tx.execute(
                "INSERT INTO html_cache (url, fetch_date, cache_control, last_modified, etag,
                                         expires, body, compressed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    doc.url,
                    doc.fetch_date.to_rfc3339(),
                    doc.cache_control,
                    Self::format_datetime(doc.last_modified),
                    doc.etag,
                    Self::format_datetime(doc.expires),
                    body,
                    compressed
                ],
            )
            .map_err(|e| {
                if Self::is_unique_violation(&e) {
                    PagefeedError::DuplicateUrl(doc.url.clone())
                } else {
                    PagefeedError::Database(e)
                }
            })?;
        }

        tx.commit()?;
        tracing::debug!("Saved {} cache entries", docs.len());
        Ok(())
    }

    fn update(&self, docs: &[CachedDocument]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for doc in docs {
            let (body, compressed) = self.codec.encode(&doc.body, &doc.url);
            let changed = tx.execute(
                "UPDATE html_cache
                 SET fetch_date = ?2, cache_control = ?3, last_modified = ?4, etag = ?5,
                     expires = ?6, body = ?7, compressed = ?8
                 WHERE url = ?1",
                params![
                    doc.url,
                    doc.fetch_date.to_rfc3339(),
                    doc.cache_control,
                    Self::format_datetime(doc.last_modified),
                    doc.etag,
                    Self::format_datetime(doc.expires),
                    body,
                    compressed
                ],
            )?;
            if changed == 0 {
                // Dropping the transaction rolls back the rows already written.
                return Err(PagefeedError::CacheEntryNotFound(doc.url.clone()));
            }
        }

        tx.commit()?;
        tracing::debug!("Updated {} cache entries", docs.len());
        Ok(())
    }

    fn delete(&self, url: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM html_cache WHERE url = ?1", params![url])?;
        Ok(())
    }
}
