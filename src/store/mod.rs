pub mod compression;
pub mod sqlite;

use crate::app::Result;
use crate::domain::CachedDocument;

pub use compression::BodyCodec;
pub use sqlite::SqliteStore;

/// Durable, URL-keyed storage for cached pages.
///
/// `put` and `update` are batch operations; each call commits atomically.
/// `put` on a URL that already has a row fails with
/// [`PagefeedError::DuplicateUrl`](crate::app::PagefeedError::DuplicateUrl).
pub trait CacheStore {
    fn get(&self, url: &str) -> Result<Option<CachedDocument>>;
    fn put(&self, docs: &[CachedDocument]) -> Result<()>;
    fn update(&self, docs: &[CachedDocument]) -> Result<()>;
    fn delete(&self, url: &str) -> Result<()>;
}
