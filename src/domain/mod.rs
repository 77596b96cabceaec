pub mod document;
pub mod feed;
pub mod target;

pub use document::{CacheStatus, CachedDocument};
pub use feed::{EntrySource, Feed, FeedEntry};
pub use target::Target;
