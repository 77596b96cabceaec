pub mod context;
pub mod error;
pub mod options;

pub use context::AppContext;
pub use error::{PagefeedError, Result};
pub use options::RunOptions;
