pub mod commands;

use std::path::PathBuf;

use clap::Parser;

use crate::app::options::{DEFAULT_COMPRESSION_LEVEL, DEFAULT_WORKERS};
use crate::app::RunOptions;

#[derive(Parser, Debug)]
#[command(name = "pagefeed", version)]
#[command(about = "Generate RSS feeds from web pages with regex templates", long_about = None)]
pub struct Cli {
    /// Log more about what is fetched and matched
    #[arg(short, long)]
    pub verbose: bool,

    /// Trace-level logging with body snippets on match failures
    #[arg(short, long)]
    pub debug: bool,

    /// Use the cached copy of a page when downloading it fails
    #[arg(short = 'a', long)]
    pub serve_stale: bool,

    /// gzip level for cached page bodies (0 disables compression)
    #[arg(short = 'z', long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    pub compression_level: u32,

    /// Number of targets processed concurrently
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Append logs to this file instead of stderr
    #[arg(short = 'l', long)]
    pub log_file: Option<PathBuf>,

    /// SQLite cache database (overrides the config file)
    #[arg(long)]
    pub cache_db: Option<PathBuf>,

    /// Configuration file (TOML, or JSON with a .json extension)
    pub config: PathBuf,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            debug: self.debug,
            serve_stale: self.serve_stale,
            workers: self.workers,
            ..Default::default()
        }
        .with_compression_level(self.compression_level)
    }

    /// Default log filter for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "trace"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
