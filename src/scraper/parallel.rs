use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::app::{PagefeedError, Result};
use crate::domain::Target;
use crate::emitter;
use crate::scraper::Scraper;

/// Runs every target as its own task, at most `workers` at a time.
pub struct TargetRunner {
    scraper: Arc<Scraper>,
    semaphore: Arc<Semaphore>,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Feed path and emitted entry count of each target that succeeded.
    pub written: Vec<(PathBuf, usize)>,
    /// Feed path and error of each target that failed.
    pub failed: Vec<(PathBuf, PagefeedError)>,
}

impl RunSummary {
    pub fn total_entries(&self) -> usize {
        self.written.iter().map(|(_, count)| count).sum()
    }
}

impl TargetRunner {
    pub fn with_workers(scraper: Arc<Scraper>, workers: usize) -> Self {
        Self {
            scraper,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Scrape and emit every target, waiting for all of them to finish.
    pub async fn run_all(&self, targets: Vec<Target>) -> RunSummary {
        let mut handles = Vec::new();

        for target in targets {
            let scraper = self.scraper.clone();
            let semaphore = self.semaphore.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("Semaphore closed");

                let result = run_single_target(&scraper, &target).await;
                (target.feed_path, result)
            });

            handles.push(handle);
        }

        let mut summary = RunSummary::default();
        for joined in join_all(handles).await {
            match joined {
                Ok((path, Ok(count))) => summary.written.push((path, count)),
                Ok((path, Err(e))) => {
                    tracing::error!(feed = %path.display(), "Target failed: {}", e);
                    summary.failed.push((path, e));
                }
                Err(e) => {
                    tracing::error!("Task join error: {}", e);
                }
            }
        }

        tracing::info!(
            "{} targets, {} entries, {} failures",
            summary.written.len() + summary.failed.len(),
            summary.total_entries(),
            summary.failed.len()
        );

        summary
    }
}

async fn run_single_target(scraper: &Scraper, target: &Target) -> Result<usize> {
    let feed = scraper.scrape(target).await?;
    emitter::write_feed(&feed, &target.feed_path)?;
    tracing::info!(
        "Wrote {} entries from {} to {}",
        feed.entries.len(),
        feed.url,
        target.feed_path.display()
    );
    Ok(feed.entries.len())
}
