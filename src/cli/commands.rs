use crate::app::{AppContext, Result, RunOptions};
use crate::cli::Cli;
use crate::config::Config;
use crate::domain::Target;
use crate::scraper::RunSummary;

/// Everything a run needs, resolved from the command line and config file.
pub struct Prepared {
    pub ctx: AppContext,
    pub targets: Vec<Target>,
}

/// Merge config file settings into the command-line options.
pub fn run_options(cli: &Cli, config: &Config) -> Result<RunOptions> {
    let mut options = cli.run_options();
    if let Some(timeout) = config.http_timeout() {
        options.http_timeout = timeout;
    }
    if let Some(tz) = config.timezone()? {
        options.default_timezone = tz;
    }
    Ok(options)
}

/// Load and validate the configuration, then open the cache. Nothing is
/// fetched until every target has been validated.
pub fn prepare(cli: &Cli) -> Result<Prepared> {
    let config = Config::load(&cli.config)?;
    let targets = config.build_targets()?;
    let options = run_options(cli, &config)?;

    let db_path = cli.cache_db.clone().or_else(|| config.cache_db.clone());
    let ctx = AppContext::new(db_path, options)?;

    tracing::info!(
        "Loaded {} targets from {}",
        targets.len(),
        cli.config.display()
    );
    Ok(Prepared { ctx, targets })
}

pub async fn run(prepared: Prepared) -> RunSummary {
    let Prepared { ctx, targets } = prepared;
    ctx.runner.run_all(targets).await
}
