pub mod cli;
pub mod core;
pub mod providers;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::config::AppConfig;
use crate::core::notify::LogNotifier;
use crate::core::orders::LoggingExecutor;
use crate::providers::schwab::SchwabProvider;

/// Application commands, decoupled from the CLI argument parser.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// Compute and report a purchase plan for the account's idle cash.
    /// `force_dry_run` overrides the configured dry-run setting when set.
    Plan { force_dry_run: bool },
    /// Show current allocation against targets.
    Status,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("rebal starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let schwab = config
        .broker
        .schwab
        .as_ref()
        .context("No broker configured; add a broker.schwab section to the config")?;
    let provider = SchwabProvider::new(
        &schwab.base_url,
        &schwab.account_id,
        schwab.access_token.as_deref(),
    );

    let targets = config.target_allocation();

    match command {
        AppCommand::Plan { force_dry_run } => {
            let dry_run = force_dry_run || config.dry_run;
            if dry_run {
                info!("Dry run: computed orders will not be placed");
            }
            cli::plan::run(
                &targets,
                &provider,
                &provider,
                &LoggingExecutor,
                &LogNotifier,
                dry_run,
            )
            .await
        }
        AppCommand::Status => cli::status::run(&targets, &provider).await,
    }
}
