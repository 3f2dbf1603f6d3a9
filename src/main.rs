use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use rebal::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Compute a whole-share purchase plan for available cash
    Plan {
        /// Report the plan without submitting any order, regardless of config
        #[arg(long)]
        dry_run: bool,
    },
    /// Show current allocation versus targets
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => rebal::cli::setup::setup(),
        Some(Commands::Plan { dry_run }) => {
            rebal::run_command(
                rebal::AppCommand::Plan {
                    force_dry_run: dry_run,
                },
                cli.config_path.as_deref(),
            )
            .await
        }
        Some(Commands::Status) => {
            rebal::run_command(rebal::AppCommand::Status, cli.config_path.as_deref()).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
