//! gapfill CLI: the main entry point.
//!
//! Commands:
//! - `run`:      Impute both series and write the reconciled table
//! - `frames`:   Print the frames a forecaster would receive
//! - `forecast`: Call the forecaster once and save its table for replay
//! - `config`:   Show, validate, locate, or initialize the config file
//! - `doctor`:   Diagnose inputs and forecaster reachability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "gapfill",
    about = "gapfill: quantile-forecast gap filling for predator/prey series",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./gapfill.toml)
    #[arg(short, long, global = true, env = "GAPFILL_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the reconciled dataset
    Run {
        /// Write the run trace as JSON to this path
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Save each target's raw forecast under this directory for later replay
        #[arg(long)]
        save_forecasts: Option<PathBuf>,

        /// Override the output path from the config
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write figures even if `plots.enabled` is false
        #[arg(long)]
        plots: bool,
    },

    /// Print the context and future frames for one target as JSON
    Frames {
        /// hare (prey) or lynx (predator)
        #[arg(short, long)]
        target: String,
    },

    /// Forecast one target and save the table as CSV
    Forecast {
        /// hare (prey) or lynx (predator)
        #[arg(short, long)]
        target: String,

        /// Output file (defaults to `<replay_dir>/<Target>.csv`)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose inputs and forecaster health
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Load and validate the configuration
    Validate,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run {
            trace,
            save_forecasts,
            output,
            plots,
        } => {
            let opts = gapfill_pipeline::RunOptions {
                trace,
                save_forecasts,
                output,
                plots,
            };
            commands::run::run(config, opts).await?
        }
        Commands::Frames { target } => commands::frames::run(config, &target).await?,
        Commands::Forecast { target, out } => {
            commands::forecast::run(config, &target, out).await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config).await?,
            ConfigAction::Path => commands::config_cmd::path(config).await?,
            ConfigAction::Init { force } => commands::config_cmd::init(config, force).await?,
        },
        Commands::Doctor => commands::doctor::run(config).await?,
    }

    Ok(())
}
