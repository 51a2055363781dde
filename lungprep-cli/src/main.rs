//! lungprep CLI: runs the chest X-ray data-preparation pipeline, or any one
//! of its stages, from the command line.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Prepare a chest X-ray corpus for training: ingest, validate, transform.
#[derive(Parser, Debug)]
#[command(name = "lungprep", version, about, long_about = None)]
struct Cli {
    /// Project root holding `config/` and the run artifacts
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Configuration file (defaults to `<root>/config/config.toml`)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run ingestion, validation and transformation
    Run,
    /// Fetch, extract and catalog the corpus
    Ingest,
    /// Validate manifests from a persisted ingestion result
    Validate {
        /// Path to `ingestion_result.json`
        ingestion_result: PathBuf,
    },
    /// Compare two manifests and write a drift report
    Drift {
        /// Reference manifest CSV
        reference: PathBuf,
        /// Current manifest CSV
        current: PathBuf,
        /// Output directory for the JSON and HTML reports
        #[arg(long)]
        out: PathBuf,
    },
    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Print the merged configuration as TOML
    Show,
    /// List problems with the merged configuration
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured run logs
    let log_dir = cli.root.join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "lungprep.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let root = cli
        .root
        .canonicalize()
        .unwrap_or_else(|_| cli.root.clone());

    commands::handle_command(cli.command, &root, cli.config.as_deref()).await
}
