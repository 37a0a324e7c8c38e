//! Trafficast CLI: traffic-volume predictions with conformal intervals.
//!
//! Single form entries, batch uploads and schema inspection over a reference
//! dataset and a frozen predictor artifact.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Trafficast: traffic volume with prediction intervals
#[derive(Parser, Debug)]
#[command(name = "trafficast", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reference dataset (overrides data.reference_path)
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Model artifact (overrides model.artifact_path)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Predict traffic volume for a single entry
    Predict(PredictArgs),
    /// Predict every row of a CSV file and write a report
    Batch {
        /// CSV file with one record per row
        file: PathBuf,
        /// Miscoverage level (confidence is 1 - alpha)
        #[arg(short, long)]
        alpha: Option<f64>,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the encoded column layout, form options and sample rows
    Schema {
        /// Print the schema reference as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Default)]
struct PredictArgs {
    /// Holiday name (omit for none)
    #[arg(long)]
    holiday: Option<String>,
    /// Average temperature in kelvin
    #[arg(long)]
    temp: f64,
    /// Rain in the hour, mm
    #[arg(long, default_value_t = 0.0)]
    rain: f64,
    /// Snow in the hour, mm
    #[arg(long, default_value_t = 0.0)]
    snow: f64,
    /// Cloud cover, percent
    #[arg(long)]
    clouds: f64,
    /// Weather category, e.g. Clouds or Rain
    #[arg(long)]
    weather: String,
    /// Date and time of the entry (calendar fields are derived from it)
    #[arg(long, conflicts_with_all = ["month", "weekday", "hour"])]
    timestamp: Option<String>,
    /// Month name (defaults to the current month)
    #[arg(long)]
    month: Option<String>,
    /// Weekday name (defaults to today)
    #[arg(long)]
    weekday: Option<String>,
    /// Hour 0-23 (defaults to the current hour)
    #[arg(long)]
    hour: Option<String>,
    /// Miscoverage level (confidence is 1 - alpha)
    #[arg(short, long)]
    alpha: Option<f64>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

/// Paths given on the command line that take precedence over configuration.
#[derive(Debug, Clone, Default)]
struct Overrides {
    config: Option<PathBuf>,
    reference: Option<PathBuf>,
    model: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    // Logging settings come from configuration; a broken config is reported
    // by the command itself, so fall back to defaults here.
    let logging =
        trafficast_core::load_config(Some(&workspace), cli.config.as_deref(), None)
            .map(|c| c.logging)
            .unwrap_or_default();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let (json_layer, _guard) = if logging.json_file {
        let log_dir = logging
            .directory
            .clone()
            .unwrap_or_else(trafficast_core::config::default_log_dir);
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "trafficast.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new("debug"));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let overrides = Overrides {
        config: cli.config,
        reference: cli.reference,
        model: cli.model,
    };
    commands::handle_command(cli.command, &workspace, &overrides)
}
