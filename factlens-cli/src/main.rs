//! factlens CLI: check generated text for unsupported factual claims.
//!
//! Provides index management, corpus search, single-claim verification, and
//! full-text checking against a local document corpus.

mod commands;
mod output;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// factlens: evidence-grounded claim checking for AI-generated text
#[derive(Parser, Debug)]
#[command(name = "factlens", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Workspace directory (corpus and index paths are relative to it)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Evidence documents retrieved per claim (overrides retrieval.top_k)
    #[arg(short = 'k', long, global = true)]
    top_k: Option<usize>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Build the vector index for the configured corpus
    Index {
        /// Rebuild even if the stored index is current
        #[arg(long)]
        force: bool,
    },
    /// Semantic search over the corpus
    Search {
        /// Query text
        query: String,
    },
    /// Verify a single claim
    Verify {
        /// Claim sentence
        claim: String,
    },
    /// Extract and verify every claim in a text
    Check {
        /// Text to check (reads stdin if neither text nor --file is given)
        text: Option<String>,
        /// Read the text from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check that the corpus, embedder, and classifier are usable
    Doctor,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
    /// Set a value in the workspace configuration (e.g. retrieval.top_k 5)
    Set {
        /// Dotted key
        key: String,
        /// Value, parsed as TOML when possible
        value: String,
    },
    /// Report configuration problems
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "factlens", "factlens")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "factlens.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let format = if cli.json {
        output::Format::Json
    } else {
        output::Format::Text
    };

    commands::handle_command(cli.command, &workspace, cli.top_k, format).await
}
