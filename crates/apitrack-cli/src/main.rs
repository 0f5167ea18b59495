//! apitrack CLI - GitHub API rate limit usage tracker
//!
//! Run `apitrack pre` before a job's work, optionally `apitrack checkpoint`
//! part way through, and `apitrack post` at the end to report how many API
//! calls/points the job consumed.

mod commands;
mod output;

use anyhow::Result;
use apitrack_core::config::{is_quiet, DEFAULT_BUCKETS};
use apitrack_core::{resolve_job_id, TrackerConfig};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "apitrack")]
#[command(author, version, about = "GitHub API rate limit usage tracker for CI jobs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Only print warnings and errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// GitHub token (falls back to GITHUB_TOKEN)
    #[arg(long, env = "INPUT_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Comma-separated buckets to track
    #[arg(long, env = "INPUT_BUCKETS", global = true, default_value = DEFAULT_BUCKETS)]
    buckets: String,

    /// Write the usage JSON to this file after the post step
    #[arg(long, env = "INPUT_OUTPUT_PATH", global = true)]
    output_path: Option<String>,

    /// Override state database path (or set APITRACK_STATE_DB env var)
    #[arg(long, env = "APITRACK_STATE_DB", global = true)]
    state_db: Option<String>,

    /// Job id that scopes saved state (or set APITRACK_JOB_ID env var)
    #[arg(long, global = true)]
    job: Option<String>,

    /// GitHub API root, for GitHub Enterprise Server
    #[arg(
        long,
        env = "GITHUB_API_URL",
        global = true,
        default_value = apitrack_core::services::rate_limit::DEFAULT_API_URL
    )]
    api_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the starting snapshot
    Pre,

    /// Capture a mid-job snapshot
    Checkpoint,

    /// Compute and report usage since the starting snapshot
    Post,

    /// Fetch and print the current rate limits
    Snapshot {
        /// Show every resource, not only the selected buckets
        #[arg(long)]
        all: bool,
    },

    /// List the buckets that can be tracked
    Buckets,
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let quiet = cli.quiet || is_quiet(std::env::var("INPUT_QUIET").ok().as_deref());
    init_logging(quiet);

    let token = cli
        .token
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| std::env::var("GITHUB_TOKEN").ok());

    let (config, selection) = TrackerConfig::from_inputs(
        token.as_deref(),
        &cli.buckets,
        cli.output_path.as_deref(),
        quiet,
    );
    if let Some(warning) = selection.invalid_warning() {
        log::warn!("[apitrack] {}", warning);
    }

    // Create context for commands
    let ctx = commands::Context {
        config,
        format: cli.format,
        quiet,
        state_db: cli.state_db.clone(),
        job_id: resolve_job_id(cli.job.as_deref()),
        api_url: cli.api_url.clone(),
    };

    // Execute command
    match cli.command {
        Commands::Pre => commands::pre::execute(&ctx).await,
        Commands::Checkpoint => commands::checkpoint::execute(&ctx).await,
        Commands::Post => commands::post::execute(&ctx).await,
        Commands::Snapshot { all } => commands::snapshot::execute(&ctx, all).await,
        Commands::Buckets => commands::buckets::execute(&ctx),
    }
}
