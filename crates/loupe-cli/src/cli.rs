//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Loupe - function log observability client.
#[derive(Parser, Debug, Clone)]
#[command(name = "loupe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the local log database.
    #[arg(long, env = "LOUPE_DB", default_value = "loupe.db")]
    pub db: PathBuf,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Follow a deployment's log stream live.
    Tail(TailArgs),

    /// Query stored logs.
    Query(QueryArgs),

    /// Full-text search over stored logs.
    Search(SearchArgs),

    /// Export stored logs to a file or stdout.
    Export(ExportArgs),

    /// Show storage statistics.
    Stats,

    /// Remove stored logs past the retention window.
    Prune {
        /// Override the configured retention window, in days.
        #[arg(long)]
        days: Option<u32>,
    },

    /// Remove stored logs.
    Clear {
        /// Limit deletion to one deployment.
        #[arg(long)]
        deployment: Option<String>,
    },

    /// Compact the database and rebuild the search index.
    Optimize,
}

/// Arguments for the `tail` subcommand.
#[derive(Args, Debug, Clone)]
pub struct TailArgs {
    /// Deployment URL to poll.
    #[arg(long, env = "LOUPE_DEPLOYMENT_URL")]
    pub deployment_url: String,

    /// Auth token for the deployment.
    #[arg(long, env = "LOUPE_AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: String,

    /// Deployment identifier used to scope stored rows.
    #[arg(long)]
    pub deployment: String,

    /// Do not persist polled entries.
    #[arg(long)]
    pub no_persist: bool,
}

/// Filter flags shared by query, search, and export.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Limit to one deployment.
    #[arg(long)]
    pub deployment: Option<String>,

    /// Only failed executions.
    #[arg(long, conflicts_with = "success")]
    pub failed: bool,

    /// Only successful executions.
    #[arg(long)]
    pub success: bool,

    /// Exact function identifier.
    #[arg(long)]
    pub function: Option<String>,

    /// Exact request ID.
    #[arg(long)]
    pub request_id: Option<String>,

    /// Inclusive lower bound, epoch milliseconds.
    #[arg(long)]
    pub since: Option<i64>,

    /// Inclusive upper bound, epoch milliseconds.
    #[arg(long)]
    pub until: Option<i64>,
}

/// Arguments for the `query` subcommand.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Filters.
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Maximum rows per page.
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Continue from a previous page's cursor.
    #[arg(long)]
    pub cursor: Option<String>,
}

/// Arguments for the `search` subcommand.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Text to search for.
    pub text: String,

    /// Filters.
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Maximum rows per page.
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Continue from a previous page's cursor.
    #[arg(long)]
    pub cursor: Option<String>,
}

/// Arguments for the `export` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Filters.
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Export format.
    #[arg(long, value_enum, default_value_t = Format::Json)]
    pub format: Format,

    /// Output path. Omit to write to stdout.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Maximum entries to export.
    #[arg(long, default_value_t = 10_000)]
    pub limit: usize,
}

/// Export format flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// JSON list.
    Json,
    /// RFC-4180 CSV.
    Csv,
    /// Human-readable text.
    Txt,
}

impl From<Format> for loupe_export::ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => Self::Json,
            Format::Csv => Self::Csv,
            Format::Txt => Self::Txt,
        }
    }
}

impl FilterArgs {
    /// Converts the flags into store filters.
    #[must_use]
    pub fn to_filters(&self) -> loupe_store::QueryFilters {
        let mut filters = loupe_store::QueryFilters::new()
            .with_time_range(self.since, self.until);
        if let Some(deployment) = &self.deployment {
            filters = filters.with_deployment(deployment.clone());
        }
        if self.failed {
            filters = filters.with_success(false);
        } else if self.success {
            filters = filters.with_success(true);
        }
        if let Some(function) = &self.function {
            filters = filters.with_function_path(function.clone());
        }
        if let Some(request_id) = &self.request_id {
            filters = filters.with_request_id(request_id.clone());
        }
        filters
    }
}
