//! Loupe CLI binary entrypoint.
//!
//! Thin front end over the session, store, and export crates; all real
//! logic lives in the libraries.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

mod cli;
mod commands;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Tail(args) => commands::tail(cli.db, args).await,
        Commands::Query(args) => commands::query(cli.db, args),
        Commands::Search(args) => commands::search(cli.db, args),
        Commands::Export(args) => commands::export(cli.db, args),
        Commands::Stats => commands::stats(cli.db),
        Commands::Prune { days } => commands::prune(cli.db, days),
        Commands::Clear { deployment } => commands::clear(cli.db, deployment),
        Commands::Optimize => commands::optimize(cli.db),
    }
}
