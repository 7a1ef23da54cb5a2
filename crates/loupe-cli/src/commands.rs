//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use loupe_client::{HttpLogPoller, LogSession, SessionConfig, SessionEvent};
use loupe_core::{summary_message, LogEntry};
use loupe_export::{encode, write_export, ExportFormat, SaveOutcome};
use loupe_store::{LogStorage, QueryPage, SqliteLogStore, StoredLogRecord};

use crate::cli::{ExportArgs, QueryArgs, SearchArgs, TailArgs};

fn format_timestamp(ts_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms).map_or_else(
        || ts_ms.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
    )
}

fn print_entry(entry: &LogEntry) {
    println!(
        "{} [{}] {} {}",
        format_timestamp(entry.timestamp),
        entry.severity().as_str(),
        entry
            .function_identifier
            .as_deref()
            .or(entry.function_name.as_deref())
            .unwrap_or("<unknown>"),
        summary_message(entry),
    );
}

fn print_page(records: &[StoredLogRecord], has_more: bool, next_cursor: Option<&str>) {
    for record in records {
        print_entry(&record.entry);
    }
    if has_more {
        if let Some(cursor) = next_cursor {
            eprintln!("more rows available; continue with --cursor {cursor}");
        }
    }
}

/// `loupe tail`: follow a deployment's log stream until Ctrl-C.
pub async fn tail(db: PathBuf, args: TailArgs) -> anyhow::Result<()> {
    let store: Arc<dyn LogStorage> =
        Arc::new(SqliteLogStore::open(&db).context("opening log database")?);
    let poller = HttpLogPoller::new(args.deployment_url, args.auth_token);

    let mut config = SessionConfig::new(args.deployment);
    config.persist = !args.no_persist;

    let (mut session, mut events) = LogSession::start(poller, store, config);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Entries(entries)) => {
                    for entry in &entries {
                        print_entry(entry);
                    }
                }
                Some(SessionEvent::Disconnected) => {
                    warn!("connection lost; retrying");
                }
                Some(SessionEvent::Reconnected) => {
                    info!("reconnected");
                }
                None => break,
            },
            result = tokio::signal::ctrl_c() => {
                result.context("listening for ctrl-c")?;
                break;
            }
        }
    }

    session.stop().await;
    Ok(())
}

/// `loupe query`: one page of stored logs.
pub fn query(db: PathBuf, args: QueryArgs) -> anyhow::Result<()> {
    let store = SqliteLogStore::open(&db).context("opening log database")?;
    let page = store.query(&args.filters.to_filters(), args.limit, args.cursor.as_deref())?;
    print_page(&page.records, page.has_more, page.next_cursor.as_deref());
    Ok(())
}

/// `loupe search`: one page of full-text matches.
pub fn search(db: PathBuf, args: SearchArgs) -> anyhow::Result<()> {
    let store = SqliteLogStore::open(&db).context("opening log database")?;
    let page = store.search(
        &args.text,
        &args.filters.to_filters(),
        args.limit,
        args.cursor.as_deref(),
    )?;
    print_page(&page.records, page.has_more, page.next_cursor.as_deref());
    Ok(())
}

/// `loupe export`: encode matching entries to a file or stdout.
pub fn export(db: PathBuf, args: ExportArgs) -> anyhow::Result<()> {
    let store = SqliteLogStore::open(&db).context("opening log database")?;
    let filters = args.filters.to_filters();
    let format: ExportFormat = args.format.into();

    let mut entries: Vec<LogEntry> = Vec::new();
    let mut cursor: Option<String> = None;
    while entries.len() < args.limit {
        let page_size = (args.limit - entries.len()).min(1000);
        let QueryPage {
            records,
            has_more,
            next_cursor,
        } = store.query(&filters, page_size, cursor.as_deref())?;
        entries.extend(records.into_iter().map(|r| r.entry));
        if !has_more {
            break;
        }
        cursor = next_cursor;
    }

    let encoded = encode(&entries, format)?;

    match args.output {
        Some(path) => match write_export(Some(&path), &encoded)? {
            SaveOutcome::Saved(path) => {
                eprintln!("exported {} entries to {}", entries.len(), path.display());
            }
            SaveOutcome::Cancelled => {}
        },
        None => print!("{encoded}"),
    }
    Ok(())
}

/// `loupe stats`: storage statistics.
pub fn stats(db: PathBuf) -> anyhow::Result<()> {
    let store = SqliteLogStore::open(&db).context("opening log database")?;
    let stats = store.stats()?;

    println!("rows:       {}", stats.total_rows);
    println!(
        "oldest:     {}",
        stats.oldest_ts.map_or_else(|| "-".to_string(), format_timestamp)
    );
    println!(
        "newest:     {}",
        stats.newest_ts.map_or_else(|| "-".to_string(), format_timestamp)
    );
    println!("size:       {} bytes", stats.size_bytes);
    for (deployment, rows) in &stats.rows_by_deployment {
        println!("  {deployment}: {rows}");
    }
    Ok(())
}

/// `loupe prune`: apply retention now.
pub fn prune(db: PathBuf, days: Option<u32>) -> anyhow::Result<()> {
    let store = SqliteLogStore::open(&db).context("opening log database")?;
    let removed = match days {
        Some(days) => store.prune_older_than(days)?,
        None => store.prune(&store.settings()?.retention_policy())?,
    };
    println!("removed {removed} rows");
    Ok(())
}

/// `loupe clear`: delete stored rows.
pub fn clear(db: PathBuf, deployment: Option<String>) -> anyhow::Result<()> {
    let store = SqliteLogStore::open(&db).context("opening log database")?;
    match deployment {
        Some(deployment) => {
            let removed = store.clear_deployment(&deployment)?;
            println!("removed {removed} rows from {deployment}");
        }
        None => {
            store.clear_all()?;
            println!("cleared all stored logs");
        }
    }
    Ok(())
}

/// `loupe optimize`: compact and rebuild the search index.
pub fn optimize(db: PathBuf) -> anyhow::Result<()> {
    let store = SqliteLogStore::open(&db).context("opening log database")?;
    store.optimize()?;
    println!("database optimized");
    Ok(())
}
