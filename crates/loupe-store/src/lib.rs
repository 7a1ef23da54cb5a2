//! # loupe-store
//!
//! Durable, indexed local storage for polled log entries.
//!
//! This crate provides:
//!
//! - [`LogStorage`] — The backend trait shared by both stores
//! - [`SqliteLogStore`] — Embedded SQLite backend with full-text search
//! - [`MemoryLogStore`] — Non-durable backend for disabled persistence
//! - [`QueryFilters`] / [`Cursor`] — Filtering and keyset pagination
//! - [`RetentionPolicy`] and the background retention scheduler
//!
//! ## Example
//!
//! ```rust,no_run
//! use loupe_store::{LogStorage, QueryFilters, SqliteLogStore};
//!
//! # fn main() -> loupe_store::Result<()> {
//! let store = SqliteLogStore::open("logs.db")?;
//! let page = store.query(&QueryFilters::new().with_success(false), 50, None)?;
//! for record in &page.records {
//!     println!("{} {}", record.entry.timestamp, record.entry.id);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod retention;
mod sqlite;
mod traits;
mod types;

pub use error::{Result, StoreError};
pub use memory::MemoryLogStore;
pub use retention::{run_retention_pass, spawn_retention_task, DEFAULT_RETENTION_INTERVAL};
pub use sqlite::SqliteLogStore;
pub use traits::LogStorage;
pub use types::{
    now_ms, Cursor, IngestOutcome, QueryFilters, QueryPage, RetentionPolicy, StoreSettings,
    StoreStats, StoredLogRecord,
};
