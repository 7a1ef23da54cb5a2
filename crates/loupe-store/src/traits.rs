//! The storage backend trait.
//!
//! Two interchangeable backends implement [`LogStorage`]: the embedded
//! SQLite store ([`crate::SqliteLogStore`]) and the in-memory store
//! ([`crate::MemoryLogStore`]). Retention, cursor, and filter semantics are
//! shared; only the engine differs.

use loupe_core::LogEntry;

use crate::error::Result;
use crate::types::{
    IngestOutcome, QueryFilters, QueryPage, RetentionPolicy, StoreSettings, StoreStats,
    StoredLogRecord,
};

/// Durable, indexed log storage scoped by deployment.
pub trait LogStorage: Send + Sync {
    /// Inserts a batch of entries, deduplicating by entry ID.
    ///
    /// An existing ID counts as a duplicate and is skipped, never
    /// overwritten; replaying a batch is a no-op on the second pass.
    /// Individual record failures are counted and do not abort the batch.
    fn ingest(&self, entries: &[LogEntry], deployment_id: &str) -> Result<IngestOutcome>;

    /// Queries records matching the filters, newest first, with keyset
    /// pagination. `cursor` is a token from a previous page.
    fn query(&self, filters: &QueryFilters, limit: usize, cursor: Option<&str>)
    -> Result<QueryPage>;

    /// Full-text search over message content and function identifiers.
    /// Same pagination contract as [`LogStorage::query`].
    fn search(
        &self,
        text: &str,
        filters: &QueryFilters,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<QueryPage>;

    /// Fetches a single record by entry ID.
    fn get(&self, id: &str) -> Result<Option<StoredLogRecord>>;

    /// Applies both retention policies (age window and per-deployment row
    /// cap) in one pass. Returns the total rows removed.
    fn prune(&self, policy: &RetentionPolicy) -> Result<u64>;

    /// Removes rows older than `days`. Returns the rows removed.
    fn prune_older_than(&self, days: u32) -> Result<u64>;

    /// Aggregate statistics.
    fn stats(&self) -> Result<StoreStats>;

    /// Current persistence settings.
    fn settings(&self) -> Result<StoreSettings>;

    /// Replaces the persistence settings.
    fn set_settings(&self, settings: &StoreSettings) -> Result<()>;

    /// Irreversibly removes every record. Invalidates cached statistics.
    fn clear_all(&self) -> Result<()>;

    /// Irreversibly removes one deployment's records. Returns the rows
    /// removed. Invalidates cached statistics.
    fn clear_deployment(&self, deployment_id: &str) -> Result<u64>;
}
