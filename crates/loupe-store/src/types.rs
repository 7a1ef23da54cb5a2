//! Records, filters, pagination, and policy types for the log store.
//!
//! This module provides:
//! - [`StoredLogRecord`] — A log entry as persisted, scoped to a deployment
//! - [`QueryFilters`] — Filter criteria for queries and searches
//! - [`Cursor`] — Keyset pagination token (`ts:id`)
//! - [`QueryPage`] / [`IngestOutcome`] / [`StoreStats`] — Operation results
//! - [`StoreSettings`] / [`RetentionPolicy`] — Persistence configuration

use loupe_core::LogEntry;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// A log entry as persisted in the local store.
///
/// Unique on `entry.id`; always scoped to a `deployment_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLogRecord {
    /// The canonical entry
    pub entry: LogEntry,
    /// Deployment the entry was polled from
    pub deployment_id: String,
    /// Insertion time, epoch milliseconds
    pub stored_at: i64,
}

/// Filter criteria for [`crate::LogStorage::query`] and
/// [`crate::LogStorage::search`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Restrict to one deployment; queries are deployment-scoped unless
    /// explicitly global
    pub deployment: Option<String>,
    /// Inclusive lower bound on entry timestamp, epoch milliseconds
    pub start_ts: Option<i64>,
    /// Inclusive upper bound on entry timestamp, epoch milliseconds
    pub end_ts: Option<i64>,
    /// Only successes (`true`) or failures (`false`)
    pub success: Option<bool>,
    /// Exact function identifier match
    pub function_path: Option<String>,
    /// Exact request ID match
    pub request_id: Option<String>,
}

impl QueryFilters {
    /// Creates an empty filter matching every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one deployment.
    #[must_use]
    pub fn with_deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }

    /// Restricts to a time range (either bound optional, inclusive).
    #[must_use]
    pub const fn with_time_range(mut self, start_ts: Option<i64>, end_ts: Option<i64>) -> Self {
        self.start_ts = start_ts;
        self.end_ts = end_ts;
        self
    }

    /// Restricts to successes or failures.
    #[must_use]
    pub const fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// Restricts to one function path.
    #[must_use]
    pub fn with_function_path(mut self, path: impl Into<String>) -> Self {
        self.function_path = Some(path.into());
        self
    }

    /// Restricts to one request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Checks a stored record against these filters.
    ///
    /// The in-memory backend evaluates filters with this; the SQLite backend
    /// compiles them to a WHERE clause with the same semantics.
    #[must_use]
    pub fn matches(&self, record: &StoredLogRecord) -> bool {
        if let Some(deployment) = &self.deployment {
            if &record.deployment_id != deployment {
                return false;
            }
        }
        if let Some(start) = self.start_ts {
            if record.entry.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end_ts {
            if record.entry.timestamp > end {
                return false;
            }
        }
        if let Some(success) = self.success {
            if record.entry.success != success {
                return false;
            }
        }
        if let Some(path) = &self.function_path {
            if record.entry.function_identifier.as_deref() != Some(path.as_str()) {
                return false;
            }
        }
        if let Some(request_id) = &self.request_id {
            if record.entry.request_id.as_deref() != Some(request_id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Keyset pagination token over `(timestamp, id)` descending.
///
/// Keyset cursors stay stable while new rows are inserted concurrently,
/// which offset pagination does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Timestamp of the last row on the previous page
    pub ts: i64,
    /// ID of the last row on the previous page
    pub id: String,
}

impl Cursor {
    /// Encodes as the wire form `ts:id`.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{}:{}", self.ts, self.id)
    }

    /// Parses the wire form. The ID part may itself contain colons.
    pub fn parse(token: &str) -> Result<Self> {
        let (ts, id) = token
            .split_once(':')
            .ok_or_else(|| StoreError::InvalidCursor(token.to_string()))?;
        let ts = ts
            .parse::<i64>()
            .map_err(|_| StoreError::InvalidCursor(token.to_string()))?;
        if id.is_empty() {
            return Err(StoreError::InvalidCursor(token.to_string()));
        }
        Ok(Self {
            ts,
            id: id.to_string(),
        })
    }

    /// Whether a row sorts strictly after this cursor in descending order.
    #[must_use]
    pub fn admits(&self, ts: i64, id: &str) -> bool {
        ts < self.ts || (ts == self.ts && id < self.id.as_str())
    }
}

/// One page of query or search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPage {
    /// Matching records, descending by timestamp
    pub records: Vec<StoredLogRecord>,
    /// Whether more pages exist
    pub has_more: bool,
    /// Cursor for the next page, if any
    pub next_cursor: Option<String>,
}

/// Result of a deduplicating ingest batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Records newly inserted
    pub inserted: usize,
    /// Records skipped because their ID already existed
    pub duplicates: usize,
    /// Records that failed individually; the batch continues past them
    pub errors: usize,
}

/// Aggregate statistics about the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Total stored rows
    pub total_rows: u64,
    /// Oldest entry timestamp, epoch milliseconds
    pub oldest_ts: Option<i64>,
    /// Newest entry timestamp, epoch milliseconds
    pub newest_ts: Option<i64>,
    /// Approximate on-disk size in bytes
    pub size_bytes: u64,
    /// Row counts per deployment
    pub rows_by_deployment: Vec<(String, u64)>,
}

/// Persistence settings, stored alongside the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Whether new entries are persisted at all
    pub enabled: bool,
    /// Age-based retention window, days
    pub retention_days: u32,
    /// Count-based cap per deployment
    pub max_rows_per_deployment: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 30,
            max_rows_per_deployment: 50_000,
        }
    }
}

impl StoreSettings {
    /// The retention policy implied by these settings.
    #[must_use]
    pub const fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            retention_days: self.retention_days,
            max_rows_per_deployment: self.max_rows_per_deployment,
        }
    }
}

/// Retention pruning policy: age window plus per-deployment row cap.
/// Both may fire in the same pruning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Rows older than this many days are removed regardless of count
    pub retention_days: u32,
    /// When a deployment exceeds this, its oldest excess rows are removed
    pub max_rows_per_deployment: u64,
}

impl RetentionPolicy {
    /// Cutoff timestamp for the age window, relative to `now_ms`.
    #[must_use]
    pub const fn cutoff_ms(&self, now_ms: i64) -> i64 {
        now_ms - (self.retention_days as i64) * 24 * 60 * 60 * 1000
    }
}

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
