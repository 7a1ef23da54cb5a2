//! Embedded SQLite backend.
//!
//! Schema: one `logs` table keyed by entry ID, secondary indices for the
//! filterable columns, an FTS5 virtual table over message content and
//! function identifiers kept in sync by triggers, and a `settings`
//! key/value table. Rows are immutable once inserted; dedup is
//! `INSERT OR IGNORE` on the primary key.

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, warn};

use loupe_core::{normalize::summary_message, LogEntry};

use crate::error::{Result, StoreError};
use crate::traits::LogStorage;
use crate::types::{
    now_ms, Cursor, IngestOutcome, QueryFilters, QueryPage, RetentionPolicy, StoreSettings,
    StoreStats, StoredLogRecord,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS logs (
    id TEXT PRIMARY KEY,
    ts INTEGER NOT NULL,
    deployment TEXT NOT NULL,
    request_id TEXT,
    function_path TEXT,
    function_name TEXT,
    udf_type TEXT NOT NULL,
    success INTEGER NOT NULL,
    duration_ms INTEGER,
    error TEXT,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    entry_json TEXT NOT NULL,
    stored_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_logs_ts ON logs(ts DESC);
CREATE INDEX IF NOT EXISTS idx_logs_deployment_ts ON logs(deployment, ts DESC);
CREATE INDEX IF NOT EXISTS idx_logs_request_id ON logs(request_id) WHERE request_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_logs_function_ts ON logs(function_path, ts DESC) WHERE function_path IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_logs_success_ts ON logs(success, ts DESC);

CREATE VIRTUAL TABLE IF NOT EXISTS logs_fts USING fts5(
    message,
    function_path,
    function_name,
    request_id,
    content='logs',
    content_rowid='rowid',
    tokenize='porter unicode61'
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR IGNORE INTO settings (key, value) VALUES ('enabled', 'true');
INSERT OR IGNORE INTO settings (key, value) VALUES ('retention_days', '30');
INSERT OR IGNORE INTO settings (key, value) VALUES ('max_rows_per_deployment', '50000');
";

// Rows are never updated in place, so insert/delete triggers suffice to
// keep the FTS index in sync.
const FTS_TRIGGERS: &str = "
CREATE TRIGGER logs_ai AFTER INSERT ON logs BEGIN
    INSERT INTO logs_fts(rowid, message, function_path, function_name, request_id)
    VALUES (new.rowid, new.message, new.function_path, new.function_name, new.request_id);
END;

CREATE TRIGGER logs_ad AFTER DELETE ON logs BEGIN
    INSERT INTO logs_fts(logs_fts, rowid, message, function_path, function_name, request_id)
    VALUES ('delete', old.rowid, old.message, old.function_path, old.function_name, old.request_id);
END;
";

/// Embedded SQLite log store.
pub struct SqliteLogStore {
    conn: Mutex<Connection>,
    stats_cache: Mutex<Option<StoreStats>>,
}

impl SqliteLogStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens a transient in-memory store, used in tests and for sessions
    /// with persistence disabled.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA foreign_keys=ON;
             PRAGMA cache_size=-64000;",
        )?;
        conn.execute_batch(SCHEMA)?;

        let triggers_exist: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='trigger' AND name='logs_ai'",
            [],
            |row| row.get(0),
        )?;
        if !triggers_exist {
            conn.execute_batch(FTS_TRIGGERS)?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            stats_cache: Mutex::new(None),
        })
    }

    /// Reclaims space and rebuilds the FTS index: WAL checkpoint, FTS
    /// rebuild, VACUUM.
    pub fn optimize(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        conn.execute("INSERT INTO logs_fts(logs_fts) VALUES('rebuild')", [])?;
        conn.execute("VACUUM", [])?;
        Ok(())
    }

    fn invalidate_stats(&self) {
        *self.stats_cache.lock() = None;
    }

    fn setting(conn: &Connection, key: &str) -> Result<Option<String>> {
        match conn.query_row(
            "SELECT value FROM settings WHERE key = ?",
            params![key],
            |row| row.get::<_, String>(0),
        ) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, i64, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    }

    fn parse_rows(raw: Vec<(String, i64, String)>) -> Vec<StoredLogRecord> {
        raw.into_iter()
            .filter_map(|(deployment_id, stored_at, entry_json)| {
                match serde_json::from_str::<LogEntry>(&entry_json) {
                    Ok(entry) => Some(StoredLogRecord {
                        entry,
                        deployment_id,
                        stored_at,
                    }),
                    Err(e) => {
                        warn!(error = %e, "skipping undecodable stored entry");
                        None
                    }
                }
            })
            .collect()
    }

    fn push_filters(
        filters: &QueryFilters,
        clauses: &mut Vec<String>,
        args: &mut Vec<Box<dyn rusqlite::ToSql>>,
    ) {
        if let Some(deployment) = &filters.deployment {
            clauses.push("logs.deployment = ?".to_string());
            args.push(Box::new(deployment.clone()));
        }
        if let Some(start) = filters.start_ts {
            clauses.push("logs.ts >= ?".to_string());
            args.push(Box::new(start));
        }
        if let Some(end) = filters.end_ts {
            clauses.push("logs.ts <= ?".to_string());
            args.push(Box::new(end));
        }
        if let Some(success) = filters.success {
            clauses.push("logs.success = ?".to_string());
            args.push(Box::new(i32::from(success)));
        }
        if let Some(path) = &filters.function_path {
            clauses.push("logs.function_path = ?".to_string());
            args.push(Box::new(path.clone()));
        }
        if let Some(request_id) = &filters.request_id {
            clauses.push("logs.request_id = ?".to_string());
            args.push(Box::new(request_id.clone()));
        }
    }

    fn push_cursor(
        cursor: Option<&str>,
        clauses: &mut Vec<String>,
        args: &mut Vec<Box<dyn rusqlite::ToSql>>,
    ) -> Result<()> {
        if let Some(token) = cursor {
            let cursor = Cursor::parse(token)?;
            clauses.push("(logs.ts < ? OR (logs.ts = ? AND logs.id < ?))".to_string());
            args.push(Box::new(cursor.ts));
            args.push(Box::new(cursor.ts));
            args.push(Box::new(cursor.id));
        }
        Ok(())
    }

    fn run_page_query(
        &self,
        sql: &str,
        args: &[Box<dyn rusqlite::ToSql>],
        limit: usize,
    ) -> Result<QueryPage> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let arg_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(AsRef::as_ref).collect();
        let raw: Vec<(String, i64, String)> = stmt
            .query_map(arg_refs.as_slice(), Self::row_to_record)?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        drop(conn);

        let mut records = Self::parse_rows(raw);
        let has_more = records.len() > limit;
        if has_more {
            records.truncate(limit);
        }
        let next_cursor = if has_more {
            records.last().map(|r| {
                Cursor {
                    ts: r.entry.timestamp,
                    id: r.entry.id.clone(),
                }
                .encode()
            })
        } else {
            None
        };

        Ok(QueryPage {
            records,
            has_more,
            next_cursor,
        })
    }
}

impl LogStorage for SqliteLogStore {
    fn ingest(&self, entries: &[LogEntry], deployment_id: &str) -> Result<IngestOutcome> {
        let mut outcome = IngestOutcome::default();
        let stored_at = now_ms();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO logs (
                    id, ts, deployment, request_id, function_path, function_name,
                    udf_type, success, duration_ms, error, level, message,
                    entry_json, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )?;

            for entry in entries {
                let entry_json = match serde_json::to_string(entry) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(id = %entry.id, error = %e, "failed to serialize entry");
                        outcome.errors += 1;
                        continue;
                    }
                };

                let result = stmt.execute(params![
                    entry.id,
                    entry.timestamp,
                    deployment_id,
                    entry.request_id,
                    entry.function_identifier,
                    entry.function_name,
                    entry.udf_type.as_str(),
                    i32::from(entry.success),
                    entry.duration_ms,
                    entry.error,
                    entry.severity().as_str(),
                    summary_message(entry),
                    entry_json,
                    stored_at,
                ]);

                match result {
                    Ok(0) => outcome.duplicates += 1,
                    Ok(_) => outcome.inserted += 1,
                    Err(e) => {
                        warn!(id = %entry.id, error = %e, "failed to insert entry");
                        outcome.errors += 1;
                    }
                }
            }
        }
        tx.commit()?;
        drop(conn);

        if outcome.inserted > 0 {
            self.invalidate_stats();
        }
        debug!(
            deployment = deployment_id,
            inserted = outcome.inserted,
            duplicates = outcome.duplicates,
            errors = outcome.errors,
            "ingested batch"
        );
        Ok(outcome)
    }

    fn query(
        &self,
        filters: &QueryFilters,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<QueryPage> {
        let limit = limit.clamp(1, 1000);
        let mut clauses = Vec::new();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        Self::push_filters(filters, &mut clauses, &mut args);
        Self::push_cursor(cursor, &mut clauses, &mut args)?;

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        // Fetch one extra row to detect further pages
        let sql = format!(
            "SELECT logs.deployment, logs.stored_at, logs.entry_json
             FROM logs {where_clause}
             ORDER BY logs.ts DESC, logs.id DESC
             LIMIT {}",
            limit + 1
        );

        self.run_page_query(&sql, &args, limit)
    }

    fn search(
        &self,
        text: &str,
        filters: &QueryFilters,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<QueryPage> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(StoreError::InvalidFilter("empty search query".to_string()));
        }
        // Quote the user text so FTS operators in it are matched literally
        let fts_query = format!("\"{}\"", trimmed.replace('"', "\"\""));

        let limit = limit.clamp(1, 1000);
        let mut clauses = vec!["logs_fts MATCH ?".to_string()];
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(fts_query)];

        Self::push_filters(filters, &mut clauses, &mut args);
        Self::push_cursor(cursor, &mut clauses, &mut args)?;

        let sql = format!(
            "SELECT logs.deployment, logs.stored_at, logs.entry_json
             FROM logs_fts
             JOIN logs ON logs.rowid = logs_fts.rowid
             WHERE {}
             ORDER BY logs.ts DESC, logs.id DESC
             LIMIT {}",
            clauses.join(" AND "),
            limit + 1
        );

        self.run_page_query(&sql, &args, limit)
    }

    fn get(&self, id: &str) -> Result<Option<StoredLogRecord>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            "SELECT deployment, stored_at, entry_json FROM logs WHERE id = ?",
            params![id],
            Self::row_to_record,
        );
        match result {
            Ok(raw) => Ok(Self::parse_rows(vec![raw]).into_iter().next()),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn prune(&self, policy: &RetentionPolicy) -> Result<u64> {
        let mut removed = 0u64;
        let cutoff = policy.cutoff_ms(now_ms());

        {
            let conn = self.conn.lock();

            removed += conn.execute("DELETE FROM logs WHERE ts < ?", params![cutoff])? as u64;

            // Per-deployment cap: oldest excess rows go first
            let over_cap: Vec<(String, u64)> = {
                let mut stmt = conn.prepare(
                    "SELECT deployment, COUNT(*) FROM logs
                     GROUP BY deployment HAVING COUNT(*) > ?",
                )?;
                stmt.query_map(params![policy.max_rows_per_deployment], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?
                .collect::<rusqlite::Result<_>>()?
            };

            for (deployment, count) in over_cap {
                let excess = count - policy.max_rows_per_deployment;
                removed += conn.execute(
                    "DELETE FROM logs WHERE deployment = ?1 AND id IN (
                        SELECT id FROM logs WHERE deployment = ?1
                        ORDER BY ts ASC, id ASC LIMIT ?2
                    )",
                    params![deployment, excess],
                )? as u64;
            }

            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        }

        if removed > 0 {
            self.invalidate_stats();
            debug!(removed, "retention pass removed rows");
        }
        Ok(removed)
    }

    fn prune_older_than(&self, days: u32) -> Result<u64> {
        let cutoff = now_ms() - i64::from(days) * 24 * 60 * 60 * 1000;
        let removed = {
            let conn = self.conn.lock();
            let removed = conn.execute("DELETE FROM logs WHERE ts < ?", params![cutoff])? as u64;
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
            removed
        };
        if removed > 0 {
            self.invalidate_stats();
        }
        Ok(removed)
    }

    fn stats(&self) -> Result<StoreStats> {
        if let Some(cached) = self.stats_cache.lock().clone() {
            return Ok(cached);
        }

        let stats = {
            let conn = self.conn.lock();

            let total_rows: u64 =
                conn.query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))?;
            let oldest_ts: Option<i64> =
                conn.query_row("SELECT MIN(ts) FROM logs", [], |row| row.get(0))?;
            let newest_ts: Option<i64> =
                conn.query_row("SELECT MAX(ts) FROM logs", [], |row| row.get(0))?;

            let page_count: u64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
            let page_size: u64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;

            let rows_by_deployment: Vec<(String, u64)> = {
                let mut stmt = conn.prepare(
                    "SELECT deployment, COUNT(*) FROM logs GROUP BY deployment ORDER BY deployment",
                )?;
                stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<_>>()?
            };

            StoreStats {
                total_rows,
                oldest_ts,
                newest_ts,
                size_bytes: page_count * page_size,
                rows_by_deployment,
            }
        };

        *self.stats_cache.lock() = Some(stats.clone());
        Ok(stats)
    }

    fn settings(&self) -> Result<StoreSettings> {
        let conn = self.conn.lock();
        let defaults = StoreSettings::default();

        let enabled = Self::setting(&conn, "enabled")?
            .map_or(defaults.enabled, |v| v == "true");
        let retention_days = Self::setting(&conn, "retention_days")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.retention_days);
        let max_rows_per_deployment = Self::setting(&conn, "max_rows_per_deployment")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_rows_per_deployment);

        Ok(StoreSettings {
            enabled,
            retention_days,
            max_rows_per_deployment,
        })
    }

    fn set_settings(&self, settings: &StoreSettings) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('enabled', ?)",
            params![if settings.enabled { "true" } else { "false" }],
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('retention_days', ?)",
            params![settings.retention_days.to_string()],
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES ('max_rows_per_deployment', ?)",
            params![settings.max_rows_per_deployment.to_string()],
        )?;
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        {
            let conn = self.conn.lock();
            conn.execute("DELETE FROM logs", [])?;
            conn.execute("VACUUM", [])?;
        }
        self.invalidate_stats();
        Ok(())
    }

    fn clear_deployment(&self, deployment_id: &str) -> Result<u64> {
        let removed = {
            let conn = self.conn.lock();
            let removed = conn.execute(
                "DELETE FROM logs WHERE deployment = ?",
                params![deployment_id],
            )? as u64;
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
            removed
        };
        self.invalidate_stats();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loupe_core::{LogLine, UdfType, UsageStats};

    fn make_entry(id: &str, ts: i64) -> LogEntry {
        LogEntry {
            id: id.to_string(),
            timestamp: ts,
            request_id: Some(format!("req-{id}")),
            execution_id: None,
            parent_execution_id: None,
            function_identifier: Some("messages:send".to_string()),
            function_name: Some("send".to_string()),
            udf_type: UdfType::Mutation,
            success: true,
            duration_ms: Some(5),
            error: None,
            log_lines: vec![LogLine::plain(format!("message body {id}"))],
            usage: UsageStats::default(),
            cached_result: false,
            component_path: None,
            caller: None,
            environment: None,
            identity_type: None,
            return_bytes: None,
        }
    }

    fn open_store() -> SqliteLogStore {
        SqliteLogStore::open_in_memory().expect("open in-memory store")
    }

    #[test]
    fn ingest_reports_inserted_and_duplicates() {
        let store = open_store();
        let batch = vec![make_entry("a", 1), make_entry("b", 2), make_entry("c", 3)];

        let first = store.ingest(&batch, "dep-1").expect("ingest");
        assert_eq!(first.inserted, 3);
        assert_eq!(first.duplicates, 0);

        let second = store
            .ingest(&[make_entry("b", 2), make_entry("d", 4)], "dep-1")
            .expect("ingest");
        assert_eq!(second.inserted, 1);
        assert_eq!(second.duplicates, 1);

        let page = store
            .query(&QueryFilters::new(), 10, None)
            .expect("query");
        let mut ids: Vec<String> = page.records.iter().map(|r| r.entry.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn replaying_batch_is_noop() {
        let store = open_store();
        let batch = vec![make_entry("a", 1), make_entry("b", 2)];

        store.ingest(&batch, "dep-1").expect("first ingest");
        let replay = store.ingest(&batch, "dep-1").expect("replay");

        assert_eq!(replay.inserted, 0);
        assert_eq!(replay.duplicates, 2);
        assert_eq!(store.stats().expect("stats").total_rows, 2);
    }

    #[test]
    fn query_descending_with_cursor_pagination() {
        let store = open_store();
        let batch: Vec<LogEntry> = (0..10).map(|i| make_entry(&format!("e{i}"), i)).collect();
        store.ingest(&batch, "dep-1").expect("ingest");

        let first = store.query(&QueryFilters::new(), 4, None).expect("page 1");
        assert_eq!(first.records.len(), 4);
        assert!(first.has_more);
        let ts: Vec<i64> = first.records.iter().map(|r| r.entry.timestamp).collect();
        assert_eq!(ts, vec![9, 8, 7, 6]);

        let cursor = first.next_cursor.expect("cursor");
        let second = store
            .query(&QueryFilters::new(), 4, Some(&cursor))
            .expect("page 2");
        let ts: Vec<i64> = second.records.iter().map(|r| r.entry.timestamp).collect();
        assert_eq!(ts, vec![5, 4, 3, 2]);
    }

    #[test]
    fn cursor_stable_under_concurrent_inserts() {
        let store = open_store();
        store
            .ingest(
                &(0..6).map(|i| make_entry(&format!("e{i}"), i)).collect::<Vec<_>>(),
                "dep-1",
            )
            .expect("ingest");

        let first = store.query(&QueryFilters::new(), 3, None).expect("page 1");
        let cursor = first.next_cursor.expect("cursor");

        // Newer rows arriving between pages must not shift the next page
        store
            .ingest(&[make_entry("new", 100)], "dep-1")
            .expect("concurrent insert");

        let second = store
            .query(&QueryFilters::new(), 3, Some(&cursor))
            .expect("page 2");
        let ts: Vec<i64> = second.records.iter().map(|r| r.entry.timestamp).collect();
        assert_eq!(ts, vec![2, 1, 0]);
    }

    #[test]
    fn query_filters_apply() {
        let store = open_store();
        let mut failed = make_entry("f", 5);
        failed.success = false;
        failed.error = Some("boom".to_string());
        store
            .ingest(&[make_entry("a", 1), failed], "dep-1")
            .expect("ingest");
        store
            .ingest(&[make_entry("other", 2)], "dep-2")
            .expect("ingest");

        let page = store
            .query(&QueryFilters::new().with_deployment("dep-1"), 10, None)
            .expect("query");
        assert_eq!(page.records.len(), 2);

        let page = store
            .query(&QueryFilters::new().with_success(false), 10, None)
            .expect("query");
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].entry.id, "f");

        let page = store
            .query(&QueryFilters::new().with_request_id("req-a"), 10, None)
            .expect("query");
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].entry.id, "a");
    }

    #[test]
    fn search_matches_message_text() {
        let store = open_store();
        let mut entry = make_entry("a", 1);
        entry.log_lines = vec![LogLine::plain("database connection refused")];
        store
            .ingest(&[entry, make_entry("b", 2)], "dep-1")
            .expect("ingest");

        let page = store
            .search("connection", &QueryFilters::new(), 10, None)
            .expect("search");
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].entry.id, "a");
    }

    #[test]
    fn search_rejects_empty_query() {
        let store = open_store();
        let result = store.search("   ", &QueryFilters::new(), 10, None);
        assert!(matches!(result, Err(StoreError::InvalidFilter(_))));
    }

    #[test]
    fn search_honors_cursor_contract() {
        let store = open_store();
        let batch: Vec<LogEntry> = (0..6)
            .map(|i| {
                let mut e = make_entry(&format!("e{i}"), i);
                e.log_lines = vec![LogLine::plain("needle in haystack")];
                e
            })
            .collect();
        store.ingest(&batch, "dep-1").expect("ingest");

        let first = store
            .search("needle", &QueryFilters::new(), 4, None)
            .expect("page 1");
        assert_eq!(first.records.len(), 4);
        assert!(first.has_more);

        let cursor = first.next_cursor.expect("cursor");
        let second = store
            .search("needle", &QueryFilters::new(), 4, Some(&cursor))
            .expect("page 2");
        assert_eq!(second.records.len(), 2);
        assert!(!second.has_more);
    }

    #[test]
    fn deleted_rows_leave_search_index() {
        let store = open_store();
        let mut entry = make_entry("a", 1);
        entry.log_lines = vec![LogLine::plain("ephemeral text")];
        store.ingest(&[entry], "dep-1").expect("ingest");

        store.clear_all().expect("clear");
        let page = store
            .search("ephemeral", &QueryFilters::new(), 10, None)
            .expect("search");
        assert!(page.records.is_empty());
    }

    #[test]
    fn get_by_id() {
        let store = open_store();
        store.ingest(&[make_entry("a", 1)], "dep-1").expect("ingest");

        let record = store.get("a").expect("get").expect("present");
        assert_eq!(record.entry.id, "a");
        assert_eq!(record.deployment_id, "dep-1");

        assert!(store.get("missing").expect("get").is_none());
    }

    #[test]
    fn prune_removes_old_rows() {
        let store = open_store();
        let day_ms = 24 * 60 * 60 * 1000;
        let now = now_ms();

        store
            .ingest(
                &[
                    make_entry("day1", now - day_ms),
                    make_entry("day8", now - 8 * day_ms),
                    make_entry("day30", now - 30 * day_ms),
                ],
                "dep-1",
            )
            .expect("ingest");

        let removed = store.prune_older_than(7).expect("prune");
        assert_eq!(removed, 2);

        let page = store.query(&QueryFilters::new(), 10, None).expect("query");
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].entry.id, "day1");
    }

    #[test]
    fn prune_enforces_row_cap_oldest_first() {
        let store = open_store();
        let batch: Vec<LogEntry> = (0..10).map(|i| make_entry(&format!("e{i}"), i)).collect();
        store.ingest(&batch, "dep-1").expect("ingest");

        let removed = store
            .prune(&RetentionPolicy {
                retention_days: 365,
                max_rows_per_deployment: 6,
            })
            .expect("prune");
        assert_eq!(removed, 4);

        let page = store.query(&QueryFilters::new(), 10, None).expect("query");
        let ts: Vec<i64> = page.records.iter().map(|r| r.entry.timestamp).collect();
        assert_eq!(ts, vec![9, 8, 7, 6, 5, 4]);
    }

    #[test]
    fn prune_combines_both_policies() {
        let store = open_store();
        let day_ms = 24 * 60 * 60 * 1000;
        let now = now_ms();

        let mut batch: Vec<LogEntry> = (0..5)
            .map(|i| make_entry(&format!("recent{i}"), now - i64::from(i)))
            .collect();
        batch.push(make_entry("ancient", now - 40 * day_ms));
        store.ingest(&batch, "dep-1").expect("ingest");

        let removed = store
            .prune(&RetentionPolicy {
                retention_days: 30,
                max_rows_per_deployment: 3,
            })
            .expect("prune");
        // One by age, two by cap
        assert_eq!(removed, 3);
        assert_eq!(store.stats().expect("stats").total_rows, 3);
    }

    #[test]
    fn stats_reflect_contents_and_invalidate_on_clear() {
        let store = open_store();
        store
            .ingest(&[make_entry("a", 10), make_entry("b", 20)], "dep-1")
            .expect("ingest");
        store.ingest(&[make_entry("c", 30)], "dep-2").expect("ingest");

        let stats = store.stats().expect("stats");
        assert_eq!(stats.total_rows, 3);
        assert_eq!(stats.oldest_ts, Some(10));
        assert_eq!(stats.newest_ts, Some(30));
        assert!(stats.size_bytes > 0);
        assert_eq!(
            stats.rows_by_deployment,
            vec![("dep-1".to_string(), 2), ("dep-2".to_string(), 1)]
        );

        let removed = store.clear_deployment("dep-1").expect("clear");
        assert_eq!(removed, 2);
        assert_eq!(store.stats().expect("stats").total_rows, 1);

        store.clear_all().expect("clear all");
        let stats = store.stats().expect("stats");
        assert_eq!(stats.total_rows, 0);
        assert_eq!(stats.oldest_ts, None);
    }

    #[test]
    fn settings_roundtrip_with_defaults() {
        let store = open_store();
        assert_eq!(store.settings().expect("settings"), StoreSettings::default());

        let custom = StoreSettings {
            enabled: false,
            retention_days: 7,
            max_rows_per_deployment: 123,
        };
        store.set_settings(&custom).expect("set");
        assert_eq!(store.settings().expect("settings"), custom);
    }

    #[test]
    fn optimize_runs() {
        let store = open_store();
        store.ingest(&[make_entry("a", 1)], "dep-1").expect("ingest");
        store.optimize().expect("optimize");
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs.db");

        {
            let store = SqliteLogStore::open(&path).expect("open");
            store.ingest(&[make_entry("a", 1)], "dep-1").expect("ingest");
        }

        let store = SqliteLogStore::open(&path).expect("reopen");
        assert_eq!(store.stats().expect("stats").total_rows, 1);
        assert!(store.get("a").expect("get").is_some());
    }
}
