//! In-memory backend.
//!
//! Used for sessions with persistence disabled and as a lightweight test
//! double. Shares filter, cursor, and retention semantics with the SQLite
//! backend through [`QueryFilters::matches`] and [`Cursor::admits`].

use std::collections::HashMap;

use parking_lot::RwLock;

use loupe_core::LogEntry;

use crate::error::{Result, StoreError};
use crate::traits::LogStorage;
use crate::types::{
    now_ms, Cursor, IngestOutcome, QueryFilters, QueryPage, RetentionPolicy, StoreSettings,
    StoreStats, StoredLogRecord,
};

/// Non-durable log store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    records: RwLock<HashMap<String, StoredLogRecord>>,
    settings: RwLock<StoreSettings>,
}

impl MemoryLogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn page(
        &self,
        filters: &QueryFilters,
        limit: usize,
        cursor: Option<&str>,
        text: Option<&str>,
    ) -> Result<QueryPage> {
        let limit = limit.clamp(1, 1000);
        let cursor = cursor.map(Cursor::parse).transpose()?;

        let records = self.records.read();
        let mut matching: Vec<StoredLogRecord> = records
            .values()
            .filter(|r| filters.matches(r))
            .filter(|r| {
                cursor
                    .as_ref()
                    .is_none_or(|c| c.admits(r.entry.timestamp, &r.entry.id))
            })
            .filter(|r| text.is_none_or(|needle| record_contains(r, needle)))
            .cloned()
            .collect();
        drop(records);

        matching.sort_by(|a, b| {
            b.entry
                .timestamp
                .cmp(&a.entry.timestamp)
                .then_with(|| b.entry.id.cmp(&a.entry.id))
        });

        let has_more = matching.len() > limit;
        matching.truncate(limit);
        let next_cursor = if has_more {
            matching.last().map(|r| {
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
            records: matching,
            has_more,
            next_cursor,
        })
    }
}

/// Case-insensitive containment over the same fields the SQLite FTS index
/// covers.
fn record_contains(record: &StoredLogRecord, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    let haystacks = [
        Some(loupe_core::summary_message(&record.entry)),
        record.entry.function_identifier.clone(),
        record.entry.function_name.clone(),
        record.entry.request_id.clone(),
    ];
    haystacks
        .into_iter()
        .flatten()
        .any(|h| h.to_lowercase().contains(&needle))
}

impl LogStorage for MemoryLogStore {
    fn ingest(&self, entries: &[LogEntry], deployment_id: &str) -> Result<IngestOutcome> {
        let mut outcome = IngestOutcome::default();
        let stored_at = now_ms();

        let mut records = self.records.write();
        for entry in entries {
            if records.contains_key(&entry.id) {
                outcome.duplicates += 1;
                continue;
            }
            records.insert(
                entry.id.clone(),
                StoredLogRecord {
                    entry: entry.clone(),
                    deployment_id: deployment_id.to_string(),
                    stored_at,
                },
            );
            outcome.inserted += 1;
        }
        Ok(outcome)
    }

    fn query(
        &self,
        filters: &QueryFilters,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<QueryPage> {
        self.page(filters, limit, cursor, None)
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
        self.page(filters, limit, cursor, Some(trimmed))
    }

    fn get(&self, id: &str) -> Result<Option<StoredLogRecord>> {
        Ok(self.records.read().get(id).cloned())
    }

    fn prune(&self, policy: &RetentionPolicy) -> Result<u64> {
        let cutoff = policy.cutoff_ms(now_ms());
        let mut records = self.records.write();
        let before = records.len();

        records.retain(|_, r| r.entry.timestamp >= cutoff);

        // Per-deployment cap: drop the oldest excess rows
        let mut by_deployment: HashMap<String, Vec<(i64, String)>> = HashMap::new();
        for record in records.values() {
            by_deployment
                .entry(record.deployment_id.clone())
                .or_default()
                .push((record.entry.timestamp, record.entry.id.clone()));
        }
        for keys in by_deployment.values_mut() {
            if keys.len() as u64 > policy.max_rows_per_deployment {
                keys.sort();
                let excess = keys.len() - policy.max_rows_per_deployment as usize;
                for (_, id) in keys.drain(..excess) {
                    records.remove(&id);
                }
            }
        }

        Ok((before - records.len()) as u64)
    }

    fn prune_older_than(&self, days: u32) -> Result<u64> {
        let cutoff = now_ms() - i64::from(days) * 24 * 60 * 60 * 1000;
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| r.entry.timestamp >= cutoff);
        Ok((before - records.len()) as u64)
    }

    fn stats(&self) -> Result<StoreStats> {
        let records = self.records.read();

        let mut rows_by_deployment: HashMap<String, u64> = HashMap::new();
        let mut oldest_ts = None;
        let mut newest_ts = None;
        let mut size_bytes = 0u64;

        for record in records.values() {
            *rows_by_deployment
                .entry(record.deployment_id.clone())
                .or_default() += 1;
            let ts = record.entry.timestamp;
            oldest_ts = Some(oldest_ts.map_or(ts, |o: i64| o.min(ts)));
            newest_ts = Some(newest_ts.map_or(ts, |n: i64| n.max(ts)));
            size_bytes += serde_json::to_string(&record.entry)
                .map(|s| s.len() as u64)
                .unwrap_or(0);
        }

        let mut rows_by_deployment: Vec<(String, u64)> = rows_by_deployment.into_iter().collect();
        rows_by_deployment.sort();

        Ok(StoreStats {
            total_rows: records.len() as u64,
            oldest_ts,
            newest_ts,
            size_bytes,
            rows_by_deployment,
        })
    }

    fn settings(&self) -> Result<StoreSettings> {
        Ok(self.settings.read().clone())
    }

    fn set_settings(&self, settings: &StoreSettings) -> Result<()> {
        *self.settings.write() = settings.clone();
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.records.write().clear();
        Ok(())
    }

    fn clear_deployment(&self, deployment_id: &str) -> Result<u64> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| r.deployment_id != deployment_id);
        Ok((before - records.len()) as u64)
    }
}
