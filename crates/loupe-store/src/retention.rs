//! Background retention scheduler.
//!
//! Runs one pruning pass at startup, then one per interval. Settings are
//! re-read each cycle so changes apply without a restart.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::traits::LogStorage;

/// Default pruning interval: once a day.
pub const DEFAULT_RETENTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Spawns the retention loop on the current runtime.
///
/// Prunes immediately, then every `period`. Aborting the returned handle
/// stops the loop.
pub fn spawn_retention_task(
    store: Arc<dyn LogStorage>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            run_retention_pass(store.as_ref());
        }
    })
}

/// One pruning pass with the policy currently in settings.
pub fn run_retention_pass(store: &dyn LogStorage) {
    let policy = match store.settings() {
        Ok(settings) => settings.retention_policy(),
        Err(e) => {
            error!(error = %e, "failed to read retention settings");
            return;
        }
    };

    match store.prune(&policy) {
        Ok(0) => debug!("retention pass found nothing to remove"),
        Ok(removed) => info!(
            removed,
            retention_days = policy.retention_days,
            "retention pass removed rows"
        ),
        Err(e) => error!(error = %e, "retention pass failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLogStore;
    use crate::types::{now_ms, QueryFilters, StoreSettings};
    use loupe_core::{LogEntry, UdfType, UsageStats};

    fn make_entry(id: &str, ts: i64) -> LogEntry {
        LogEntry {
            id: id.to_string(),
            timestamp: ts,
            request_id: None,
            execution_id: None,
            parent_execution_id: None,
            function_identifier: None,
            function_name: None,
            udf_type: UdfType::Query,
            success: true,
            duration_ms: None,
            error: None,
            log_lines: Vec::new(),
            usage: UsageStats::default(),
            cached_result: false,
            component_path: None,
            caller: None,
            environment: None,
            identity_type: None,
            return_bytes: None,
        }
    }

    #[test]
    fn pass_uses_current_settings() {
        let store = MemoryLogStore::new();
        let day_ms = 24 * 60 * 60 * 1000;
        let now = now_ms();
        store
            .ingest(
                &[
                    make_entry("fresh", now),
                    make_entry("stale", now - 10 * day_ms),
                ],
                "dep-1",
            )
            .expect("ingest");
        store
            .set_settings(&StoreSettings {
                enabled: true,
                retention_days: 7,
                max_rows_per_deployment: 1000,
            })
            .expect("set settings");

        run_retention_pass(&store);

        let page = store.query(&QueryFilters::new(), 10, None).expect("query");
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].entry.id, "fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_prunes_on_startup_and_each_period() {
        let store = Arc::new(MemoryLogStore::new());
        let day_ms = 24 * 60 * 60 * 1000;
        store
            .ingest(&[make_entry("old", now_ms() - 60 * day_ms)], "dep-1")
            .expect("ingest");

        let handle = spawn_retention_task(store.clone(), Duration::from_secs(3600));
        // First tick fires immediately
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.stats().expect("stats").total_rows, 0);

        store
            .ingest(&[make_entry("old2", now_ms() - 60 * day_ms)], "dep-1")
            .expect("ingest");
        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert_eq!(store.stats().expect("stats").total_rows, 0);

        handle.abort();
    }
}
