//! One deployment connection, composed.
//!
//! [`LogSession`] owns the poller loop, the live merge buffer, the cursor,
//! and a storage handle, with an explicit `start()`/`stop()` lifecycle.
//! No ambient globals; whatever composes the UI owns the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use loupe_core::{LogEntry, PollCursor};
use loupe_store::{now_ms, LogStorage};
use loupe_timeline::MergeBuffer;

use crate::backoff::{BackoffConfig, BackoffPolicy};
use crate::poller::LogPoller;
use crate::scheduler::{PollEvent, PollGate, Scheduler, SchedulerState};

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deployment the session is connected to; scopes stored rows.
    pub deployment_id: String,
    /// Entries requested per poll.
    pub poll_limit: usize,
    /// Live buffer capacity.
    pub buffer_capacity: usize,
    /// Delay policy.
    pub backoff: BackoffConfig,
    /// Whether polled entries are written to the store.
    pub persist: bool,
}

impl SessionConfig {
    /// Defaults for one deployment.
    #[must_use]
    pub fn new(deployment_id: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            poll_limit: 50,
            buffer_capacity: loupe_timeline::DEFAULT_BUFFER_CAPACITY,
            backoff: BackoffConfig::default(),
            persist: true,
        }
    }
}

/// What the session reports to its consumer.
#[derive(Debug)]
pub enum SessionEvent {
    /// New entries landed in the live buffer.
    Entries(Vec<LogEntry>),
    /// The connection was lost (edge-triggered).
    Disconnected,
    /// The connection recovered (edge-triggered).
    Reconnected,
}

/// A running connection to one deployment's log stream.
pub struct LogSession {
    config: SessionConfig,
    buffer: Arc<Mutex<MergeBuffer>>,
    cleared: Arc<Mutex<Vec<i64>>>,
    store: Arc<dyn LogStorage>,
    gate: PollGate,
    connected: Arc<AtomicBool>,
    state_rx: watch::Receiver<SchedulerState>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl LogSession {
    /// Starts polling immediately and returns the session plus its event
    /// stream.
    pub fn start<P: LogPoller + 'static>(
        poller: P,
        store: Arc<dyn LogStorage>,
        config: SessionConfig,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let buffer = Arc::new(Mutex::new(MergeBuffer::new(config.buffer_capacity)));
        let cleared = Arc::new(Mutex::new(Vec::new()));
        let gate = PollGate::open();
        let shutdown = CancellationToken::new();
        let connected = Arc::new(AtomicBool::new(true));

        let (poll_tx, poll_rx) = mpsc::channel(64);
        let (session_tx, session_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);

        let scheduler = Scheduler::new(
            poller,
            BackoffPolicy::new(config.backoff.clone()),
            PollCursor::initial(),
            config.poll_limit,
            gate.subscribe(),
            poll_tx,
            state_tx,
            shutdown.clone(),
        );

        let mut tasks = vec![tokio::spawn(scheduler.run())];
        tasks.push(tokio::spawn(fan_out(
            poll_rx,
            session_tx,
            Arc::clone(&buffer),
            Arc::clone(&connected),
            if config.persist {
                Some(Arc::clone(&store))
            } else {
                None
            },
            config.deployment_id.clone(),
        )));

        info!(deployment = %config.deployment_id, "session started");
        let session = Self {
            config,
            buffer,
            cleared,
            store,
            gate,
            connected,
            state_rx,
            shutdown,
            tasks,
        };
        (session, session_rx)
    }

    /// Stops the loop, cancelling any in-flight poll. Never reports the
    /// cancellation as an error.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!(deployment = %self.config.deployment_id, "session stopped");
    }

    /// Current live entries, descending by timestamp.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.buffer.lock().entries().to_vec()
    }

    /// Wipes the live buffer and records a cleared timestamp for the
    /// timeline. The cursor is untouched; only new entries appear after.
    pub fn clear_logs(&self) {
        self.cleared.lock().push(now_ms());
        self.buffer.lock().clear();
    }

    /// Timestamps of past [`LogSession::clear_logs`] calls, for the
    /// interleaver's cleared-marker floor.
    #[must_use]
    pub fn cleared_timestamps(&self) -> Vec<i64> {
        self.cleared.lock().clone()
    }

    /// Whether the last polls have been succeeding.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Controls for pausing, visibility, and credential presence.
    #[must_use]
    pub const fn gate(&self) -> &PollGate {
        &self.gate
    }

    /// Current scheduler state.
    #[must_use]
    pub fn scheduler_state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    /// The storage handle the session persists into.
    #[must_use]
    pub fn store(&self) -> Arc<dyn LogStorage> {
        Arc::clone(&self.store)
    }
}

/// Routes poll events into the live buffer, the store, and the consumer.
///
/// Store ingestion is fire-and-forget from the poll loop's perspective but
/// serialized here: one batch completes before the next begins, so
/// concurrent duplicate-ID races cannot occur within a deployment.
async fn fan_out(
    mut poll_rx: mpsc::Receiver<PollEvent>,
    session_tx: mpsc::Sender<SessionEvent>,
    buffer: Arc<Mutex<MergeBuffer>>,
    connected: Arc<AtomicBool>,
    store: Option<Arc<dyn LogStorage>>,
    deployment_id: String,
) {
    while let Some(event) = poll_rx.recv().await {
        let out = match event {
            PollEvent::Entries(entries) => {
                buffer.lock().ingest(entries.clone());

                if let Some(store) = &store {
                    let store = Arc::clone(store);
                    let deployment = deployment_id.clone();
                    let batch = entries.clone();
                    let ingest = tokio::task::spawn_blocking(move || {
                        store.ingest(&batch, &deployment)
                    })
                    .await;
                    match ingest {
                        Ok(Ok(outcome)) if outcome.errors > 0 => {
                            warn!(errors = outcome.errors, "some entries failed to persist");
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!(error = %e, "failed to persist batch"),
                        Err(e) => warn!(error = %e, "ingest task panicked"),
                    }
                }

                SessionEvent::Entries(entries)
            }
            PollEvent::Disconnected => {
                connected.store(false, Ordering::SeqCst);
                SessionEvent::Disconnected
            }
            PollEvent::Reconnected => {
                connected.store(true, Ordering::SeqCst);
                SessionEvent::Reconnected
            }
        };

        if session_tx.send(out).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PollError;
    use async_trait::async_trait;
    use loupe_core::{PollBatch, RawLogEntry};
    use loupe_store::MemoryLogStore;
    use std::time::Duration;

    struct ScriptedPoller {
        script: Mutex<Vec<Result<Vec<RawLogEntry>, PollError>>>,
    }

    #[async_trait]
    impl LogPoller for Arc<ScriptedPoller> {
        async fn poll(
            &self,
            _cursor: &PollCursor,
            _limit: usize,
            cancel: &CancellationToken,
        ) -> Result<PollBatch, PollError> {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }
            let next = {
                let mut script = self.script.lock();
                if script.is_empty() {
                    Ok(Vec::new())
                } else {
                    script.remove(0)
                }
            };
            next.map(|entries| PollBatch {
                entries,
                new_cursor: PollCursor::initial(),
            })
        }
    }

    fn raw_entry(id: &str, ts: f64) -> RawLogEntry {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "timestamp": ts,
            "udfType": "query",
            "success": true,
        }))
        .expect("raw entry")
    }

    fn scripted(script: Vec<Result<Vec<RawLogEntry>, PollError>>) -> Arc<ScriptedPoller> {
        Arc::new(ScriptedPoller {
            script: Mutex::new(script),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn entries_reach_buffer_store_and_consumer() {
        let store: Arc<dyn LogStorage> = Arc::new(MemoryLogStore::new());
        let poller = scripted(vec![Ok(vec![
            raw_entry("a", 1000.0),
            raw_entry("b", 2000.0),
        ])]);

        let (mut session, mut events) =
            LogSession::start(poller, Arc::clone(&store), SessionConfig::new("dep-1"));

        let event = events.recv().await.expect("event");
        match event {
            SessionEvent::Entries(entries) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected event: {other:?}"),
        }

        // Buffer holds both, newest first
        let snapshot = session.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "b");

        session.stop().await;

        // Store ingestion completed (serialized before the event forward)
        assert!(store.get("a").expect("get").is_some());
        assert!(store.get("b").expect("get").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_can_be_disabled() {
        let store: Arc<dyn LogStorage> = Arc::new(MemoryLogStore::new());
        let poller = scripted(vec![Ok(vec![raw_entry("a", 1000.0)])]);

        let mut config = SessionConfig::new("dep-1");
        config.persist = false;
        let (mut session, mut events) = LogSession::start(poller, Arc::clone(&store), config);

        events.recv().await.expect("event");
        assert_eq!(session.snapshot().len(), 1);
        session.stop().await;

        assert_eq!(store.stats().expect("stats").total_rows, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn repolled_entries_stay_deduplicated() {
        let store: Arc<dyn LogStorage> = Arc::new(MemoryLogStore::new());
        let poller = scripted(vec![
            Ok(vec![raw_entry("a", 1000.0), raw_entry("b", 2000.0)]),
            Ok(vec![raw_entry("b", 2000.0), raw_entry("c", 3000.0)]),
        ]);

        let (mut session, mut events) =
            LogSession::start(poller, Arc::clone(&store), SessionConfig::new("dep-1"));

        events.recv().await.expect("first batch");
        events.recv().await.expect("second batch");
        session.stop().await;

        let snapshot = session.snapshot();
        let ids: Vec<&str> = snapshot.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(store.stats().expect("stats").total_rows, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_wipes_buffer_and_records_timestamp() {
        let store: Arc<dyn LogStorage> = Arc::new(MemoryLogStore::new());
        let poller = scripted(vec![Ok(vec![raw_entry("a", 1000.0)])]);

        let (mut session, mut events) =
            LogSession::start(poller, store, SessionConfig::new("dep-1"));
        events.recv().await.expect("event");

        session.clear_logs();
        assert!(session.snapshot().is_empty());
        assert_eq!(session.cleared_timestamps().len(), 1);

        session.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_in_flight_without_error() {
        struct HangingPoller;

        #[async_trait]
        impl LogPoller for HangingPoller {
            async fn poll(
                &self,
                _cursor: &PollCursor,
                _limit: usize,
                cancel: &CancellationToken,
            ) -> Result<PollBatch, PollError> {
                cancel.cancelled().await;
                Err(PollError::Cancelled)
            }
        }

        let store: Arc<dyn LogStorage> = Arc::new(MemoryLogStore::new());
        let (mut session, mut events) =
            LogSession::start(HangingPoller, store, SessionConfig::new("dep-1"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        session.stop().await;

        // The consumer sees a clean end of stream, not an error event
        assert!(events.recv().await.is_none());
        assert_eq!(session.scheduler_state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_flag_follows_events() {
        let failures: Vec<Result<Vec<RawLogEntry>, PollError>> = (0..5)
            .map(|_| Err(PollError::Transport("down".to_string())))
            .collect();
        let store: Arc<dyn LogStorage> = Arc::new(MemoryLogStore::new());
        let (mut session, mut events) =
            LogSession::start(scripted(failures), store, SessionConfig::new("dep-1"));

        let event = events.recv().await.expect("event");
        assert!(matches!(event, SessionEvent::Disconnected));
        assert!(!session.is_connected());

        let event = events.recv().await.expect("event");
        assert!(matches!(event, SessionEvent::Reconnected));
        assert!(session.is_connected());

        session.stop().await;
    }
}
