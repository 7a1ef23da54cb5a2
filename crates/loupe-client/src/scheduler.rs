//! The polling loop state machine.
//!
//! One loop per deployment connection, at most one in-flight poll. The
//! [`PollGate`] (credentials present, not paused, visible) governs whether
//! the loop is allowed to poll at all; any gate condition going false
//! cancels the in-flight request and parks the loop in `Idle`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use loupe_core::{normalize, LogEntry, PollCursor};

use crate::backoff::{BackoffPolicy, ConnectionEdge};
use crate::error::PollError;
use crate::poller::LogPoller;

/// Conditions that must all hold for polling to proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateState {
    /// A deployment URL and auth token are available.
    pub has_credentials: bool,
    /// The consumer explicitly paused polling.
    pub paused: bool,
    /// The consuming view is visible.
    pub visible: bool,
}

impl GateState {
    /// Whether polling may proceed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.has_credentials && !self.paused && self.visible
    }
}

impl Default for GateState {
    fn default() -> Self {
        Self {
            has_credentials: true,
            paused: false,
            visible: true,
        }
    }
}

/// Shared handle controlling whether the loop polls.
#[derive(Debug, Clone)]
pub struct PollGate {
    state: Arc<watch::Sender<GateState>>,
}

impl PollGate {
    /// Creates a gate in the given initial state.
    #[must_use]
    pub fn new(initial: GateState) -> Self {
        Self {
            state: Arc::new(watch::channel(initial).0),
        }
    }

    /// Creates an open gate.
    #[must_use]
    pub fn open() -> Self {
        Self::new(GateState::default())
    }

    /// Subscribes the loop to gate changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    /// Current snapshot.
    #[must_use]
    pub fn current(&self) -> GateState {
        *self.state.borrow()
    }

    /// Marks credentials present or absent.
    pub fn set_credentials(&self, present: bool) {
        self.state.send_modify(|s| s.has_credentials = present);
    }

    /// Pauses or resumes polling.
    pub fn set_paused(&self, paused: bool) {
        self.state.send_modify(|s| s.paused = paused);
    }

    /// Marks the consuming view visible or hidden.
    pub fn set_visible(&self, visible: bool) {
        self.state.send_modify(|s| s.visible = visible);
    }
}

/// Loop state, observable for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Parked: gate closed.
    Idle,
    /// A poll request is in flight.
    Polling,
    /// Sleeping between successful polls.
    Waiting,
    /// Sleeping after a failure.
    Backoff,
    /// Torn down; terminal.
    Stopped,
}

/// What the loop reports upward.
#[derive(Debug)]
pub enum PollEvent {
    /// Normalized entries from one poll, oldest first as received.
    Entries(Vec<LogEntry>),
    /// The failure threshold was crossed. Emitted once per outage.
    Disconnected,
    /// A poll succeeded after an outage. Emitted once.
    Reconnected,
}

/// The polling loop. Owns the cursor and the backoff counters; consumed
/// by [`Scheduler::run`].
pub struct Scheduler<P> {
    poller: P,
    backoff: BackoffPolicy,
    cursor: PollCursor,
    limit: usize,
    gate: watch::Receiver<GateState>,
    events: mpsc::Sender<PollEvent>,
    state: watch::Sender<SchedulerState>,
    shutdown: CancellationToken,
    last_request_at: Option<Instant>,
}

impl<P: LogPoller> Scheduler<P> {
    /// Assembles a loop. `state_tx` mirrors the current state for
    /// observers.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        poller: P,
        backoff: BackoffPolicy,
        cursor: PollCursor,
        limit: usize,
        gate: watch::Receiver<GateState>,
        events: mpsc::Sender<PollEvent>,
        state_tx: watch::Sender<SchedulerState>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            poller,
            backoff,
            cursor,
            limit,
            gate,
            events,
            state: state_tx,
            shutdown,
            last_request_at: None,
        }
    }

    /// Runs until the shutdown token is cancelled. Every await point also
    /// listens for shutdown, so teardown is prompt from any state.
    pub async fn run(mut self) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            if !self.gate.borrow().is_open() {
                self.set_state(SchedulerState::Idle);
                if !self.wait_for_gate().await {
                    break;
                }
                continue;
            }

            if !self.enforce_request_gap().await {
                break;
            }

            self.set_state(SchedulerState::Polling);
            self.last_request_at = Some(Instant::now());

            match self.poll_once().await {
                Ok(batch) => {
                    self.cursor = batch.new_cursor;
                    let entries: Vec<LogEntry> =
                        batch.entries.iter().map(normalize).collect();

                    let (delay, edge) = if entries.is_empty() {
                        self.backoff.on_empty()
                    } else {
                        self.backoff.on_entries()
                    };
                    self.emit_edge(edge).await;

                    if !entries.is_empty() {
                        debug!(count = entries.len(), "poll returned entries");
                        if self.events.send(PollEvent::Entries(entries)).await.is_err() {
                            break;
                        }
                    }

                    self.set_state(SchedulerState::Waiting);
                    if !self.sleep_interruptibly(delay).await {
                        break;
                    }
                }
                Err(e) if e.is_cancellation() => {
                    if self.shutdown.is_cancelled() {
                        break;
                    }
                    // Gate closed mid-poll; park without touching counters
                    continue;
                }
                Err(e) => {
                    let (delay, edge) = self.backoff.on_failure();
                    warn!(error = %e, delay_ms = delay.as_millis() as u64, "poll failed");
                    self.emit_edge(edge).await;

                    self.set_state(SchedulerState::Backoff);
                    if !self.sleep_interruptibly(delay).await {
                        break;
                    }
                }
            }
        }

        self.set_state(SchedulerState::Stopped);
    }

    async fn poll_once(&mut self) -> Result<loupe_core::PollBatch, PollError> {
        let request_token = self.shutdown.child_token();
        let mut gate = self.gate.clone();

        tokio::select! {
            result = self.poller.poll(&self.cursor, self.limit, &request_token) => result,
            () = self.shutdown.cancelled() => {
                request_token.cancel();
                Err(PollError::Cancelled)
            }
            _ = gate.wait_for(|g| !g.is_open()) => {
                request_token.cancel();
                Err(PollError::Cancelled)
            }
        }
    }

    async fn emit_edge(&self, edge: Option<ConnectionEdge>) {
        let event = match edge {
            Some(ConnectionEdge::Disconnected) => PollEvent::Disconnected,
            Some(ConnectionEdge::Reconnected) => PollEvent::Reconnected,
            None => return,
        };
        let _ = self.events.send(event).await;
    }

    /// Requests never start closer together than the configured gap, no
    /// matter which branch scheduled the next one.
    async fn enforce_request_gap(&mut self) -> bool {
        let gap = self.backoff.config().min_request_gap;
        if let Some(last) = self.last_request_at {
            let since = last.elapsed();
            if since < gap {
                self.set_state(SchedulerState::Waiting);
                return self.sleep_interruptibly(gap - since).await;
            }
        }
        true
    }

    /// Returns `false` on shutdown. A gate closure wakes the sleep early
    /// so the loop parks immediately.
    async fn sleep_interruptibly(&mut self, delay: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            () = self.shutdown.cancelled() => false,
            _ = self.gate.wait_for(|g| !g.is_open()) => true,
        }
    }

    /// Returns `false` on shutdown.
    async fn wait_for_gate(&mut self) -> bool {
        tokio::select! {
            result = self.gate.wait_for(GateState::is_open) => result.is_ok(),
            () = self.shutdown.cancelled() => false,
        }
    }

    fn set_state(&self, state: SchedulerState) {
        let _ = self.state.send(state);
    }
}
