//! # loupe-client
//!
//! Adaptive long-polling client for deployment log streams.
//!
//! This crate provides:
//!
//! - [`LogPoller`] / [`HttpLogPoller`] — One long-poll request, one batch
//! - [`BackoffPolicy`] — Active/idle/failure delay classes with a hard
//!   inter-request floor
//! - [`Scheduler`] / [`PollGate`] — The polling loop and its gating
//!   conditions (credentials, pause, visibility)
//! - [`AuditClient`] — Deployment audit event fetcher
//! - [`LogSession`] — Poller + buffer + store composed behind an explicit
//!   `start()`/`stop()` lifecycle
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use loupe_client::{HttpLogPoller, LogSession, SessionConfig, SessionEvent};
//! use loupe_store::{LogStorage, SqliteLogStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let poller = HttpLogPoller::new("https://happy-otter-123.convex.cloud", "token");
//! let store: Arc<dyn LogStorage> = Arc::new(SqliteLogStore::open("logs.db")?);
//!
//! let (mut session, mut events) =
//!     LogSession::start(poller, store, SessionConfig::new("happy-otter-123"));
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::Entries(entries) = event {
//!         println!("{} new entries", entries.len());
//!     }
//! }
//! session.stop().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod backoff;
pub mod error;
pub mod poller;
pub mod scheduler;
pub mod session;

// Re-export main types
pub use audit::AuditClient;
pub use backoff::{BackoffConfig, BackoffPolicy, ConnectionEdge};
pub use error::{PollError, Result};
pub use poller::{HttpLogPoller, LogPoller};
pub use scheduler::{GateState, PollEvent, PollGate, Scheduler, SchedulerState};
pub use session::{LogSession, SessionConfig, SessionEvent};
