//! # loupe-core
//!
//! Canonical data model and wire normalization for the Loupe log client.
//!
//! This crate provides:
//!
//! - [`LogEntry`] — Canonical, immutable function-execution log record
//! - [`LogLine`] / [`LogLevel`] — Console output attached to an execution
//! - [`UsageStats`] — Resource usage metadata for an execution
//! - [`DeploymentEvent`] / [`DeploymentAction`] — Administrative audit events
//! - [`PollCursor`] — Opaque continuation token for the log stream endpoint
//! - [`RawLogEntry`] / [`PollBatch`] — Wire-shaped types as the backend sends them
//! - [`normalize`] — Deterministic raw-to-canonical conversion
//!
//! ## Example
//!
//! ```rust
//! use loupe_core::{normalize, RawLogEntry};
//!
//! let raw: RawLogEntry = serde_json::from_str(
//!     r#"{"timestamp": 1700000000123.7, "udfType": "mutation",
//!         "functionIdentifier": "messages:send", "success": true}"#,
//! ).expect("wire entry");
//!
//! let entry = normalize(&raw);
//! assert_eq!(entry.timestamp, 1_700_000_000_123); // integral ms
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod normalize;
pub mod types;
pub mod wire;

// Re-export main types
pub use normalize::{fallback_entry_id, normalize, summary_message};
pub use types::{
    displayable_events, DeploymentAction, DeploymentEvent, LogEntry, LogLevel, LogLine, UdfType,
    UsageStats,
};
pub use wire::{PollBatch, PollCursor, RawLogEntry, RawLogLine, RawUsageStats};
