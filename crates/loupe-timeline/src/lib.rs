//! # loupe-timeline
//!
//! In-memory timeline assembly for the Loupe log client.
//!
//! This crate provides:
//!
//! - [`MergeBuffer`] — Capacity-bounded, descending-time, deduplicated set of
//!   log entries backing the live view
//! - [`TimelineItem`] — Tagged union over execution logs, deployment events,
//!   and cleared markers
//! - [`interleave`] — Two-pointer merge of ascending log and event streams
//!
//! ## Example
//!
//! ```rust
//! use loupe_timeline::MergeBuffer;
//!
//! let mut buffer = MergeBuffer::new(10_000);
//! buffer.ingest(Vec::new());
//! assert!(buffer.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod interleave;

// Re-export main types
pub use buffer::{MergeBuffer, DEFAULT_BUFFER_CAPACITY};
pub use interleave::{interleave, TimelineItem};
