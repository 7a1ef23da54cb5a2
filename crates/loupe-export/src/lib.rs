//! # loupe-export
//!
//! Portable export formats for log entries.
//!
//! This crate provides:
//!
//! - [`encode`] — Renders entries to JSON, CSV (RFC-4180), or plain text
//! - [`export_filename`] — The standard export filename pattern
//! - [`write_export`] / [`SaveOutcome`] — Saving with an explicit
//!   cancelled-vs-failed distinction
//!
//! ## Example
//!
//! ```rust
//! use loupe_export::{encode, ExportFormat};
//!
//! let encoded = encode(&[], ExportFormat::Csv).expect("encode");
//! assert!(encoded.starts_with("id,timestamp,success,"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod encode;
mod error;
mod save;

pub use encode::{encode, export_filename, ExportFormat};
pub use error::{ExportError, Result};
pub use save::{write_export, SaveOutcome};
