//! Error types for export encoding and saving.

use thiserror::Error;

/// Errors that can occur while exporting entries.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The requested format name is not recognized.
    #[error("unknown export format: {0}")]
    UnknownFormat(String),

    /// Serialization of an entry failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the export file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
