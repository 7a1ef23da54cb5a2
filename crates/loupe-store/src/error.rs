//! Error types for the log store.

use thiserror::Error;

/// Errors that can occur in the log store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite engine failed.
    #[error("storage engine error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A pagination cursor could not be parsed.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// A filter or search expression was malformed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Serialization of a stored record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = StoreError::InvalidCursor("abc".to_string());
        assert_eq!(err.to_string(), "invalid cursor: abc");

        let err = StoreError::InvalidFilter("empty search".to_string());
        assert_eq!(err.to_string(), "invalid filter: empty search");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StoreError>();
    }
}
