//! Wire-shaped types as the stream-logs endpoint sends them.
//!
//! Everything here is tolerant: optional fields may be missing, numeric
//! fields may arrive as floats, and log lines come in both plain-string and
//! structured form. The [`crate::normalize`] module turns these into the
//! canonical [`crate::LogEntry`].

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque continuation token for the log stream endpoint.
///
/// The backend may return a number or a string; the client passes whatever
/// it received back verbatim on the next call. Starts at the
/// deployment-defined initial value and is never rewound except by an
/// explicit clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollCursor(serde_json::Value);

impl PollCursor {
    /// The initial cursor for a fresh connection.
    #[must_use]
    pub fn initial() -> Self {
        Self(serde_json::Value::from(0))
    }

    /// The raw token, for embedding in the next request.
    #[must_use]
    pub const fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl Default for PollCursor {
    fn default() -> Self {
        Self::initial()
    }
}

impl From<serde_json::Value> for PollCursor {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// One long-poll response: new entries plus the cursor to resume from.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollBatch {
    /// Entries newer than the request cursor
    #[serde(default)]
    pub entries: Vec<RawLogEntry>,
    /// Cursor to pass on the next call
    pub new_cursor: PollCursor,
}

/// A console line as sent on the wire: either a bare string or a
/// structured object with an explicit level.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawLogLine {
    /// Plain message, possibly carrying a `[LEVEL] ` prefix
    Plain(String),
    /// Structured line with explicit metadata
    Structured {
        /// Message text
        message: String,
        /// Level tag, e.g. `INFO`
        level: Option<String>,
    },
}

/// Usage counters as sent on the wire. Floats and omissions tolerated.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawUsageStats {
    /// Bytes read from the database
    pub database_read_bytes: Option<f64>,
    /// Bytes written to the database
    pub database_write_bytes: Option<f64>,
    /// Bytes read from file storage
    pub storage_read_bytes: Option<f64>,
    /// Bytes written to file storage
    pub storage_write_bytes: Option<f64>,
    /// Bytes read from vector indexes
    pub vector_read_bytes: Option<f64>,
    /// Bytes written to vector indexes
    pub vector_write_bytes: Option<f64>,
    /// Documents scanned
    pub documents_read: Option<f64>,
    /// Peak memory in megabytes
    pub memory_mb: Option<f64>,
}

/// A log entry as sent on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLogEntry {
    /// Source-assigned ID; absent for some pure log-line entries
    pub id: Option<String>,
    /// Event time, epoch milliseconds, possibly fractional
    pub timestamp: Option<f64>,
    /// Request that triggered the execution
    pub request_id: Option<String>,
    /// Execution identifier
    pub execution_id: Option<String>,
    /// Calling execution
    pub parent_execution_id: Option<String>,
    /// Fully qualified function path
    pub function_identifier: Option<String>,
    /// Short function name
    pub function_name: Option<String>,
    /// Function kind tag
    pub udf_type: Option<String>,
    /// Whether the execution succeeded
    pub success: Option<bool>,
    /// Duration, milliseconds, possibly fractional
    pub duration_ms: Option<f64>,
    /// Error message
    pub error: Option<String>,
    /// Console output
    pub log_lines: Option<Vec<RawLogLine>>,
    /// Usage counters
    pub usage: Option<RawUsageStats>,
    /// Whether the result came from cache
    pub cached_result: Option<bool>,
    /// Owning component
    pub component_path: Option<String>,
    /// Invoker
    pub caller: Option<String>,
    /// Execution environment
    pub environment: Option<String>,
    /// Identity under which the execution ran
    pub identity_type: Option<String>,
    /// Returned value size, bytes
    pub return_bytes: Option<f64>,
}

/// Deserializes an epoch-milliseconds field that may arrive fractional,
/// truncating toward zero. Index range queries downstream require integers.
pub fn float_ms<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(raw as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_roundtrips_numbers_and_strings() {
        let numeric: PollCursor = serde_json::from_str("42").expect("numeric cursor");
        assert_eq!(serde_json::to_string(&numeric).expect("serialize"), "42");

        let text: PollCursor = serde_json::from_str("\"abc:17\"").expect("string cursor");
        assert_eq!(serde_json::to_string(&text).expect("serialize"), "\"abc:17\"");
    }

    #[test]
    fn cursor_initial_is_zero() {
        assert_eq!(
            PollCursor::initial().as_value(),
            &serde_json::Value::from(0)
        );
    }

    #[test]
    fn poll_batch_tolerates_missing_entries() {
        let batch: PollBatch =
            serde_json::from_str(r#"{"newCursor": 7}"#).expect("deserialize");
        assert!(batch.entries.is_empty());
        assert_eq!(batch.new_cursor, PollCursor::from(serde_json::json!(7)));
    }

    #[test]
    fn raw_log_line_both_shapes() {
        let plain: RawLogLine = serde_json::from_str("\"hello\"").expect("plain");
        assert!(matches!(plain, RawLogLine::Plain(ref m) if m == "hello"));

        let structured: RawLogLine =
            serde_json::from_str(r#"{"message": "boom", "level": "ERROR"}"#).expect("structured");
        assert!(matches!(
            structured,
            RawLogLine::Structured { ref message, ref level }
                if message == "boom" && level.as_deref() == Some("ERROR")
        ));
    }

    #[test]
    fn raw_entry_tolerates_sparse_input() {
        let raw: RawLogEntry = serde_json::from_str(r#"{"timestamp": 1.5}"#).expect("sparse");
        assert!(raw.id.is_none());
        assert_eq!(raw.timestamp, Some(1.5));
        assert!(raw.usage.is_none());
    }

    #[test]
    fn float_ms_truncates() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "float_ms")]
            ts: i64,
        }
        let h: Holder = serde_json::from_str(r#"{"ts": 1700000000000.9}"#).expect("holder");
        assert_eq!(h.ts, 1_700_000_000_000);
    }
}
