//! Raw-to-canonical log entry conversion.
//!
//! [`normalize`] is a pure function: the same wire entry always yields the
//! same [`LogEntry`]. Missing numerics default to zero or absent, and all
//! floating-point duration/timestamp fields are coerced to integral
//! milliseconds before they can reach storage.

use sha2::{Digest, Sha256};

use crate::types::{LogEntry, LogLevel, LogLine, UdfType, UsageStats};
use crate::wire::{RawLogEntry, RawLogLine, RawUsageStats};

/// Converts a wire entry into the canonical form.
#[must_use]
pub fn normalize(raw: &RawLogEntry) -> LogEntry {
    let timestamp = raw.timestamp.map_or(0, |t| t as i64);
    let log_lines = raw
        .log_lines
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(normalize_line)
        .collect::<Vec<_>>();

    let id = raw.id.clone().unwrap_or_else(|| {
        fallback_entry_id(
            timestamp,
            raw.request_id.as_deref(),
            raw.function_identifier.as_deref(),
            &log_lines,
        )
    });

    LogEntry {
        id,
        timestamp,
        request_id: raw.request_id.clone(),
        execution_id: raw.execution_id.clone(),
        parent_execution_id: raw.parent_execution_id.clone(),
        function_identifier: raw.function_identifier.clone(),
        function_name: raw.function_name.clone(),
        udf_type: raw
            .udf_type
            .as_deref()
            .and_then(UdfType::parse)
            .unwrap_or_default(),
        success: raw.success.unwrap_or(true),
        duration_ms: raw.duration_ms.map(|d| d as i64),
        error: raw.error.clone(),
        log_lines,
        usage: raw.usage.as_ref().map(normalize_usage).unwrap_or_default(),
        cached_result: raw.cached_result.unwrap_or(false),
        component_path: raw.component_path.clone(),
        caller: raw.caller.clone(),
        environment: raw.environment.clone(),
        identity_type: raw.identity_type.clone(),
        return_bytes: raw.return_bytes.map(|b| b as i64),
    }
}

/// Computes a stable ID for entries the backend sent without one, hashing
/// the fields that identify the event. Re-polling the same entry must
/// produce the same ID so deduplication still holds.
#[must_use]
pub fn fallback_entry_id(
    timestamp: i64,
    request_id: Option<&str>,
    function_identifier: Option<&str>,
    log_lines: &[LogLine],
) -> String {
    let mut hasher = Sha256::new();

    hasher.update(timestamp.to_le_bytes());
    if let Some(rid) = request_id {
        hasher.update(rid.as_bytes());
    }
    if let Some(fi) = function_identifier {
        hasher.update(fi.as_bytes());
    }
    for line in log_lines {
        hasher.update(line.message.as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Derives a one-line summary for display and full-text indexing.
/// Priority: error, then console output, then function name.
#[must_use]
pub fn summary_message(entry: &LogEntry) -> String {
    if let Some(error) = &entry.error {
        return format!("Error: {error}");
    }

    if !entry.log_lines.is_empty() {
        return entry
            .log_lines
            .iter()
            .map(|l| l.message.as_str())
            .collect::<Vec<_>>()
            .join(" | ");
    }

    match (&entry.function_name, entry.success) {
        (Some(name), true) => format!("Function '{name}' executed"),
        (Some(name), false) => format!("Function '{name}' failed"),
        (None, _) => "Log entry".to_string(),
    }
}

fn normalize_line(raw: &RawLogLine) -> LogLine {
    match raw {
        RawLogLine::Plain(text) => split_level_prefix(text),
        RawLogLine::Structured { message, level } => LogLine {
            message: message.clone(),
            level: level.as_deref().and_then(LogLevel::parse),
        },
    }
}

/// Splits a `[LEVEL] message` prefix off a plain line, if present.
fn split_level_prefix(text: &str) -> LogLine {
    if let Some(rest) = text.strip_prefix('[') {
        if let Some((tag, message)) = rest.split_once("] ") {
            if let Some(level) = LogLevel::parse(tag) {
                return LogLine::tagged(message, level);
            }
        }
    }
    LogLine::plain(text)
}

fn normalize_usage(raw: &RawUsageStats) -> UsageStats {
    let as_count = |v: Option<f64>| v.map_or(0, |n| n.max(0.0) as u64);
    UsageStats {
        database_read_bytes: as_count(raw.database_read_bytes),
        database_write_bytes: as_count(raw.database_write_bytes),
        storage_read_bytes: as_count(raw.storage_read_bytes),
        storage_write_bytes: as_count(raw.storage_write_bytes),
        vector_read_bytes: as_count(raw.vector_read_bytes),
        vector_write_bytes: as_count(raw.vector_write_bytes),
        documents_read: as_count(raw.documents_read),
        memory_mb: as_count(raw.memory_mb),
    }
}
