//! Format encoders.
//!
//! Live and stored entries are encoded identically; callers hand in plain
//! `LogEntry` slices either way.

use chrono::{DateTime, Utc};

use loupe_core::LogEntry;

use crate::error::{ExportError, Result};

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Structurally faithful JSON list.
    Json,
    /// RFC-4180 CSV with a fixed column order.
    Csv,
    /// Human-readable text blocks.
    Txt,
}

impl ExportFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Txt => "txt",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "txt" | "text" => Ok(Self::Txt),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

const CSV_HEADER: &str =
    "id,timestamp,success,functionIdentifier,functionName,udfType,durationMs,requestId,error,logLines";

/// Encodes entries into the given format.
pub fn encode(entries: &[LogEntry], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(entries)?),
        ExportFormat::Csv => encode_csv(entries),
        ExportFormat::Txt => Ok(encode_txt(entries)),
    }
}

fn encode_csv(entries: &[LogEntry]) -> Result<String> {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for entry in entries {
        let log_lines = serde_json::to_string(&entry.log_lines)?;
        let row = [
            csv_field(&entry.id),
            csv_field(&iso_timestamp(entry.timestamp)),
            entry.success.to_string(),
            csv_field(entry.function_identifier.as_deref().unwrap_or_default()),
            csv_field(entry.function_name.as_deref().unwrap_or_default()),
            csv_field(entry.udf_type.as_str()),
            entry.duration_ms.map(|d| d.to_string()).unwrap_or_default(),
            csv_field(entry.request_id.as_deref().unwrap_or_default()),
            csv_field(entry.error.as_deref().unwrap_or_default()),
            csv_field(&log_lines),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    Ok(out)
}

/// RFC-4180: a field containing a comma, quote, or newline is wrapped in
/// quotes with internal quotes doubled.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn encode_txt(entries: &[LogEntry]) -> String {
    let mut out = String::new();

    for entry in entries {
        let status = if entry.success { "SUCCESS" } else { "FAILURE" };
        let function = entry
            .function_identifier
            .as_deref()
            .or(entry.function_name.as_deref())
            .unwrap_or("<unknown>");
        let duration = entry
            .duration_ms
            .map_or_else(|| "-".to_string(), |d| format!("{d}ms"));

        out.push_str(&format!(
            "[{}] [{}] {} ({})\n",
            iso_timestamp(entry.timestamp),
            status,
            function,
            duration
        ));

        if let Some(error) = &entry.error {
            out.push_str("  error:\n");
            for line in error.lines() {
                out.push_str(&format!("    {line}\n"));
            }
        }
        if !entry.log_lines.is_empty() {
            out.push_str("  console:\n");
            for line in &entry.log_lines {
                match line.level {
                    Some(level) => {
                        out.push_str(&format!("    [{}] {}\n", level.as_str(), line.message));
                    }
                    None => out.push_str(&format!("    {}\n", line.message)),
                }
            }
        }
        out.push('\n');
    }

    out
}

/// Epoch-ms to ISO-8601 UTC with millisecond precision.
fn iso_timestamp(ts_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms).map_or_else(
        || ts_ms.to_string(),
        |dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
    )
}

/// Builds the export filename:
/// `<prefix>-<deploymentIdPrefix>-<ISO8601-with-dashes>.<ext>`.
#[must_use]
pub fn export_filename(
    prefix: &str,
    deployment_id: &str,
    when: DateTime<Utc>,
    format: ExportFormat,
) -> String {
    let deployment_prefix: String = deployment_id.chars().take(12).collect();
    let stamp = when.format("%Y-%m-%dT%H-%M-%S").to_string();
    format!(
        "{prefix}-{deployment_prefix}-{stamp}.{}",
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use loupe_core::{LogLine, UdfType, UsageStats};
    use test_case::test_case;

    fn make_entry(id: &str, ts: i64) -> LogEntry {
        LogEntry {
            id: id.to_string(),
            timestamp: ts,
            request_id: Some("req-1".to_string()),
            execution_id: None,
            parent_execution_id: None,
            function_identifier: Some("messages:send".to_string()),
            function_name: Some("send".to_string()),
            udf_type: UdfType::Mutation,
            success: true,
            duration_ms: Some(42),
            error: None,
            log_lines: vec![LogLine::plain("hello")],
            usage: UsageStats::default(),
            cached_result: false,
            component_path: None,
            caller: None,
            environment: None,
            identity_type: None,
            return_bytes: None,
        }
    }

    #[test]
    fn json_roundtrips() {
        let entries = vec![make_entry("a", 1_700_000_000_000)];
        let encoded = encode(&entries, ExportFormat::Json).expect("encode");

        let decoded: Vec<LogEntry> = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, entries);
    }

    #[test]
    fn csv_has_fixed_header_and_one_row_per_entry() {
        let entries = vec![make_entry("a", 1_700_000_000_000), make_entry("b", 0)];
        let encoded = encode(&entries, ExportFormat::Csv).expect("encode");

        let lines: Vec<&str> = encoded.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("a,2023-11-14T22:13:20.000Z,true,messages:send,send,"));
    }

    #[test]
    fn csv_escapes_embedded_quotes_and_commas() {
        let mut entry = make_entry("a", 0);
        entry.error = Some("a,\"b\"".to_string());
        let encoded = encode(&[entry], ExportFormat::Csv).expect("encode");

        assert!(
            encoded.contains("\"a,\"\"b\"\"\""),
            "missing RFC-4180 escaped field in: {encoded}"
        );
    }

    #[test_case("plain" ; "no special characters")]
    #[test_case("with space" ; "spaces stay unquoted")]
    fn csv_field_leaves_simple_values_alone(value: &str) {
        assert_eq!(csv_field(value), value);
    }

    #[test_case("a,b", "\"a,b\"" ; "comma")]
    #[test_case("a\"b", "\"a\"\"b\"" ; "quote")]
    #[test_case("a\nb", "\"a\nb\"" ; "newline")]
    fn csv_field_quotes_special_values(value: &str, expected: &str) {
        assert_eq!(csv_field(value), expected);
    }

    #[test]
    fn txt_block_shape() {
        let mut entry = make_entry("a", 1_700_000_000_000);
        entry.success = false;
        entry.error = Some("boom".to_string());
        entry.log_lines = vec![
            LogLine::plain("first"),
            LogLine::tagged("second", loupe_core::LogLevel::Warn),
        ];

        let encoded = encode(&[entry], ExportFormat::Txt).expect("encode");
        let expected = "[2023-11-14T22:13:20.000Z] [FAILURE] messages:send (42ms)\n\
                        \x20 error:\n\
                        \x20   boom\n\
                        \x20 console:\n\
                        \x20   first\n\
                        \x20   [WARN] second\n\n";
        assert_eq!(encoded, expected);
    }

    #[test]
    fn txt_handles_minimal_entries() {
        let mut entry = make_entry("a", 0);
        entry.function_identifier = None;
        entry.function_name = None;
        entry.duration_ms = None;
        entry.log_lines = Vec::new();

        let encoded = encode(&[entry], ExportFormat::Txt).expect("encode");
        assert!(encoded.starts_with("[1970-01-01T00:00:00.000Z] [SUCCESS] <unknown> (-)\n"));
    }

    #[test]
    fn filename_pattern() {
        let when = Utc
            .with_ymd_and_hms(2024, 3, 5, 9, 30, 15)
            .single()
            .expect("valid timestamp");
        let name = export_filename(
            "logs",
            "happy-otter-123456789",
            when,
            ExportFormat::Csv,
        );
        assert_eq!(name, "logs-happy-otter--2024-03-05T09-30-15.csv");
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<ExportFormat>().ok(), Some(ExportFormat::Json));
        assert_eq!("csv".parse::<ExportFormat>().ok(), Some(ExportFormat::Csv));
        assert_eq!("Text".parse::<ExportFormat>().ok(), Some(ExportFormat::Txt));
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
