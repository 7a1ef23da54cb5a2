//! Canonical types for the log timeline.
//!
//! This module provides:
//! - [`LogEntry`] — Immutable function-execution record, deduplicated by `id`
//! - [`LogLine`] — A single console line emitted during an execution
//! - [`LogLevel`] — Severity tag attached to console lines
//! - [`UdfType`] — Kind of function that produced an entry
//! - [`UsageStats`] — Resource usage recorded for an execution
//! - [`DeploymentEvent`] — Administrative event from the deployment audit log

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity levels for console log lines, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debugging output
    Debug = 0,
    /// General information (includes plain `console.log` output)
    Info = 1,
    /// Warning conditions
    Warn = 2,
    /// Error conditions
    Error = 3,
}

impl LogLevel {
    /// Returns the string representation of this level.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    /// Parses a wire-format level tag. `LOG` is an alias for `INFO`.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" | "LOG" => Some(Self::Info),
            "WARN" => Some(Self::Warn),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of function that produced a log entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UdfType {
    /// Read-only query function
    #[default]
    Query,
    /// State-changing mutation function
    Mutation,
    /// General-purpose action
    Action,
    /// HTTP-triggered action
    HttpAction,
}

impl UdfType {
    /// Returns the wire-format string for this type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Action => "action",
            Self::HttpAction => "httpAction",
        }
    }

    /// Parses a wire-format type tag, case-insensitively.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "query" => Some(Self::Query),
            "mutation" => Some(Self::Mutation),
            "action" => Some(Self::Action),
            "httpaction" | "http_action" => Some(Self::HttpAction),
            _ => None,
        }
    }
}

impl fmt::Display for UdfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single console line emitted during a function execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    /// The raw message text
    pub message: String,
    /// Severity tag, if one was attached
    pub level: Option<LogLevel>,
}

impl LogLine {
    /// Creates an untagged log line.
    #[must_use]
    pub fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }

    /// Creates a level-tagged log line.
    #[must_use]
    pub fn tagged(message: impl Into<String>, level: LogLevel) -> Self {
        Self {
            message: message.into(),
            level: Some(level),
        }
    }
}

/// Resource usage recorded for a function execution.
///
/// All fields default to zero; the wire format omits anything unused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageStats {
    /// Bytes read from the database
    pub database_read_bytes: u64,
    /// Bytes written to the database
    pub database_write_bytes: u64,
    /// Bytes read from file storage
    pub storage_read_bytes: u64,
    /// Bytes written to file storage
    pub storage_write_bytes: u64,
    /// Bytes read from vector indexes
    pub vector_read_bytes: u64,
    /// Bytes written to vector indexes
    pub vector_write_bytes: u64,
    /// Documents scanned by the execution
    pub documents_read: u64,
    /// Peak memory used, in megabytes
    pub memory_mb: u64,
}

/// A canonical function-execution log entry.
///
/// Immutable once created by the normalizer. `id` is the deduplication key:
/// two entries with the same `id` are the same event and only one may be
/// retained anywhere in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Globally unique, source-assigned identifier
    pub id: String,
    /// Event time in epoch milliseconds
    pub timestamp: i64,
    /// Request that triggered the execution
    pub request_id: Option<String>,
    /// Execution this entry belongs to
    pub execution_id: Option<String>,
    /// Calling execution, for scheduled/nested calls
    pub parent_execution_id: Option<String>,
    /// Fully qualified function path, e.g. `messages:send`
    pub function_identifier: Option<String>,
    /// Short display name of the function
    pub function_name: Option<String>,
    /// Kind of function that produced this entry
    pub udf_type: UdfType,
    /// Whether the execution succeeded
    pub success: bool,
    /// Execution duration in milliseconds; absent for pure log-line entries
    pub duration_ms: Option<i64>,
    /// Error message for failed executions
    pub error: Option<String>,
    /// Console output captured during the execution
    pub log_lines: Vec<LogLine>,
    /// Resource usage metadata
    pub usage: UsageStats,
    /// Whether the result was served from cache
    pub cached_result: bool,
    /// Component that owns the function, if any
    pub component_path: Option<String>,
    /// What invoked the function (http, scheduler, client, ...)
    pub caller: Option<String>,
    /// Execution environment (isolate, node, ...)
    pub environment: Option<String>,
    /// Identity under which the execution ran
    pub identity_type: Option<String>,
    /// Size of the returned value in bytes
    pub return_bytes: Option<i64>,
}

impl LogEntry {
    /// Highest severity among the entry's console lines, with failed
    /// executions always reporting at least [`LogLevel::Error`].
    #[must_use]
    pub fn severity(&self) -> LogLevel {
        if !self.success || self.error.is_some() {
            return LogLevel::Error;
        }
        self.log_lines
            .iter()
            .filter_map(|l| l.level)
            .max()
            .unwrap_or(LogLevel::Info)
    }
}

/// Administrative actions recorded in the deployment audit log.
///
/// Only the actions the timeline displays are named; anything else arrives
/// as [`DeploymentAction::Other`] and is filtered out before display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentAction {
    /// New function code or schema was pushed
    PushConfig,
    /// Component-aware push
    PushConfigWithComponents,
    /// Deployment was paused or resumed
    ChangeDeploymentState,
    /// All tables were cleared
    ClearTables,
    /// A snapshot was imported
    SnapshotImport,
    /// A component was removed
    DeleteComponent,
    /// Index build bookkeeping; redundant next to the push that caused it
    BuildIndexes,
    /// Any action this client does not render
    #[serde(untagged)]
    Other(String),
}

impl DeploymentAction {
    /// Whether the timeline shows this action.
    ///
    /// `build_indexes` accompanies every push and carries no extra
    /// information, so it is dropped along with unknown actions.
    #[must_use]
    pub const fn is_displayable(&self) -> bool {
        !matches!(self, Self::BuildIndexes | Self::Other(_))
    }
}

/// An administrative event from the deployment audit log.
///
/// Fetched by time window and kept only in memory; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    /// Audit log document ID
    #[serde(rename = "_id")]
    pub id: String,
    /// Event time in epoch milliseconds
    #[serde(rename = "_creationTime", deserialize_with = "crate::wire::float_ms")]
    pub creation_time: i64,
    /// Team member who performed the action; `None` means system-initiated
    #[serde(rename = "memberId")]
    pub member_id: Option<String>,
    /// What happened
    pub action: DeploymentAction,
    /// Action-specific payload
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Keeps only the audit events the timeline displays.
#[must_use]
pub fn displayable_events(events: Vec<DeploymentEvent>) -> Vec<DeploymentEvent> {
    events
        .into_iter()
        .filter(|e| e.action.is_displayable())
        .collect()
}
