//! Merging log and deployment-event streams into one timeline.

use loupe_core::{DeploymentEvent, LogEntry};
use serde::{Deserialize, Serialize};

/// One item in the combined timeline.
///
/// The ordering key is `timestamp` for execution logs and cleared markers,
/// and `creation_time` for deployment events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineItem {
    /// A function-execution log entry
    ExecutionLog(LogEntry),
    /// An administrative deployment event
    Deployment(DeploymentEvent),
    /// Marks the point below which the user cleared the view
    ClearedMarker {
        /// When the clear happened, epoch milliseconds
        timestamp: i64,
    },
}

impl TimelineItem {
    /// The unified ordering key, epoch milliseconds.
    #[must_use]
    pub const fn key(&self) -> i64 {
        match self {
            Self::ExecutionLog(entry) => entry.timestamp,
            Self::Deployment(event) => event.creation_time,
            Self::ClearedMarker { timestamp } => *timestamp,
        }
    }
}

/// Merges an ascending log stream and an ascending event stream into one
/// ascending timeline.
///
/// Classic two-pointer merge on the unified key; an exact tie prefers the
/// execution log. If `cleared_timestamps` is non-empty, its latest value is
/// a floor: a single [`TimelineItem::ClearedMarker`] is emitted at it and
/// every item with key at or below the floor is suppressed. Inputs are
/// assumed already deduplicated by the caller. O(n+m).
#[must_use]
pub fn interleave(
    logs_ascending: Vec<LogEntry>,
    events_ascending: Vec<DeploymentEvent>,
    cleared_timestamps: &[i64],
) -> Vec<TimelineItem> {
    let floor = cleared_timestamps.iter().max().copied();

    let mut out = Vec::with_capacity(logs_ascending.len() + events_ascending.len() + 1);
    if let Some(floor) = floor {
        out.push(TimelineItem::ClearedMarker { timestamp: floor });
    }

    let mut logs = logs_ascending.into_iter().peekable();
    let mut events = events_ascending.into_iter().peekable();

    loop {
        let take_log = match (logs.peek(), events.peek()) {
            (Some(log), Some(event)) => log.timestamp <= event.creation_time,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        let item = if take_log {
            match logs.next() {
                Some(log) => TimelineItem::ExecutionLog(log),
                None => break,
            }
        } else {
            match events.next() {
                Some(event) => TimelineItem::Deployment(event),
                None => break,
            }
        };

        if floor.is_some_and(|f| item.key() <= f) {
            continue;
        }
        out.push(item);
    }

    out
}
