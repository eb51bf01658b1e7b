use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::EventType;

/// One durable record in an instance's append-only log (§3).
///
/// `sequence` is the 0-indexed position within the log — the only ordering
/// that matters for replay. `recorded_at` is wall-clock time at append and
/// is informational only; workflow code never reads it directly (it reads
/// `fire_at`/`retry_at` fields recorded on the relevant event instead, so
/// replay stays deterministic regardless of when a worker happens to run).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: EventType,
}

impl JournalEntry {
    pub fn new(sequence: u64, recorded_at: DateTime<Utc>, event: EventType) -> Self {
        Self {
            sequence,
            recorded_at,
            event,
        }
    }
}

/// Coarse lifecycle state of a workflow instance (§3).
///
/// Unlike the engine this was adapted from, there is no `Blocked`
/// sub-state: an instance that is merely awaiting an effect, timer, or
/// signal is still `Running` — "blocked on what" is a property of the
/// *pending* `EffectScheduled`/`TimerStarted` events, not a tracked status,
/// since this spec has no query surface that needs to distinguish it from
/// plain `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
    Terminated,
}

impl InstanceStatus {
    /// Whether the instance accepts no further events (§3, §4.2).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Running)
    }
}
