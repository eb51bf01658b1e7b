use orderflow_types::{EventType, InstanceStatus, JournalEntry};

/// Derive the current instance status by replaying journal events left-to-right.
///
/// This is the canonical recovery path: load persisted entries and fold them
/// into the latest `InstanceStatus`.
///
/// Complexity: O(n) over `entries.len()`.
///
/// Precondition: journal invariants are enforced upstream (S-2 guarantees the
/// first event is `WorkflowStarted`), so an empty journal is treated as misuse.
pub fn derive_status(entries: &[JournalEntry]) -> InstanceStatus {
    debug_assert!(
        !entries.is_empty(),
        "derive_status expects non-empty journal (S-2: starts_with_started)"
    );
    debug_assert!(
        matches!(
            entries.first().map(|e| &e.event),
            Some(EventType::WorkflowStarted { .. })
        ),
        "S-2 violated: first event must be WorkflowStarted"
    );
    entries
        .iter()
        .fold(InstanceStatus::Running, |status, entry| {
            derive_next_status(status, &entry.event)
        })
}

/// Apply a single-event status transition.
///
/// Use this in append-time paths where status is already known and a new
/// event arrives; this gives O(1) incremental updates instead of re-folding
/// the journal.
///
/// Semantics match one step of `derive_status`: events that do not affect
/// status return the previous `current_status` unchanged. There is no
/// `Blocked` sub-state here (unlike the engine this journal model was
/// adapted from) — an instance waiting on an effect, timer, or signal is
/// still `Running`; what it is waiting on lives in the pending
/// `EffectScheduled`/`TimerStarted` entries, not in the status itself.
pub(crate) fn derive_next_status(
    current_status: InstanceStatus,
    event_type: &EventType,
) -> InstanceStatus {
    match event_type {
        EventType::WorkflowStarted { .. } => InstanceStatus::Running,
        EventType::WorkflowCancelled { .. } => InstanceStatus::Cancelled,
        EventType::WorkflowCompleted { .. } => InstanceStatus::Completed,
        EventType::WorkflowFailed { .. } => InstanceStatus::Failed,
        EventType::WorkflowTerminated { .. } => InstanceStatus::Terminated,
        _ => current_status,
    }
}
