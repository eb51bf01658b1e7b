use orderflow_types::{EventType, FutureId, JournalEntry};

/// Returns true if the effect identified by `id` was ever scheduled.
///
/// Scan complexity: O(n).
pub fn is_effect_scheduled(entries: &[JournalEntry], id: FutureId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::EffectScheduled { id: scheduled, .. } => *scheduled == id,
        _ => false,
    })
}

/// Returns true if the effect identified by `id` reached a terminal outcome
/// (`EffectCompleted` or `EffectFailed`).
///
/// Scan complexity: O(n).
pub fn is_effect_terminal(entries: &[JournalEntry], id: FutureId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::EffectCompleted { id: done, .. } => *done == id,
        EventType::EffectFailed { id: done, .. } => *done == id,
        _ => false,
    })
}

/// Returns true if the timer identified by `id` was ever started.
///
/// Scan complexity: O(n).
pub fn is_timer_started(entries: &[JournalEntry], id: FutureId) -> bool {
    entries.iter().any(|e| match &e.event {
        EventType::TimerStarted { id: started, .. } => *started == id,
        _ => false,
    })
}

/// Returns true if the timer identified by `id` was ever fired.
///
/// Scan complexity: O(n).
pub fn is_timer_fired(entries: &[JournalEntry], id: FutureId) -> bool {
    entries
        .iter()
        .any(|e| matches!(&e.event, EventType::TimerFired { id: fired } if *fired == id))
}

/// Returns the journal-order list of payloads delivered for signal `name`.
///
/// Unlike effects and timers, signals are not addressed by `FutureId` — a
/// signal can be durably recorded before any workflow code is waiting on it.
/// Callers track how many of these they've already consumed (by position)
/// to make repeated replay deterministic.
///
/// Scan complexity: O(n).
pub fn received_signals<'a>(entries: &'a [JournalEntry], name: &str) -> Vec<&'a orderflow_types::Payload> {
    entries
        .iter()
        .filter_map(|e| match &e.event {
            EventType::SignalReceived { name: n, payload } if n == name => Some(payload),
            _ => None,
        })
        .collect()
}

/// Returns true if a cancellation request appears anywhere in the journal.
///
/// Scan complexity: O(n).
pub fn has_cancel_requested(entries: &[JournalEntry]) -> bool {
    entries
        .iter()
        .any(|e| matches!(e.event, EventType::WorkflowCancelRequested { .. }))
}

/// Returns the first terminal event in journal order, if present.
///
/// Scan complexity: O(n).
pub fn terminal_event(entries: &[JournalEntry]) -> Option<&EventType> {
    entries.iter().find_map(|e| {
        if e.event.is_terminal() {
            Some(&e.event)
        } else {
            None
        }
    })
}

/// Counts retry attempts (`EffectRetryScheduled`) recorded for effect `id`.
///
/// Scan complexity: O(n).
pub fn retry_count(entries: &[JournalEntry], id: FutureId) -> usize {
    entries
        .iter()
        .filter(|e| matches!(&e.event, EventType::EffectRetryScheduled { id: r, .. } if *r == id))
        .count()
}
