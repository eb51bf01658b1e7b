//! Control-flow invariants (CF-1).
//!
//! Timers follow a two-phase Started → Fired lifecycle. Signals have no
//! separate delivery/consumption phases in this journal — `SignalReceived`
//! is itself the durable record of arrival, so there is nothing upstream of
//! it to validate against.

use orderflow_types::{EventType, JournalEntry};

use crate::error::JournalViolation;

use super::InvariantState;

/// Validate control-flow invariants against the current accumulated state.
pub(crate) fn check(state: &InvariantState, entry: &JournalEntry) -> Result<(), JournalViolation> {
    // CF-1: TimerFired requires a prior TimerStarted for the same future.
    if let EventType::TimerFired { id } = &entry.event {
        if !state.started_timers.contains(id) {
            return Err(JournalViolation::TimerFiredWithoutStarted {
                future_id: *id,
                fired_seq: entry.sequence,
            });
        }
    }

    Ok(())
}
