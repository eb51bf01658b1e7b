//! Side-effect invariants (SE-1 through SE-4).
//!
//! Effects have no separate "started" phase in this journal — a single
//! `EffectScheduled` event covers both intent and dispatch. Scheduled gates
//! the three outcomes an in-flight effect can reach: `EffectCompleted`,
//! `EffectFailed`, and the intermediate `EffectRetryScheduled`.
//! `EffectCompleted`/`EffectFailed` are absorbing — no further event for the
//! same future may follow either.

use orderflow_types::{EventType, JournalEntry};

use crate::error::JournalViolation;

use super::InvariantState;

/// Validate side-effect invariants against the current accumulated state.
///
/// Within each event arm, SE-4 (effect finality) is checked before the
/// predecessor check, so a misleading "missing EffectScheduled" error never
/// masks the more fundamental "event after the effect already terminated".
pub(crate) fn check(state: &InvariantState, entry: &JournalEntry) -> Result<(), JournalViolation> {
    match &entry.event {
        EventType::EffectCompleted { id, .. } => {
            if state.effect_terminal.contains(id) {
                return Err(JournalViolation::EventAfterEffectTerminal {
                    future_id: *id,
                    offending_seq: entry.sequence,
                    offending_event: entry.event.name().to_string(),
                });
            }
            if !state.scheduled_futures.contains(id) {
                return Err(JournalViolation::CompletedWithoutScheduled {
                    future_id: *id,
                    completed_seq: entry.sequence,
                });
            }
        }
        EventType::EffectFailed { id, .. } => {
            if state.effect_terminal.contains(id) {
                return Err(JournalViolation::EventAfterEffectTerminal {
                    future_id: *id,
                    offending_seq: entry.sequence,
                    offending_event: entry.event.name().to_string(),
                });
            }
            if !state.scheduled_futures.contains(id) {
                return Err(JournalViolation::FailedWithoutScheduled {
                    future_id: *id,
                    failed_seq: entry.sequence,
                });
            }
        }
        EventType::EffectRetryScheduled { id, .. } => {
            if state.effect_terminal.contains(id) {
                return Err(JournalViolation::EventAfterEffectTerminal {
                    future_id: *id,
                    offending_seq: entry.sequence,
                    offending_event: entry.event.name().to_string(),
                });
            }
            if !state.scheduled_futures.contains(id) {
                return Err(JournalViolation::RetryWithoutScheduled {
                    future_id: *id,
                    retry_seq: entry.sequence,
                });
            }
        }
        _ => {}
    }
    Ok(())
}
