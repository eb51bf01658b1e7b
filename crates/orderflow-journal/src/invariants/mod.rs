//! Journal invariant checking engine.
//!
//! Provides two modes of validation:
//! - **Incremental** ([`InvariantState::check_append`]): O(1) per entry via auxiliary state.
//!   Used at append time to reject invalid entries before they hit the journal.
//! - **Batch** ([`validate_journal`]): O(n) full scan that collects all violations.
//!   Used for diagnostics and journal recovery.
//!
//! Invariants are grouped into three sub-modules (10 checks total):
//! - [`structural`] (S-1..S-5): Sequence numbering, lifecycle bookends, terminal uniqueness.
//! - [`side_effects`] (SE-1..SE-4): Effect lifecycle ordering (Scheduled -> Completed/Failed/Retry).
//! - [`control_flow`] (CF-1): Timer consistency.
//!
//! Each sub-module exposes a single `check(&InvariantState, &JournalEntry) -> Result<(), JournalViolation>`
//! function. Sub-modules are read-only over state; all mutations happen in [`InvariantState::apply_entry`].

mod control_flow;
mod side_effects;
mod structural;

use std::collections::HashSet;

use orderflow_types::{EventType, FutureId, JournalEntry};

use crate::error::JournalViolation;

/// Accumulated auxiliary state for O(1) incremental invariant checking.
///
/// Each field tracks just enough information from previously ingested entries
/// to validate the next append without rescanning the journal. Fields are
/// `pub(crate)` so sub-module checkers can read them; only [`apply_entry`]
/// mutates them.
#[derive(Clone, Debug, Default)]
pub struct InvariantState {
    /// Number of entries ingested so far. Used by S-1 (expected sequence == len).
    pub(crate) len: usize,

    /// Sequence number of the first terminal event, if any. Used by S-3 and S-4.
    pub(crate) terminal_seq: Option<u64>,

    /// Whether a `WorkflowCancelRequested` event has been seen. Required by
    /// S-5 before `WorkflowCancelled` is allowed.
    pub(crate) has_cancel_requested: bool,

    /// Future IDs from `EffectScheduled` events. Checked by SE-1..SE-3.
    pub(crate) scheduled_futures: HashSet<FutureId>,

    /// Future IDs that reached `EffectCompleted` or `EffectFailed`. Checked by SE-4.
    pub(crate) effect_terminal: HashSet<FutureId>,

    /// Future IDs from `TimerStarted` events. Checked by CF-1.
    pub(crate) started_timers: HashSet<FutureId>,
}

impl InvariantState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and ingest a single journal entry (incremental path).
    ///
    /// Runs all three invariant groups against the current accumulated
    /// state, then updates state on success.
    pub fn check_append(&mut self, entry: &JournalEntry) -> Result<(), JournalViolation> {
        structural::check(self, entry)?;
        side_effects::check(self, entry)?;
        control_flow::check(self, entry)?;
        self.apply_entry(entry);
        Ok(())
    }

    /// Run all invariant groups, collecting up to one violation per group.
    ///
    /// Unlike [`check_append`], this does not short-circuit across groups --
    /// all three groups run regardless of earlier failures. Used by
    /// [`validate_journal`] to surface multiple independent issues in a
    /// single pass over a corrupt journal.
    fn collect_entry_violations(&self, entry: &JournalEntry, violations: &mut Vec<JournalViolation>) {
        if let Err(v) = structural::check(self, entry) {
            violations.push(v);
        }
        if let Err(v) = side_effects::check(self, entry) {
            violations.push(v);
        }
        if let Err(v) = control_flow::check(self, entry) {
            violations.push(v);
        }
    }

    /// Update auxiliary state after an entry passes validation (or is force-applied
    /// during batch validation).
    ///
    /// Centralized here rather than spread across sub-modules so that all state
    /// mutations are visible in one place. Increments `len` as the final step.
    fn apply_entry(&mut self, entry: &JournalEntry) {
        match &entry.event {
            EventType::WorkflowCompleted { .. }
            | EventType::WorkflowFailed { .. }
            | EventType::WorkflowCancelled { .. }
            | EventType::WorkflowTerminated { .. } => {
                self.terminal_seq.get_or_insert(entry.sequence);
            }
            EventType::WorkflowCancelRequested { .. } => {
                self.has_cancel_requested = true;
            }
            EventType::EffectScheduled { id, .. } => {
                self.scheduled_futures.insert(*id);
            }
            EventType::EffectCompleted { id, .. } | EventType::EffectFailed { id, .. } => {
                self.effect_terminal.insert(*id);
            }
            EventType::TimerStarted { id, .. } => {
                self.started_timers.insert(*id);
            }
            // Events that don't contribute to invariant state:
            // EffectRetryScheduled, TimerFired, SignalReceived
            _ => {}
        }
        self.len += 1;
    }
}

/// Batch-validate an entire journal, returning all detected violations.
///
/// Creates a fresh [`InvariantState`] and feeds every entry through
/// [`InvariantState::collect_entry_violations`], always applying state
/// regardless of errors so that later entries are checked against accurate
/// accumulated state. An empty journal is reported as
/// [`JournalViolation::MissingWorkflowStarted`].
pub fn validate_journal(entries: &[JournalEntry]) -> Vec<JournalViolation> {
    if entries.is_empty() {
        return vec![JournalViolation::MissingWorkflowStarted {
            first_event: "<empty>".to_string(),
        }];
    }

    let mut state = InvariantState::new();
    let mut violations = Vec::new();

    for entry in entries {
        state.collect_entry_violations(entry, &mut violations);
        state.apply_entry(entry);
    }

    violations
}
