use orderflow_types::FutureId;

/// Describes a specific journal invariant violation.
///
/// Grouped: Structural (S-1..S-5), Side Effects (SE-1..SE-4), Control Flow
/// (CF-1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalViolation {
    /// S-1: Sequence numbers must equal their array index (0-indexed, strict equality).
    NonMonotonicSequence {
        entry_index: usize,
        expected: u64,
        actual: u64,
    },
    /// S-2: The first event in every journal must be `WorkflowStarted`.
    MissingWorkflowStarted { first_event: String },
    /// S-3: At most one terminal event per journal.
    MultipleTerminalEvents { first_at: u64, second_at: u64 },
    /// S-4: A terminal event must be the last entry in the journal.
    TerminalNotLast {
        terminal_seq: u64,
        journal_len: usize,
    },
    /// S-5: `WorkflowCancelled` requires a preceding `WorkflowCancelRequested`.
    CancelledWithoutRequest { cancelled_seq: u64 },

    /// SE-1: `EffectCompleted` requires a preceding `EffectScheduled` for the same future.
    CompletedWithoutScheduled {
        future_id: FutureId,
        completed_seq: u64,
    },
    /// SE-2: `EffectFailed` requires a preceding `EffectScheduled` for the same future.
    FailedWithoutScheduled {
        future_id: FutureId,
        failed_seq: u64,
    },
    /// SE-3: `EffectRetryScheduled` requires a preceding `EffectScheduled` for the same future.
    RetryWithoutScheduled {
        future_id: FutureId,
        retry_seq: u64,
    },
    /// SE-4: No event for a future may follow its `EffectCompleted`/`EffectFailed`.
    EventAfterEffectTerminal {
        future_id: FutureId,
        offending_seq: u64,
        offending_event: String,
    },

    /// CF-1: `TimerFired` requires a preceding `TimerStarted` for the same future.
    TimerFiredWithoutStarted { future_id: FutureId, fired_seq: u64 },
}

/// Errors produced by journal operations.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("journal is empty")]
    EmptyJournal,
    #[error("invariant violation: {0}")]
    InvariantViolation(JournalViolation),
    /// Optimistic-concurrency failure: a caller's `expected_len` didn't
    /// match the log's current length. The scheduler must abort the turn
    /// and retry from the last committed sequence (§4.1).
    #[error("concurrent append: expected log length {expected}, found {actual}")]
    ConcurrentAppend { expected: usize, actual: usize },
}

impl std::fmt::Display for JournalViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonMonotonicSequence {
                entry_index,
                expected,
                actual,
            } => write!(
                f,
                "S-1: non-monotonic sequence at index {entry_index}: expected {expected}, got {actual}"
            ),
            Self::MissingWorkflowStarted { first_event } => write!(
                f,
                "S-2: first event must be WorkflowStarted, got {first_event}"
            ),
            Self::MultipleTerminalEvents {
                first_at,
                second_at,
            } => write!(
                f,
                "S-3: multiple terminal events at seq {first_at} and {second_at}"
            ),
            Self::TerminalNotLast {
                terminal_seq,
                journal_len,
            } => write!(
                f,
                "S-4: terminal event at seq {terminal_seq} is not last (journal len {journal_len})"
            ),
            Self::CancelledWithoutRequest { cancelled_seq } => write!(
                f,
                "S-5: WorkflowCancelled at seq {cancelled_seq} without prior WorkflowCancelRequested"
            ),
            Self::CompletedWithoutScheduled {
                future_id,
                completed_seq,
            } => write!(
                f,
                "SE-1: EffectCompleted at seq {completed_seq} for {future_id} without prior EffectScheduled"
            ),
            Self::FailedWithoutScheduled {
                future_id,
                failed_seq,
            } => write!(
                f,
                "SE-2: EffectFailed at seq {failed_seq} for {future_id} without prior EffectScheduled"
            ),
            Self::RetryWithoutScheduled {
                future_id,
                retry_seq,
            } => write!(
                f,
                "SE-3: EffectRetryScheduled at seq {retry_seq} for {future_id} without prior EffectScheduled"
            ),
            Self::EventAfterEffectTerminal {
                future_id,
                offending_seq,
                offending_event,
            } => write!(
                f,
                "SE-4: {offending_event} at seq {offending_seq} for {future_id} after its effect terminal"
            ),
            Self::TimerFiredWithoutStarted {
                future_id,
                fired_seq,
            } => write!(
                f,
                "CF-1: TimerFired at seq {fired_seq} for {future_id} without prior TimerStarted"
            ),
        }
    }
}
