use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, ExecutionError};
use crate::ids::FutureId;
use crate::payload::Payload;

/// Every non-deterministic fact a workflow instance observes, recorded in
/// journal order (§3). Replaying this sequence reproduces the workflow's
/// decisions byte-for-byte.
///
/// Three variants are additive beyond the event list in DESIGN.md's
/// grounding notes:
/// - `EffectRetryScheduled` records an intermediate retry attempt, making
///   the "retries ≤ max_attempts" testable property directly observable in
///   the log instead of only in ephemeral in-memory task state (grounded in
///   `invariant_types::EventType::InvokeRetrying`).
/// - `WorkflowCancelled` is a distinct terminal event (mirroring
///   `ExecutionCancelled`) so the engine-level `CANCELLED` instance status
///   has its own event rather than overloading `WorkflowCompleted`.
/// - `WorkflowTerminated` backs the forceful, non-cooperative
///   `TerminateWorkflow` operation, giving the `TERMINATED` instance status
///   its own terminal event the same way `WorkflowCancelled` backs
///   `CANCELLED`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EventType {
    /// Always the first event (S-2).
    WorkflowStarted { input: Payload },

    /// Intent to invoke a named effect. Enables exactly-once via replay
    /// matching on `id`.
    EffectScheduled {
        id: FutureId,
        name: String,
        input: Payload,
    },
    /// Effect succeeded. Cached for replay.
    EffectCompleted { id: FutureId, output: Payload },
    /// Effect failed permanently (non-retryable, or retries exhausted).
    EffectFailed {
        id: FutureId,
        kind: ErrorKind,
        message: String,
        attempt: u32,
    },
    /// A transient failure will be retried after backoff. Not terminal for
    /// the effect; `EffectCompleted`/`EffectFailed` eventually follows.
    EffectRetryScheduled {
        id: FutureId,
        attempt: u32,
        kind: ErrorKind,
        message: String,
        retry_at: DateTime<Utc>,
    },

    /// `sleep`/`start_timer` called. Records the computed fire time.
    TimerStarted { id: FutureId, fire_at: DateTime<Utc> },
    /// Timer duration elapsed.
    TimerFired { id: FutureId },

    /// An asynchronous signal was delivered and durably queued.
    SignalReceived { name: String, payload: Payload },

    /// Workflow function returned successfully (terminal).
    WorkflowCompleted { output: Payload },
    /// Workflow function returned an error, or an internal failure occurred
    /// (terminal).
    WorkflowFailed { error: ExecutionError },
    /// External `CancelWorkflow` request arrived (§4.2 cancellation).
    WorkflowCancelRequested { reason: String },
    /// Cancellation was observed and handled by workflow code (terminal).
    /// Requires a preceding `WorkflowCancelRequested`.
    WorkflowCancelled { output: Payload },
    /// External `TerminateWorkflow` forced an immediate stop (terminal).
    /// Unlike `WorkflowCancelled`, never preceded by a cooperative request —
    /// workflow code never runs again after this is appended.
    WorkflowTerminated { reason: String },
}

impl EventType {
    /// Variant name, used for error messages and logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::WorkflowStarted { .. } => "WorkflowStarted",
            Self::EffectScheduled { .. } => "EffectScheduled",
            Self::EffectCompleted { .. } => "EffectCompleted",
            Self::EffectFailed { .. } => "EffectFailed",
            Self::EffectRetryScheduled { .. } => "EffectRetryScheduled",
            Self::TimerStarted { .. } => "TimerStarted",
            Self::TimerFired { .. } => "TimerFired",
            Self::SignalReceived { .. } => "SignalReceived",
            Self::WorkflowCompleted { .. } => "WorkflowCompleted",
            Self::WorkflowFailed { .. } => "WorkflowFailed",
            Self::WorkflowCancelRequested { .. } => "WorkflowCancelRequested",
            Self::WorkflowCancelled { .. } => "WorkflowCancelled",
            Self::WorkflowTerminated { .. } => "WorkflowTerminated",
        }
    }

    /// Whether this event ends the instance (§3: COMPLETED/FAILED/CANCELLED/TERMINATED).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::WorkflowCompleted { .. }
                | Self::WorkflowFailed { .. }
                | Self::WorkflowCancelled { .. }
                | Self::WorkflowTerminated { .. }
        )
    }
}
