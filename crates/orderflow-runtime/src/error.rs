use thiserror::Error;

use orderflow_types::{ErrorKind, ExecutionError, WorkflowId};

/// Errors produced by the engine facade (`StartWorkflow`/`SignalWorkflow`/etc.)
/// and by the scheduler's internal turn machinery.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("workflow {0} not found")]
    NotFound(WorkflowId),
    #[error("workflow {0} already running")]
    Conflict(WorkflowId),
    #[error("no workflow or effect registered as {0:?}")]
    Unregistered(String),
    #[error("task queue {0:?} is at capacity")]
    QueueFull(String),
    #[error(transparent)]
    Journal(#[from] orderflow_journal::JournalError),
    #[error("workflow execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl EngineError {
    /// Coarse classification mirroring `ExecutionError::kind`, for callers
    /// that want to map engine errors onto the same error taxonomy used for
    /// effect/workflow failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Unregistered(_) => ErrorKind::Unregistered,
            EngineError::QueueFull(_) => ErrorKind::QueueFull,
            EngineError::Journal(_) => ErrorKind::NonDeterministic,
            EngineError::Execution(e) => e.kind.clone(),
        }
    }
}
