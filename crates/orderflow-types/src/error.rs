use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical category for an effect or workflow failure.
///
/// Coarse-grained by design: used for retry-policy decisions (§4.4 retry
/// classification) and as an observability dimension in logs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Input rejected by business rules. Non-retryable. Maps to HTTP 400.
    ValidationError,
    /// Instance or referenced entity absent. Maps to HTTP 404.
    NotFound,
    /// Duplicate start or signal rejected by state. Maps to HTTP 409.
    Conflict,
    /// Operation not valid for the current status (e.g. refund of a pending
    /// payment). Non-retryable at the effect level.
    IllegalState,
    /// Network, gateway, or temporary outage. Retryable.
    Transient,
    /// Cooperative cancellation observed by workflow code.
    Cancelled,
    /// Timer fired before a condition was satisfied.
    Timeout,
    /// Replay divergence detected — fatal to the instance.
    NonDeterministic,
    /// No effect implementation bound to the requested name.
    Unregistered,
    /// A task queue rejected work because its bounded queue was full.
    QueueFull,
    /// Catch-all bucket when no more specific category applies.
    Uncategorized,
}

impl ErrorKind {
    /// Default retryability when a caller's `non_retryable_kinds` set is
    /// silent on this kind (§4.4: "Panics or unknown exceptions are
    /// retryable by default, unless the type is listed").
    pub fn retryable_by_default(&self) -> bool {
        !matches!(
            self,
            ErrorKind::ValidationError
                | ErrorKind::NotFound
                | ErrorKind::Conflict
                | ErrorKind::IllegalState
                | ErrorKind::Cancelled
                | ErrorKind::NonDeterministic
                | ErrorKind::Unregistered
        )
    }
}

/// Structured payload for effect and workflow failures.
///
/// Replaces raw string errors with a shape that is easy to classify
/// (`kind`), render (`message`), and enrich (`detail`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(ref detail) = self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutionError {}
