use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-chosen, globally unique identifier for a workflow instance.
///
/// Stable for the lifetime of the instance; starting a new workflow with an
/// already-running `WorkflowId` is rejected with `Conflict` (§6).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WorkflowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque run identifier. A fresh `RunId` is minted every time
/// `StartWorkflow` creates a new instance for a given `WorkflowId`; it never
/// changes across replays of that instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-instance monotonic counter identifying a single in-flight effect or
/// timer ("future"). Minted by the workflow runtime each time workflow code
/// calls `start_effect`/`start_timer`.
///
/// Deliberately flat rather than hash-derived from a call tree: this engine
/// has no nested child-workflow executions, so a per-instance counter gives
/// the same uniqueness and determinism guarantee with far less machinery —
/// see DESIGN.md.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FutureId(pub u64);

impl fmt::Display for FutureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}
