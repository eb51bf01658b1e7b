use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use orderflow_types::{EventType, JournalEntry, WorkflowId};

use crate::error::EngineError;

/// Durable append-only store for per-instance event journals (§4.1).
///
/// Implementations must guarantee that `append` is atomic and rejects a
/// caller whose view of the log was stale (optimistic concurrency via
/// `expected_len`), so two workers racing to resume the same instance can
/// never both append past the same point. The in-process scheduler already
/// serializes appends behind a per-instance lock, so `InMemoryLog` treats a
/// length mismatch as a programming error rather than a contended retry
/// path; a persistent implementation backed by a real store would surface it
/// to callers instead.
#[async_trait]
pub trait DurableLog: Send + Sync {
    /// Full history for `id`, in sequence order. Empty if unknown.
    async fn read(&self, id: &WorkflowId) -> Result<Vec<JournalEntry>, EngineError>;

    /// Append `events` atomically, starting at `expected_len`. Returns the
    /// newly created entries (stamped with sequence numbers and `recorded_at`).
    async fn append(
        &self,
        id: &WorkflowId,
        expected_len: usize,
        events: Vec<EventType>,
    ) -> Result<Vec<JournalEntry>, EngineError>;

    /// True if `id` has any recorded history.
    async fn exists(&self, id: &WorkflowId) -> Result<bool, EngineError>;
}

/// Reference `DurableLog` backed by an in-memory map, guarded by a
/// `std::sync::Mutex` since critical sections are short, synchronous
/// vec operations (no `.await` held across the lock).
#[derive(Default)]
pub struct InMemoryLog {
    instances: Mutex<HashMap<WorkflowId, Vec<JournalEntry>>>,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableLog for InMemoryLog {
    async fn read(&self, id: &WorkflowId) -> Result<Vec<JournalEntry>, EngineError> {
        let instances = self.instances.lock().expect("log mutex poisoned");
        Ok(instances.get(id).cloned().unwrap_or_default())
    }

    async fn append(
        &self,
        id: &WorkflowId,
        expected_len: usize,
        events: Vec<EventType>,
    ) -> Result<Vec<JournalEntry>, EngineError> {
        let mut instances = self.instances.lock().expect("log mutex poisoned");
        let entries = instances.entry(id.clone()).or_default();

        if entries.len() != expected_len {
            return Err(EngineError::Journal(orderflow_journal::JournalError::ConcurrentAppend {
                expected: expected_len,
                actual: entries.len(),
            }));
        }

        let mut appended = Vec::with_capacity(events.len());
        let now = Utc::now();
        for event in events {
            let sequence = entries.len() as u64;
            let entry = JournalEntry::new(sequence, now, event);
            entries.push(entry.clone());
            appended.push(entry);
        }
        Ok(appended)
    }

    async fn exists(&self, id: &WorkflowId) -> Result<bool, EngineError> {
        let instances = self.instances.lock().expect("log mutex poisoned");
        Ok(instances.contains_key(id))
    }
}
