use std::collections::HashMap;

use orderflow_types::{EventType, FutureId, JournalEntry, Payload};

/// Replay-time cached value for a resolved future.
///
/// Each variant corresponds to one event kind that can be replayed by future ID.
#[derive(Clone, Debug, PartialEq)]
pub enum CachedResult {
    /// From `EffectCompleted { output, .. }`.
    Effect(Payload),
    /// From `EffectFailed { .. }` — the effect terminated, permanently, in error.
    EffectFailed(orderflow_types::ExecutionError),
    /// From `TimerFired { .. }`.
    Timer,
    /// From `SignalReceived { payload, .. }`, keyed by the signal future that
    /// was waiting on it rather than by name, so two pending waits on the
    /// same signal name never collide.
    Signal(Payload),
}

/// Batch-built replay cache keyed by `FutureId`.
///
/// Construction is a single O(n) scan over journal entries. Replaying
/// workflow code calls `start_effect`/`start_timer`/`wait_signal` in the
/// same order every time (determinism is the workflow author's job); this
/// cache lets the runtime hand back the recorded outcome for each call
/// without re-invoking anything.
#[derive(Clone, Debug, Default)]
pub struct ReplayCache {
    results: HashMap<FutureId, CachedResult>,
}

impl ReplayCache {
    /// Build cache entries from a full journal history in one pass.
    ///
    /// Cached event kinds:
    /// - `EffectCompleted` -> `CachedResult::Effect`
    /// - `EffectFailed` -> `CachedResult::EffectFailed`
    /// - `TimerFired` -> `CachedResult::Timer`
    ///
    /// `SignalReceived` is intentionally *not* cached here: signals are not
    /// addressed by `FutureId` (a signal can arrive before anything is
    /// waiting on it), so the runtime resolves them by name via
    /// `resolution::received_signals` instead.
    pub fn build(entries: &[JournalEntry]) -> Self {
        let mut results = HashMap::new();

        for entry in entries {
            match &entry.event {
                EventType::EffectCompleted { id, output } => {
                    results.insert(*id, CachedResult::Effect(output.clone()));
                }
                EventType::EffectFailed { id, kind, message, .. } => {
                    results.insert(
                        *id,
                        CachedResult::EffectFailed(orderflow_types::ExecutionError::new(
                            kind.clone(),
                            message.clone(),
                        )),
                    );
                }
                EventType::TimerFired { id } => {
                    results.insert(*id, CachedResult::Timer);
                }
                _ => {}
            }
        }

        Self { results }
    }

    /// Generic lookup by future ID.
    pub fn lookup(&self, id: &FutureId) -> Option<&CachedResult> {
        self.results.get(id)
    }

    /// Typed accessor for a completed effect's output.
    pub fn get_effect(&self, id: &FutureId) -> Option<&Payload> {
        match self.lookup(id) {
            Some(CachedResult::Effect(payload)) => Some(payload),
            _ => None,
        }
    }

    /// Typed accessor for a permanently failed effect's error.
    pub fn get_effect_failure(&self, id: &FutureId) -> Option<&orderflow_types::ExecutionError> {
        match self.lookup(id) {
            Some(CachedResult::EffectFailed(err)) => Some(err),
            _ => None,
        }
    }

    /// True if timer completion was recorded for this future.
    pub fn is_timer_complete(&self, id: &FutureId) -> bool {
        matches!(self.lookup(id), Some(CachedResult::Timer))
    }

    /// Number of cached future results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True when no future results are cached.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use orderflow_types::{Codec, ErrorKind};

    use super::*;

    fn payload(bytes: &[u8]) -> Payload {
        Payload::new(bytes.to_vec(), Codec::Json)
    }

    fn entry(sequence: u64, event: EventType) -> JournalEntry {
        JournalEntry::new(sequence, Utc::now(), event)
    }

    #[test]
    fn build_caches_all_supported_event_types() {
        let f_effect = FutureId(1);
        let f_failed = FutureId(2);
        let f_timer = FutureId(3);

        let entries = vec![
            entry(
                0,
                EventType::EffectCompleted {
                    id: f_effect,
                    output: payload(&[1]),
                },
            ),
            entry(
                1,
                EventType::EffectFailed {
                    id: f_failed,
                    kind: ErrorKind::ValidationError,
                    message: "bad input".to_string(),
                    attempt: 1,
                },
            ),
            entry(2, EventType::TimerFired { id: f_timer }),
            // Not cached: signals are resolved by name, not future id.
            entry(
                3,
                EventType::SignalReceived {
                    name: "approval".to_string(),
                    payload: payload(&[2]),
                },
            ),
        ];

        let cache = ReplayCache::build(&entries);

        assert_eq!(cache.len(), 3);
        assert!(!cache.is_empty());
        assert_eq!(cache.get_effect(&f_effect), Some(&payload(&[1])));
        assert_eq!(
            cache.get_effect_failure(&f_failed).map(|e| &e.kind),
            Some(&ErrorKind::ValidationError)
        );
        assert!(cache.is_timer_complete(&f_timer));
    }

    #[test]
    fn typed_accessors_fail_closed_on_variant_mismatch() {
        let f_effect = FutureId(11);
        let entries = vec![entry(
            0,
            EventType::EffectCompleted {
                id: f_effect,
                output: payload(&[9]),
            },
        )];
        let cache = ReplayCache::build(&entries);

        assert!(cache.get_effect_failure(&f_effect).is_none());
        assert!(!cache.is_timer_complete(&f_effect));
    }
}
