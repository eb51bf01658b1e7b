use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use orderflow_journal::{resolution, ReplayCache};
use orderflow_types::{EventType, FutureId, JournalEntry, Payload, WorkflowId};

use crate::future::{EffectFuture, SignalFuture, TimerFuture, WaitCondition};

/// The handle workflow code uses to interact with the durable log.
///
/// A fresh `WorkflowContext` is built at the start of every turn from that
/// instance's full history (§4.3: "reconstructed fresh each turn, never
/// persisted between turns"). Calling `start_effect`/`start_timer` either
/// replays an already-recorded outcome from `cache`, or records a brand-new
/// scheduling decision in `new_events` for the scheduler to append once the
/// turn's single poll returns `Pending`.
pub struct WorkflowContext {
    workflow_id: WorkflowId,
    entries: Vec<JournalEntry>,
    pub(crate) cache: ReplayCache,
    next_future_id: Cell<u64>,
    new_events: RefCell<Vec<EventType>>,
    signal_ordinals: RefCell<HashMap<String, usize>>,
    now: DateTime<Utc>,
    cancelled_completion: Cell<bool>,
}

impl WorkflowContext {
    pub fn new(workflow_id: WorkflowId, entries: Vec<JournalEntry>, now: DateTime<Utc>) -> Self {
        let cache = ReplayCache::build(&entries);
        let next_future_id = entries
            .iter()
            .filter_map(|e| match &e.event {
                EventType::EffectScheduled { id, .. } => Some(id.0),
                EventType::TimerStarted { id, .. } => Some(id.0),
                _ => None,
            })
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);

        Self {
            workflow_id,
            entries,
            cache,
            next_future_id: Cell::new(next_future_id),
            new_events: RefCell::new(Vec::new()),
            signal_ordinals: RefCell::new(HashMap::new()),
            now,
            cancelled_completion: Cell::new(false),
        }
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    /// Logical "current time" for this turn. The caller derives this from
    /// the journal frontier (the last committed entry's `recorded_at`), not
    /// the wall clock, so it is stable both within a turn and across every
    /// replay of the same history.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// True once an external `CancelWorkflow` request has been recorded.
    /// Workflow code checks this at its own suspension points (§4.2:
    /// cooperative, edge-triggered cancellation).
    pub fn cancel_requested(&self) -> bool {
        resolution::has_cancel_requested(&self.entries)
    }

    /// Marks the value `run()` is about to return as a cooperative
    /// cancellation rather than an ordinary completion. The scheduler checks
    /// this once the turn's poll resolves to `Ready(Ok(_))` and appends
    /// `WorkflowCancelled` instead of `WorkflowCompleted` (§3, §4.2:
    /// cancellation is cooperative — workflow code decides when and how to
    /// honor it, then reports the outcome through its normal return path).
    pub fn complete_as_cancelled(&self) {
        self.cancelled_completion.set(true);
    }

    pub(crate) fn is_cancelled_completion(&self) -> bool {
        self.cancelled_completion.get()
    }

    fn next_id(&self) -> FutureId {
        let id = self.next_future_id.get();
        self.next_future_id.set(id + 1);
        FutureId(id)
    }

    /// Schedules a named effect invocation, returning a future that resolves
    /// once the journal records its outcome.
    pub fn start_effect(&self, name: impl Into<String>, input: Payload) -> EffectFuture<'_> {
        let id = self.next_id();
        EffectFuture {
            ctx: self,
            id,
            name: name.into(),
            input,
            scheduled: false,
        }
    }

    /// Starts a durable timer that fires after `duration` (measured from
    /// this turn's logical `now`).
    pub fn start_timer(&self, duration: Duration) -> TimerFuture<'_> {
        let id = self.next_id();
        let fire_at = self.now + duration;
        TimerFuture {
            ctx: self,
            id,
            fire_at,
            scheduled: false,
        }
    }

    /// Waits for the next not-yet-consumed delivery of signal `name`.
    ///
    /// Each call, in execution order, claims the next ordinal for `name`
    /// within this replay pass — consistent across turns because workflow
    /// code executes deterministically from the top every time.
    pub fn wait_signal(&self, name: impl Into<String>) -> SignalFuture<'_> {
        let name = name.into();
        let mut ordinals = self.signal_ordinals.borrow_mut();
        let ordinal = *ordinals.get(&name).unwrap_or(&0);
        ordinals.insert(name.clone(), ordinal + 1);
        SignalFuture {
            ctx: self,
            name,
            ordinal,
        }
    }

    /// Convenience alias for `start_timer`, matching the vocabulary workflow
    /// authors reach for when the duration is plain pacing rather than a
    /// business deadline.
    pub fn sleep(&self, duration: Duration) -> TimerFuture<'_> {
        self.start_timer(duration)
    }

    /// Suspends until `predicate` returns `Some`, re-evaluating it every
    /// turn. Used for multi-way rendezvous (e.g. waiting on either of two
    /// independently-arriving signals) that a single `EffectFuture`/
    /// `TimerFuture`/`SignalFuture` can't express alone.
    pub fn wait_condition<F, T>(&self, predicate: F) -> WaitCondition<F>
    where
        F: FnMut() -> Option<T> + Unpin,
    {
        WaitCondition { predicate }
    }

    /// Emits a log line exactly once per durable step, keyed by `step` (the
    /// journal position this line corresponds to once its event is
    /// appended). Workflow `run()` bodies re-execute from the top on every
    /// turn, so a naive `tracing::info!` call would re-fire for already
    /// completed steps on every replay; this suppresses that by only
    /// logging when `step` is not yet covered by `entries`.
    pub fn log_info(&self, step: u64, message: impl std::fmt::Display) {
        if (step as usize) >= self.entries.len() {
            tracing::info!(workflow_id = %self.workflow_id, step, %message, "workflow step");
        }
    }

    pub(crate) fn signal_at(&self, name: &str, ordinal: usize) -> Option<Payload> {
        resolution::received_signals(&self.entries, name)
            .get(ordinal)
            .map(|p| (*p).clone())
    }

    /// True if signal `name` has ever been delivered, regardless of ordinal.
    ///
    /// For idempotent, flag-style signals (commit/cancel) where only
    /// presence matters — unlike `wait_signal`, which hands back an ordered
    /// queue of distinct deliveries.
    pub fn signal_received(&self, name: &str) -> bool {
        !resolution::received_signals(&self.entries, name).is_empty()
    }

    pub(crate) fn record_effect_scheduled(&self, id: FutureId, name: String, input: Payload) {
        if resolution::is_effect_scheduled(&self.entries, id) {
            return;
        }
        self.new_events
            .borrow_mut()
            .push(EventType::EffectScheduled { id, name, input });
    }

    pub(crate) fn record_timer_started(&self, id: FutureId, fire_at: DateTime<Utc>) {
        if resolution::is_timer_started(&self.entries, id) {
            return;
        }
        self.new_events
            .borrow_mut()
            .push(EventType::TimerStarted { id, fire_at });
    }

    /// Drains the decisions workflow code made this turn that are not yet
    /// durable. Called by the scheduler after the turn's single poll.
    pub fn take_new_events(&self) -> Vec<EventType> {
        std::mem::take(&mut self.new_events.borrow_mut())
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use std::task::Poll;

    use orderflow_types::{Codec, ErrorKind, ExecutionError};

    use super::*;
    use crate::future::poll_once;

    fn payload(bytes: &[u8]) -> Payload {
        Payload::new(bytes.to_vec(), Codec::Json)
    }

    fn entry(sequence: u64, event: EventType) -> JournalEntry {
        JournalEntry::new(sequence, Utc::now(), event)
    }

    #[test]
    fn start_effect_on_fresh_context_suspends_and_records_scheduling() {
        let ctx = WorkflowContext::new(
            WorkflowId::new("order-1"),
            vec![entry(0, EventType::WorkflowStarted { input: payload(&[]) })],
            Utc::now(),
        );

        let mut fut = ctx.start_effect("validate_order", payload(&[1]));
        assert_eq!(poll_once(&mut fut), Poll::Pending);
        drop(fut);

        let new_events = ctx.take_new_events();
        assert_eq!(new_events.len(), 1);
        assert!(matches!(
            &new_events[0],
            EventType::EffectScheduled { id, name, .. } if *id == FutureId(0) && name == "validate_order"
        ));
    }

    #[test]
    fn start_effect_resolves_immediately_from_replay_cache() {
        let ctx = WorkflowContext::new(
            WorkflowId::new("order-1"),
            vec![
                entry(0, EventType::WorkflowStarted { input: payload(&[]) }),
                entry(
                    1,
                    EventType::EffectScheduled {
                        id: FutureId(0),
                        name: "validate_order".to_string(),
                        input: payload(&[1]),
                    },
                ),
                entry(
                    2,
                    EventType::EffectCompleted {
                        id: FutureId(0),
                        output: payload(&[9]),
                    },
                ),
            ],
            Utc::now(),
        );

        let mut fut = ctx.start_effect("validate_order", payload(&[1]));
        assert_eq!(poll_once(&mut fut), Poll::Ready(Ok(payload(&[9]))));
        // A resolved future never records a fresh scheduling decision.
        drop(fut);
        assert!(ctx.take_new_events().is_empty());
    }

    #[test]
    fn failed_effect_replays_as_err() {
        let ctx = WorkflowContext::new(
            WorkflowId::new("order-1"),
            vec![
                entry(0, EventType::WorkflowStarted { input: payload(&[]) }),
                entry(
                    1,
                    EventType::EffectScheduled {
                        id: FutureId(0),
                        name: "validate_order".to_string(),
                        input: payload(&[]),
                    },
                ),
                entry(
                    2,
                    EventType::EffectFailed {
                        id: FutureId(0),
                        kind: ErrorKind::ValidationError,
                        message: "bad order".to_string(),
                        attempt: 1,
                    },
                ),
            ],
            Utc::now(),
        );

        let mut fut = ctx.start_effect("validate_order", payload(&[]));
        let outcome = poll_once(&mut fut);
        assert_eq!(
            outcome,
            Poll::Ready(Err(ExecutionError::new(ErrorKind::ValidationError, "bad order")))
        );
    }

    #[test]
    fn next_future_id_continues_past_existing_history() {
        let ctx = WorkflowContext::new(
            WorkflowId::new("order-1"),
            vec![
                entry(0, EventType::WorkflowStarted { input: payload(&[]) }),
                entry(
                    1,
                    EventType::EffectScheduled {
                        id: FutureId(0),
                        name: "validate_order".to_string(),
                        input: payload(&[]),
                    },
                ),
                entry(
                    2,
                    EventType::TimerStarted {
                        id: FutureId(1),
                        fire_at: Utc::now(),
                    },
                ),
            ],
            Utc::now(),
        );

        let mut fut = ctx.start_effect("notify_manager", payload(&[]));
        assert_eq!(poll_once(&mut fut), Poll::Pending);
        drop(fut);

        let new_events = ctx.take_new_events();
        assert!(matches!(
            &new_events[0],
            EventType::EffectScheduled { id, .. } if *id == FutureId(2)
        ));
    }

    #[test]
    fn wait_signal_claims_ordinals_in_call_order() {
        let ctx = WorkflowContext::new(
            WorkflowId::new("order-1"),
            vec![
                entry(0, EventType::WorkflowStarted { input: payload(&[]) }),
                entry(
                    1,
                    EventType::SignalReceived {
                        name: "decision".to_string(),
                        payload: payload(&[1]),
                    },
                ),
            ],
            Utc::now(),
        );

        let mut first = ctx.wait_signal("decision");
        assert_eq!(poll_once(&mut first), Poll::Ready(payload(&[1])));

        let mut second = ctx.wait_signal("decision");
        assert_eq!(poll_once(&mut second), Poll::Pending);
    }

    #[test]
    fn complete_as_cancelled_is_observable_after_marking() {
        let ctx = WorkflowContext::new(
            WorkflowId::new("order-1"),
            vec![entry(0, EventType::WorkflowStarted { input: payload(&[]) })],
            Utc::now(),
        );

        assert!(!ctx.is_cancelled_completion());
        ctx.complete_as_cancelled();
        assert!(ctx.is_cancelled_completion());
    }

    #[test]
    fn cancel_requested_reflects_journal() {
        let ctx = WorkflowContext::new(
            WorkflowId::new("order-1"),
            vec![
                entry(0, EventType::WorkflowStarted { input: payload(&[]) }),
                entry(
                    1,
                    EventType::WorkflowCancelRequested {
                        reason: "operator".to_string(),
                    },
                ),
            ],
            Utc::now(),
        );

        assert!(ctx.cancel_requested());
    }
}
