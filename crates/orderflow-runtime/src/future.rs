use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use orderflow_types::{ExecutionError, FutureId, Payload};

use crate::context::WorkflowContext;

/// A `Waker` that does nothing when woken.
///
/// Workflow futures never actually suspend the executor on an external
/// notification: every turn polls the workflow's future exactly once, and
/// whether it is ready is decided entirely by what's already in the replay
/// cache. There is nothing for a real waker to wake — the next turn happens
/// when a worker appends a new event and calls back into the scheduler, not
/// when this waker fires. A `Waker` is still required by `Future::poll`'s
/// signature, so this supplies an inert one instead of pulling in an async
/// runtime's waker machinery for a single poll.
fn noop_raw_waker() -> RawWaker {
    fn clone(_: *const ()) -> RawWaker {
        noop_raw_waker()
    }
    fn wake(_: *const ()) {}
    fn wake_by_ref(_: *const ()) {}
    fn drop(_: *const ()) {}

    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop);
    RawWaker::new(std::ptr::null(), &VTABLE)
}

/// Builds an inert waker for driving a workflow future through one `poll`.
pub fn noop_waker() -> Waker {
    unsafe { Waker::from_raw(noop_raw_waker()) }
}

/// Polls `future` exactly once using [`noop_waker`] and returns the result.
///
/// This is the entire "executor" this crate needs: workflow code is no more
/// than a chain of these futures, and a turn is one poll of the top-level
/// future built from the workflow's `run`.
pub fn poll_once<F: Future + Unpin>(future: &mut F) -> Poll<F::Output> {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    Pin::new(future).poll(&mut cx)
}

/// Future returned by [`WorkflowContext::start_effect`].
///
/// Resolves immediately (on the very first poll) if the replay cache already
/// has an outcome for `id`; otherwise records the scheduling intent in the
/// context's pending buffer and returns `Pending` forever (a fresh instance
/// is built on the next turn once the effect's outcome is appended).
pub struct EffectFuture<'a> {
    pub(crate) ctx: &'a WorkflowContext,
    pub(crate) id: FutureId,
    pub(crate) name: String,
    pub(crate) input: Payload,
    pub(crate) scheduled: bool,
}

impl Future for EffectFuture<'_> {
    type Output = Result<Payload, ExecutionError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(output) = this.ctx.cache.get_effect(&this.id) {
            return Poll::Ready(Ok(output.clone()));
        }
        if let Some(err) = this.ctx.cache.get_effect_failure(&this.id) {
            return Poll::Ready(Err(err.clone()));
        }
        if !this.scheduled {
            this.ctx.record_effect_scheduled(this.id, this.name.clone(), this.input.clone());
            this.scheduled = true;
        }
        Poll::Pending
    }
}

/// Future returned by [`WorkflowContext::start_timer`].
pub struct TimerFuture<'a> {
    pub(crate) ctx: &'a WorkflowContext,
    pub(crate) id: FutureId,
    pub(crate) fire_at: chrono::DateTime<chrono::Utc>,
    pub(crate) scheduled: bool,
}

impl Future for TimerFuture<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.ctx.cache.is_timer_complete(&this.id) {
            return Poll::Ready(());
        }
        if !this.scheduled {
            this.ctx.record_timer_started(this.id, this.fire_at);
            this.scheduled = true;
        }
        Poll::Pending
    }
}

/// Future returned by [`WorkflowContext::wait_signal`].
///
/// Resolves as soon as the `ordinal`-th (0-indexed) delivery of `name` is
/// present in the journal. Signals need no "scheduled" half: there is no
/// durable record of a workflow waiting on one, only of the signal having
/// arrived.
pub struct SignalFuture<'a> {
    pub(crate) ctx: &'a WorkflowContext,
    pub(crate) name: String,
    pub(crate) ordinal: usize,
}

impl Future for SignalFuture<'_> {
    type Output = Payload;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match this.ctx.signal_at(&this.name, this.ordinal) {
            Some(payload) => Poll::Ready(payload),
            None => Poll::Pending,
        }
    }
}

/// Future returned by [`WorkflowContext::wait_condition`].
///
/// Re-evaluates `predicate` on every poll against values read fresh from the
/// context (signal state, cancellation, etc.) rather than capturing a
/// snapshot, so a condition that depends on two independently-arriving
/// signals resolves as soon as both are true — whichever wakes second
/// decides the outcome, which is how the Inventory Saga's commit/cancel
/// tie-break is evaluated (commit wins when both are observed together).
pub struct WaitCondition<F> {
    pub(crate) predicate: F,
}

impl<F, T> Future for WaitCondition<F>
where
    F: FnMut() -> Option<T> + Unpin,
{
    type Output = T;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match (this.predicate)() {
            Some(value) => Poll::Ready(value),
            None => Poll::Pending,
        }
    }
}
