use std::future::Future;
use std::sync::Arc;
use std::task::Poll;

use chrono::Utc;
use orderflow_types::{ErrorKind, EventType, FutureId, JournalEntry, Payload, WorkflowId};
use tokio::sync::{mpsc, Mutex as TokioMutex};

use crate::context::WorkflowContext;
use crate::engine::EngineInner;
use crate::future::noop_waker;

/// One unit of effect work dispatched to a task-queue worker (§4.2, §4.4).
pub(crate) struct EffectTask {
    pub workflow_id: WorkflowId,
    pub future_id: FutureId,
    pub name: String,
    pub input: Payload,
    pub attempt: u32,
}

/// Drains the shared workflow task queue, running one turn per task.
///
/// Multiple workers share a single `mpsc::Receiver` behind a `Mutex`: the
/// lock is only held for the `recv` call itself, so the actual turn runs
/// outside it and workers never serialize on anything but the per-instance
/// lock `run_turn` takes internally.
pub(crate) async fn run_workflow_worker(inner: Arc<EngineInner>, rx: Arc<TokioMutex<mpsc::Receiver<WorkflowId>>>) {
    loop {
        let id = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(id) = id else { break };
        run_turn(inner.clone(), id).await;
    }
}

/// Drains one task queue's effect tasks, invoking the bound `Effect` and
/// recording its outcome.
pub(crate) async fn run_effect_worker(
    inner: Arc<EngineInner>,
    _task_queue: String,
    rx: Arc<TokioMutex<mpsc::Receiver<EffectTask>>>,
) {
    loop {
        let task = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        let Some(task) = task else { break };
        execute_effect_task(&inner, task).await;
    }
}

/// Runs exactly one turn for `id`: poll the workflow's `run` future once
/// against the current journal, then either record a terminal event or
/// append and dispatch the newly-decided effects/timers.
///
/// Held entirely behind `id`'s instance lock so a concurrent signal/cancel
/// append can never race the turn's own append.
pub(crate) async fn run_turn(inner: Arc<EngineInner>, id: WorkflowId) {
    let lock = inner.instance_lock(&id).await;
    let guard = lock.lock().await;

    let entries = match inner.log.read(&id).await {
        Ok(e) => e,
        Err(err) => {
            tracing::warn!(workflow_id = %id, %err, "failed to read journal for turn");
            return;
        }
    };
    if entries.is_empty() {
        return;
    }
    if orderflow_journal::derive_status(&entries).is_terminal() {
        return;
    }

    let workflow_type = match inner.workflow_types.read().expect("workflow_types poisoned").get(&id).cloned() {
        Some(t) => t,
        None => {
            tracing::error!(workflow_id = %id, "no workflow type recorded for instance; cannot run turn");
            return;
        }
    };
    let workflow = match inner.workflows.resolve(&workflow_type) {
        Ok(w) => w,
        Err(err) => {
            tracing::error!(workflow_id = %id, %err, "unregistered workflow type");
            return;
        }
    };

    let input = match entries.first() {
        Some(JournalEntry {
            event: EventType::WorkflowStarted { input },
            ..
        }) => input.clone(),
        _ => {
            tracing::error!(workflow_id = %id, "journal does not start with WorkflowStarted");
            return;
        }
    };

    let expected_len = entries.len();
    // Logical "now" for this turn is the frontier of the journal itself —
    // the last committed entry's `recorded_at` — never the wall clock, so a
    // later replay of the same history computes the same value.
    let now = entries.last().expect("non-empty journal has a last entry").recorded_at;
    let ctx = WorkflowContext::new(id.clone(), entries, now);

    let waker = noop_waker();
    let mut task_cx = std::task::Context::from_waker(&waker);
    let mut fut = workflow.run_erased(&ctx, input);
    let outcome = fut.as_mut().poll(&mut task_cx);
    drop(fut);

    match outcome {
        Poll::Ready(result) => {
            let event = match result {
                Ok(output) if ctx.is_cancelled_completion() => EventType::WorkflowCancelled { output },
                Ok(output) => EventType::WorkflowCompleted { output },
                Err(error) => EventType::WorkflowFailed { error },
            };
            drop(guard);
            if let Err(err) = inner.log.append(&id, expected_len, vec![event]).await {
                tracing::error!(workflow_id = %id, %err, "failed to append terminal event");
            }
        }
        Poll::Pending => {
            let new_events = ctx.take_new_events();
            if new_events.is_empty() {
                return;
            }
            let appended = match inner.log.append(&id, expected_len, new_events).await {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::error!(workflow_id = %id, %err, "failed to append scheduling decisions");
                    return;
                }
            };
            drop(guard);
            dispatch(inner, id, appended).await;
        }
    }
}

/// Reads the current journal length, appends `events` on top of it, and
/// resumes the instance. Used by effect/timer workers once an outcome is
/// ready — they hold no lock across their own async work, so this re-reads
/// the expected length fresh rather than threading it through.
async fn append_and_resume(inner: &Arc<EngineInner>, id: &WorkflowId, events: Vec<EventType>) {
    let lock = inner.instance_lock(id).await;
    let guard = lock.lock().await;
    let expected_len = match inner.log.read(id).await {
        Ok(entries) => entries.len(),
        Err(err) => {
            tracing::error!(workflow_id = %id, %err, "failed to read journal before append");
            return;
        }
    };
    let result = inner.log.append(id, expected_len, events).await;
    drop(guard);

    if let Err(err) = result {
        tracing::error!(workflow_id = %id, %err, "failed to append effect/timer outcome");
        return;
    }

    resume(inner, id.clone());
}

/// Best-effort wake-up: prefers the shared workflow task queue (honoring
/// the same backpressure external callers see), falling back to spawning
/// the turn directly if the queue is momentarily full or closed so an
/// internal resume is never silently dropped.
fn resume(inner: &Arc<EngineInner>, id: WorkflowId) {
    if inner.workflow_tx.try_send(id.clone()).is_err() {
        tracing::debug!(workflow_id = %id, "workflow task queue busy; resuming inline");
        let inner = inner.clone();
        tokio::spawn(async move { run_turn(inner, id).await });
    }
}

/// Dispatches the brand-new `EffectScheduled`/`TimerStarted` decisions from
/// one turn to their respective worker pools.
async fn dispatch(inner: Arc<EngineInner>, id: WorkflowId, new_entries: Vec<JournalEntry>) {
    for entry in new_entries {
        match entry.event {
            EventType::EffectScheduled { id: future_id, name, input } => {
                let Some(spec) = inner.effect_specs.get(&name).cloned() else {
                    tracing::warn!(workflow_id = %id, effect = %name, "no EffectSpec registered");
                    append_and_resume(
                        &inner,
                        &id,
                        vec![EventType::EffectFailed {
                            id: future_id,
                            kind: ErrorKind::Unregistered,
                            message: format!("no effect registered for {name}"),
                            attempt: 1,
                        }],
                    )
                    .await;
                    continue;
                };
                let Some(tx) = inner.effect_tx.get(&spec.task_queue).cloned() else {
                    tracing::error!(workflow_id = %id, task_queue = %spec.task_queue, "no worker pool for task queue");
                    continue;
                };
                let task = EffectTask {
                    workflow_id: id.clone(),
                    future_id,
                    name,
                    input,
                    attempt: 1,
                };
                if tx.send(task).await.is_err() {
                    tracing::error!(workflow_id = %id, "effect worker pool channel closed");
                }
            }
            EventType::TimerStarted { id: future_id, fire_at } => {
                let inner = inner.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    let now = Utc::now();
                    if fire_at > now {
                        tokio::time::sleep((fire_at - now).to_std().unwrap_or_default()).await;
                    }
                    append_and_resume(&inner, &id, vec![EventType::TimerFired { id: future_id }]).await;
                });
            }
            _ => {}
        }
    }
}

/// Invokes the bound effect for one task, recording the outcome (success,
/// retry, or permanent failure) and resuming the instance (§4.4).
async fn execute_effect_task(inner: &Arc<EngineInner>, task: EffectTask) {
    let EffectTask {
        workflow_id,
        future_id,
        name,
        input,
        attempt,
    } = task;

    let Some(spec) = inner.effect_specs.get(&name).cloned() else {
        append_and_resume(
            inner,
            &workflow_id,
            vec![EventType::EffectFailed {
                id: future_id,
                kind: ErrorKind::Unregistered,
                message: format!("no effect registered for {name}"),
                attempt,
            }],
        )
        .await;
        return;
    };

    let effect = match inner.effects.resolve(&spec.task_queue, &name) {
        Ok(e) => e,
        Err(_) => {
            append_and_resume(
                inner,
                &workflow_id,
                vec![EventType::EffectFailed {
                    id: future_id,
                    kind: ErrorKind::Unregistered,
                    message: format!("no effect registered for {name}"),
                    attempt,
                }],
            )
            .await;
            return;
        }
    };

    match effect.call(input.clone()).await {
        Ok(output) => {
            tracing::info!(workflow_id = %workflow_id, effect = %name, attempt, "effect completed");
            append_and_resume(inner, &workflow_id, vec![EventType::EffectCompleted { id: future_id, output }]).await;
        }
        Err(err) => {
            let retryable = spec.retry.is_retryable(&err.kind) && spec.retry.has_attempts_remaining(attempt);
            if retryable {
                let next_attempt = attempt + 1;
                let backoff = spec.retry.backoff_for(next_attempt);
                let retry_at = Utc::now()
                    + chrono::Duration::from_std(backoff).unwrap_or_else(|_| chrono::Duration::zero());

                tracing::warn!(workflow_id = %workflow_id, effect = %name, attempt, kind = ?err.kind, "effect failed, scheduling retry");
                append_and_resume(
                    inner,
                    &workflow_id,
                    vec![EventType::EffectRetryScheduled {
                        id: future_id,
                        attempt,
                        kind: err.kind.clone(),
                        message: err.message.clone(),
                        retry_at,
                    }],
                )
                .await;

                let inner = inner.clone();
                let task_queue = spec.task_queue.clone();
                tokio::spawn(async move {
                    let now = Utc::now();
                    if retry_at > now {
                        tokio::time::sleep((retry_at - now).to_std().unwrap_or_default()).await;
                    }
                    if let Some(tx) = inner.effect_tx.get(&task_queue) {
                        let _ = tx
                            .send(EffectTask {
                                workflow_id,
                                future_id,
                                name,
                                input,
                                attempt: next_attempt,
                            })
                            .await;
                    }
                });
            } else {
                tracing::error!(workflow_id = %workflow_id, effect = %name, attempt, kind = ?err.kind, "effect failed permanently");
                append_and_resume(
                    inner,
                    &workflow_id,
                    vec![EventType::EffectFailed {
                        id: future_id,
                        kind: err.kind.clone(),
                        message: err.message.clone(),
                        attempt,
                    }],
                )
                .await;
            }
        }
    }
}
