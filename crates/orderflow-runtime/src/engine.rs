use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use orderflow_types::{EffectSpec, EventType, InstanceStatus, Payload, RunId, WorkflowId};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex as TokioMutex};

use crate::effect::EffectRegistry;
use crate::error::EngineError;
use crate::log::DurableLog;
use crate::scheduler::{self, EffectTask};
use crate::workflow::WorkflowRegistry;

/// Tunable capacities, worker-pool sizes, and connection coordinates for an
/// [`Engine`] instance.
///
/// Pure data — this crate performs no I/O to populate it; a caller that
/// wants config-from-environment/file loads it elsewhere and constructs this
/// (§6: "config types without config loading"). `host`/`port`/`namespace`
/// are carried because §6 names them as part of the environment a real
/// deployment connects with, but nothing in this crate reads them — there is
/// no network listener here to bind.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub workflow_task_queue_capacity: usize,
    pub workflow_workers: usize,
    pub effect_task_queue_capacity: usize,
    pub effect_workers_per_queue: usize,
    pub host: String,
    pub port: u16,
    pub namespace: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow_task_queue_capacity: 1024,
            workflow_workers: 4,
            effect_task_queue_capacity: 256,
            effect_workers_per_queue: 4,
            host: "localhost".to_string(),
            port: 7233,
            namespace: "default".to_string(),
        }
    }
}

/// Answer to `DescribeWorkflow(id)` (§6): `{status, runId, createdAt, closedAt}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDescription {
    pub status: InstanceStatus,
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Shared engine state. Never constructed directly — see [`Engine::new`].
pub(crate) struct EngineInner {
    pub(crate) log: Arc<dyn DurableLog>,
    pub(crate) workflows: WorkflowRegistry,
    pub(crate) effects: EffectRegistry,
    pub(crate) effect_specs: HashMap<String, EffectSpec>,
    pub(crate) workflow_types: RwLock<HashMap<WorkflowId, String>>,
    pub(crate) run_ids: RwLock<HashMap<WorkflowId, RunId>>,
    pub(crate) locks: RwLock<HashMap<WorkflowId, Arc<TokioMutex<()>>>>,
    pub(crate) effect_tx: HashMap<String, mpsc::Sender<EffectTask>>,
    pub(crate) workflow_tx: mpsc::Sender<WorkflowId>,
}

impl EngineInner {
    pub(crate) async fn instance_lock(&self, id: &WorkflowId) -> Arc<TokioMutex<()>> {
        if let Some(lock) = self.locks.read().expect("locks poisoned").get(id) {
            return lock.clone();
        }
        self.locks
            .write()
            .expect("locks poisoned")
            .entry(id.clone())
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone()
    }
}

/// Facade implementing the external interfaces from §6: `StartWorkflow`,
/// `SignalWorkflow`, `QueryWorkflow`, `DescribeWorkflow`, `CancelWorkflow`,
/// plus the additive `TerminateWorkflow`. Cheaply `Clone`able (an `Arc`
/// handle); every worker task holds its own clone.
#[derive(Clone)]
pub struct Engine(Arc<EngineInner>);

impl Engine {
    pub fn new(
        log: Arc<dyn DurableLog>,
        workflows: WorkflowRegistry,
        effects: EffectRegistry,
        effect_specs: Vec<EffectSpec>,
        config: EngineConfig,
    ) -> Self {
        let mut specs = HashMap::new();
        let mut task_queues: HashSet<String> = HashSet::new();
        for spec in effect_specs {
            task_queues.insert(spec.task_queue.clone());
            specs.insert(spec.name.clone(), spec);
        }

        let mut effect_tx = HashMap::new();
        let mut effect_workers: Vec<(String, mpsc::Receiver<EffectTask>)> = Vec::new();
        for queue in task_queues {
            let (tx, rx) = mpsc::channel(config.effect_task_queue_capacity);
            effect_tx.insert(queue.clone(), tx);
            effect_workers.push((queue, rx));
        }

        let (workflow_tx, workflow_rx) = mpsc::channel(config.workflow_task_queue_capacity);

        let inner = Arc::new(EngineInner {
            log,
            workflows,
            effects,
            effect_specs: specs,
            workflow_types: RwLock::new(HashMap::new()),
            run_ids: RwLock::new(HashMap::new()),
            locks: RwLock::new(HashMap::new()),
            effect_tx,
            workflow_tx,
        });

        for (queue, rx) in effect_workers {
            let rx = Arc::new(TokioMutex::new(rx));
            for _ in 0..config.effect_workers_per_queue.max(1) {
                let inner = inner.clone();
                let rx = rx.clone();
                let queue = queue.clone();
                tokio::spawn(async move { scheduler::run_effect_worker(inner, queue, rx).await });
            }
        }

        {
            let rx = Arc::new(TokioMutex::new(workflow_rx));
            for _ in 0..config.workflow_workers.max(1) {
                let inner = inner.clone();
                let rx = rx.clone();
                tokio::spawn(async move { scheduler::run_workflow_worker(inner, rx).await });
            }
        }

        Self(inner)
    }

    fn enqueue_workflow_task(&self, id: WorkflowId) -> Result<(), EngineError> {
        self.0
            .workflow_tx
            .try_send(id)
            .map_err(|_| EngineError::QueueFull("workflows".to_string()))
    }

    /// Starts a new instance. Rejects with `Conflict` if `id` already has history.
    pub async fn start_workflow(
        &self,
        workflow_type: &str,
        id: WorkflowId,
        input: Payload,
    ) -> Result<(), EngineError> {
        self.0.workflows.resolve(workflow_type)?;

        let lock = self.0.instance_lock(&id).await;
        let _guard = lock.lock().await;

        if self.0.log.exists(&id).await? {
            return Err(EngineError::Conflict(id));
        }
        self.0
            .log
            .append(&id, 0, vec![EventType::WorkflowStarted { input }])
            .await?;
        self.0
            .workflow_types
            .write()
            .expect("workflow_types poisoned")
            .insert(id.clone(), workflow_type.to_string());
        self.0
            .run_ids
            .write()
            .expect("run_ids poisoned")
            .insert(id.clone(), RunId::new());
        drop(_guard);

        self.enqueue_workflow_task(id)
    }

    /// Durably records an asynchronous signal and wakes the instance.
    pub async fn signal_workflow(&self, id: &WorkflowId, name: &str, payload: Payload) -> Result<(), EngineError> {
        let lock = self.0.instance_lock(id).await;
        let _guard = lock.lock().await;

        let entries = self.0.log.read(id).await?;
        if entries.is_empty() {
            return Err(EngineError::NotFound(id.clone()));
        }
        if orderflow_journal::derive_status(&entries).is_terminal() {
            return Err(EngineError::Conflict(id.clone()));
        }
        let expected_len = entries.len();
        self.0
            .log
            .append(
                id,
                expected_len,
                vec![EventType::SignalReceived {
                    name: name.to_string(),
                    payload,
                }],
            )
            .await?;
        drop(_guard);

        self.enqueue_workflow_task(id.clone())
    }

    /// Answers a synchronous, read-only query against the instance's folded state.
    pub async fn query_workflow(&self, id: &WorkflowId, query: &str, args: Payload) -> Result<Payload, EngineError> {
        let entries = self.0.log.read(id).await?;
        if entries.is_empty() {
            return Err(EngineError::NotFound(id.clone()));
        }
        let workflow_type = self
            .0
            .workflow_types
            .read()
            .expect("workflow_types poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;
        let workflow = self.0.workflows.resolve(&workflow_type)?;
        Ok(workflow.query_erased(&entries, query, args)?)
    }

    /// Returns the instance's coarse engine-level lifecycle status plus its
    /// run id and lifecycle timestamps (§6: `DescribeWorkflow`).
    pub async fn describe_workflow(&self, id: &WorkflowId) -> Result<InstanceStatus, EngineError> {
        Ok(self.describe_workflow_full(id).await?.status)
    }

    /// The full `{status, runId, createdAt, closedAt}` shape from §6. Kept
    /// separate from [`Engine::describe_workflow`] so existing callers that
    /// only want the coarse status aren't forced to thread a `RunId` around.
    pub async fn describe_workflow_full(&self, id: &WorkflowId) -> Result<WorkflowDescription, EngineError> {
        let entries = self.0.log.read(id).await?;
        if entries.is_empty() {
            return Err(EngineError::NotFound(id.clone()));
        }
        let status = orderflow_journal::derive_status(&entries);
        let run_id = self
            .0
            .run_ids
            .read()
            .expect("run_ids poisoned")
            .get(id)
            .copied()
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;
        let created_at = entries
            .first()
            .expect("non-empty journal has a first entry")
            .recorded_at;
        let closed_at = status.is_terminal().then(|| {
            entries
                .last()
                .expect("terminal journal has a last entry")
                .recorded_at
        });
        Ok(WorkflowDescription {
            status,
            run_id,
            created_at,
            closed_at,
        })
    }

    /// Cooperatively requests cancellation; workflow code observes this at
    /// its next suspension point (§4.2).
    pub async fn cancel_workflow(&self, id: &WorkflowId, reason: impl Into<String>) -> Result<(), EngineError> {
        let lock = self.0.instance_lock(id).await;
        let _guard = lock.lock().await;

        let entries = self.0.log.read(id).await?;
        if entries.is_empty() {
            return Err(EngineError::NotFound(id.clone()));
        }
        if orderflow_journal::derive_status(&entries).is_terminal() {
            return Ok(());
        }
        let expected_len = entries.len();
        self.0
            .log
            .append(
                id,
                expected_len,
                vec![EventType::WorkflowCancelRequested { reason: reason.into() }],
            )
            .await?;
        drop(_guard);

        self.enqueue_workflow_task(id.clone())
    }

    /// Forcefully stops the instance without invoking workflow code or
    /// running compensation (§3: the forceful counterpart to `cancel_workflow`).
    pub async fn terminate_workflow(&self, id: &WorkflowId, reason: impl Into<String>) -> Result<(), EngineError> {
        let lock = self.0.instance_lock(id).await;
        let _guard = lock.lock().await;

        let entries = self.0.log.read(id).await?;
        if entries.is_empty() {
            return Err(EngineError::NotFound(id.clone()));
        }
        if orderflow_journal::derive_status(&entries).is_terminal() {
            return Ok(());
        }
        let expected_len = entries.len();
        self.0
            .log
            .append(
                id,
                expected_len,
                vec![EventType::WorkflowTerminated { reason: reason.into() }],
            )
            .await?;
        Ok(())
    }
}
