use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use orderflow_types::{ExecutionError, JournalEntry, Payload};

use crate::context::WorkflowContext;
use crate::error::EngineError;

/// Typed workflow definition (§4.3, §4.5-4.7).
///
/// `Input`/`Output` are the business-level types a workflow author writes
/// against; the engine only ever moves `Payload` bytes, so a typed
/// `Workflow` is made object-safe through [`Adapter`] and [`WorkflowErased`].
///
/// `State` is the business-readable projection queries run against —
/// folded from journal entries by [`Workflow::fold_state`], a pure function
/// of the log so that queries stay read-only and replay-deterministic (§4.3
/// query purity; §8 query-purity property).
#[async_trait]
pub trait Workflow: Send + Sync {
    type Input: for<'de> serde::Deserialize<'de> + Send + Sync;
    type Output: serde::Serialize + Send + Sync;
    type State: Default + Send + Sync;

    /// Runs (or re-runs, under replay) the workflow body for one turn.
    async fn run(&self, ctx: &WorkflowContext, input: Self::Input) -> Result<Self::Output, ExecutionError>;

    /// Folds a single journal event into the running business-state
    /// projection. Called once per entry, in order, to answer a query.
    fn fold_state(&self, state: &mut Self::State, entry: &JournalEntry);

    /// Answers a named, synchronous, read-only query against the folded
    /// state (§4.3, §8). Must never schedule effects/timers or inspect the
    /// log directly — only `state` is visible.
    fn handle_query(&self, state: &Self::State, query: &str, args: Payload) -> Result<Payload, ExecutionError>;
}

/// Object-safe counterpart of [`Workflow`], operating on `Payload` bytes so
/// heterogeneous workflow types can share one registry.
#[async_trait]
pub trait WorkflowErased: Send + Sync {
    async fn run_erased(&self, ctx: &WorkflowContext, input: Payload) -> Result<Payload, ExecutionError>;

    fn query_erased(&self, entries: &[JournalEntry], query: &str, args: Payload) -> Result<Payload, ExecutionError>;
}

/// Wraps a typed [`Workflow`] to implement [`WorkflowErased`], serializing
/// and deserializing at the boundary.
pub struct Adapter<W> {
    inner: W,
}

impl<W> Adapter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W: Workflow> WorkflowErased for Adapter<W> {
    async fn run_erased(&self, ctx: &WorkflowContext, input: Payload) -> Result<Payload, ExecutionError> {
        let typed_input: W::Input = input.to_json()?;
        let output = self.inner.run(ctx, typed_input).await?;
        Payload::from_json(&output)
    }

    fn query_erased(&self, entries: &[JournalEntry], query: &str, args: Payload) -> Result<Payload, ExecutionError> {
        let mut state = W::State::default();
        for entry in entries {
            self.inner.fold_state(&mut state, entry);
        }
        self.inner.handle_query(&state, query, args)
    }
}

/// Name-keyed table of workflow type bindings (§4.2: `StartWorkflow`
/// resolves `workflow_type` through this registry).
#[derive(Default, Clone)]
pub struct WorkflowRegistry {
    bindings: HashMap<String, Arc<dyn WorkflowErased>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, workflow_type: impl Into<String>, workflow: Arc<dyn WorkflowErased>) -> &mut Self {
        self.bindings.insert(workflow_type.into(), workflow);
        self
    }

    pub fn resolve(&self, workflow_type: &str) -> Result<Arc<dyn WorkflowErased>, EngineError> {
        self.bindings
            .get(workflow_type)
            .cloned()
            .ok_or_else(|| EngineError::Unregistered(workflow_type.to_string()))
    }
}

impl<W> From<W> for Adapter<W> {
    fn from(inner: W) -> Self {
        Self { inner }
    }
}
