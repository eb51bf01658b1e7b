//! End-to-end exercise of the scheduler: a workflow that schedules one
//! effect, waits on it, and completes — run through the real `Engine`
//! (in-memory log, real task queues, real worker pool) rather than calling
//! `run_turn` directly. Mirrors how `invariant-journal`'s cross-cutting
//! behavior is tested at the crate level instead of inline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orderflow_runtime::{
    Effect, EffectRegistry, Engine, EngineConfig, InMemoryLog, Workflow, WorkflowContext, WorkflowErased,
    WorkflowRegistry,
};
use orderflow_types::{Codec, EffectSpec, ErrorKind, ExecutionError, JournalEntry, Payload, RetryPolicy, WorkflowId};

struct GreetWorkflow;

#[async_trait]
impl Workflow for GreetWorkflow {
    type Input = String;
    type Output = String;
    type State = Option<String>;

    async fn run(&self, ctx: &WorkflowContext, input: Self::Input) -> Result<Self::Output, ExecutionError> {
        let greeting = ctx
            .start_effect("greet", Payload::from_json(&input)?)
            .await?;
        greeting.to_json()
    }

    fn fold_state(&self, state: &mut Self::State, entry: &JournalEntry) {
        if let orderflow_types::EventType::WorkflowCompleted { output } = &entry.event {
            *state = output.to_json::<String>().ok();
        }
    }

    fn handle_query(&self, state: &Self::State, query: &str, _args: Payload) -> Result<Payload, ExecutionError> {
        match query {
            "greeting" => Payload::from_json(state),
            other => Err(ExecutionError::new(ErrorKind::NotFound, format!("unknown query {other}"))),
        }
    }
}

struct GreetEffect;

#[async_trait]
impl Effect for GreetEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let name: String = input.to_json()?;
        Payload::from_json(&format!("hello, {name}"))
    }
}

struct SlowEffect;

#[async_trait]
impl Effect for SlowEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        let name: String = input.to_json()?;
        Payload::from_json(&format!("hello, {name}"))
    }
}

struct FlakyEffect {
    calls: std::sync::atomic::AtomicU32,
}

#[async_trait]
impl Effect for FlakyEffect {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
        let attempt = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        if attempt < 2 {
            return Err(ExecutionError::new(ErrorKind::Transient, "not yet"));
        }
        let name: String = input.to_json()?;
        Payload::from_json(&format!("hello, {name}"))
    }
}

fn build_engine(effect: Arc<dyn Effect>) -> Engine {
    let mut workflows = WorkflowRegistry::new();
    workflows.register("greet", Arc::new(orderflow_runtime::Adapter::new(GreetWorkflow)) as Arc<dyn WorkflowErased>);

    let mut effects = EffectRegistry::new();
    effects.register("default", "greet", effect);

    let specs = vec![EffectSpec::new(
        "greet",
        "default",
        RetryPolicy::new(Duration::from_millis(5), 2.0, Duration::from_millis(50), 3),
        Duration::from_secs(5),
    )];

    Engine::new(Arc::new(InMemoryLog::new()), workflows, effects, specs, EngineConfig::default())
}

async fn wait_until_terminal(engine: &Engine, id: &WorkflowId) -> orderflow_types::InstanceStatus {
    for _ in 0..200 {
        let status = engine.describe_workflow(id).await.unwrap();
        if status.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("workflow never reached a terminal status");
}

#[tokio::test]
async fn workflow_schedules_effect_and_completes() {
    let engine = build_engine(Arc::new(GreetEffect));
    let id = WorkflowId::new("greet-1");

    engine
        .start_workflow("greet", id.clone(), Payload::from_json(&"ada".to_string()).unwrap())
        .await
        .unwrap();

    let status = wait_until_terminal(&engine, &id).await;
    assert_eq!(status, orderflow_types::InstanceStatus::Completed);

    let result = engine
        .query_workflow(&id, "greeting", Payload::new(vec![], Codec::Json))
        .await
        .unwrap();
    let greeting: Option<String> = result.to_json().unwrap();
    assert_eq!(greeting.as_deref(), Some("hello, ada"));
}

#[tokio::test]
async fn transient_effect_failure_is_retried_until_it_succeeds() {
    let engine = build_engine(Arc::new(FlakyEffect {
        calls: std::sync::atomic::AtomicU32::new(0),
    }));
    let id = WorkflowId::new("greet-flaky");

    engine
        .start_workflow("greet", id.clone(), Payload::from_json(&"grace".to_string()).unwrap())
        .await
        .unwrap();

    let status = wait_until_terminal(&engine, &id).await;
    assert_eq!(status, orderflow_types::InstanceStatus::Completed);
}

#[tokio::test]
async fn starting_the_same_workflow_id_twice_conflicts() {
    let engine = build_engine(Arc::new(GreetEffect));
    let id = WorkflowId::new("greet-dup");

    engine
        .start_workflow("greet", id.clone(), Payload::from_json(&"ada".to_string()).unwrap())
        .await
        .unwrap();

    let err = engine
        .start_workflow("greet", id.clone(), Payload::from_json(&"ada".to_string()).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, orderflow_runtime::EngineError::Conflict(_)));
}

#[tokio::test]
async fn terminate_stops_the_instance_without_running_workflow_code() {
    let engine = build_engine(Arc::new(SlowEffect));
    let id = WorkflowId::new("greet-terminate");

    engine
        .start_workflow("greet", id.clone(), Payload::from_json(&"ada".to_string()).unwrap())
        .await
        .unwrap();
    engine.terminate_workflow(&id, "operator stop").await.unwrap();

    let status = engine.describe_workflow(&id).await.unwrap();
    assert_eq!(status, orderflow_types::InstanceStatus::Terminated);
}
