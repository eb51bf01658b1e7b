mod context;
mod effect;
mod engine;
mod error;
mod future;
mod log;
mod scheduler;
mod workflow;

pub use context::WorkflowContext;
pub use effect::{Effect, EffectRegistry};
pub use engine::{Engine, EngineConfig, WorkflowDescription};
pub use error::EngineError;
pub use future::{noop_waker, poll_once, EffectFuture, SignalFuture, TimerFuture, WaitCondition};
pub use log::{DurableLog, InMemoryLog};
pub use workflow::{Adapter, Workflow, WorkflowErased, WorkflowRegistry};
