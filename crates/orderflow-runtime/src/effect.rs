use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use orderflow_types::{ExecutionError, Payload};

use crate::error::EngineError;

/// A single unit of externally-observable, possibly side-effecting work
/// invoked by workflow code (§4.4). Effects are plain async functions over
/// opaque `Payload` bytes — typed wrappers live in the workflow crate that
/// registers them.
#[async_trait]
pub trait Effect: Send + Sync {
    async fn call(&self, input: Payload) -> Result<Payload, ExecutionError>;
}

/// Name-keyed table of effect bindings, scoped per task queue (§4.4: effects
/// on different queues may share a name without colliding).
#[derive(Default, Clone)]
pub struct EffectRegistry {
    bindings: HashMap<(String, String), Arc<dyn Effect>>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        task_queue: impl Into<String>,
        name: impl Into<String>,
        effect: Arc<dyn Effect>,
    ) -> &mut Self {
        self.bindings.insert((task_queue.into(), name.into()), effect);
        self
    }

    pub fn resolve(&self, task_queue: &str, name: &str) -> Result<Arc<dyn Effect>, EngineError> {
        self.bindings
            .get(&(task_queue.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| EngineError::Unregistered(format!("{task_queue}/{name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DoubleEffect;

    #[async_trait]
    impl Effect for DoubleEffect {
        async fn call(&self, input: Payload) -> Result<Payload, ExecutionError> {
            let n: i64 = input.to_json()?;
            Payload::from_json(&(n * 2))
        }
    }

    #[tokio::test]
    async fn registered_effect_resolves_and_runs() {
        let mut registry = EffectRegistry::new();
        registry.register("orders", "double", Arc::new(DoubleEffect));

        let effect = registry.resolve("orders", "double").unwrap();
        let output = effect.call(Payload::from_json(&21).unwrap()).await.unwrap();
        let value: i64 = output.to_json().unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn same_name_on_different_queues_does_not_collide() {
        let mut registry = EffectRegistry::new();
        registry.register("orders", "double", Arc::new(DoubleEffect));

        assert!(registry.resolve("payments", "double").is_err());
        assert!(registry.resolve("orders", "double").is_ok());
    }

    #[test]
    fn unregistered_effect_reports_unregistered() {
        let registry = EffectRegistry::new();
        let err = registry.resolve("orders", "missing").unwrap_err();
        assert!(matches!(err, EngineError::Unregistered(name) if name == "orders/missing"));
    }
}
