use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Binds an effect name to its retry contract, timeout, and routing (§3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectSpec {
    pub name: String,
    pub retry: RetryPolicy,
    pub start_to_close_timeout: Duration,
    pub task_queue: String,
}

impl EffectSpec {
    pub fn new(
        name: impl Into<String>,
        task_queue: impl Into<String>,
        retry: RetryPolicy,
        start_to_close_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            retry,
            start_to_close_timeout,
            task_queue: task_queue.into(),
        }
    }
}
