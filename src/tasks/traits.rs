use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::types::TaskEvent;

/// Failure reported by a task body
#[derive(Debug, Error)]
pub enum TaskFailure {
    /// The merged payload is unusable for this task
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("{0}")]
    Failed(String),
}

/// Named background operation reachable over the worker listener
///
/// Tasks are owned by the application. The dispatcher only reads the
/// description and calls `run` with the merged invocation payload; the
/// returned value is sent to the caller verbatim.
#[async_trait]
pub trait Task: Send + Sync {
    /// Human readable summary listed by the task index
    fn description(&self) -> &str;

    async fn run(&self, event: TaskEvent) -> Result<Value, TaskFailure>;
}
