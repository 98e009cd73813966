use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::TaskError;
use super::registry::TaskRegistry;
use super::traits::TaskFailure;
use super::types::{TaskInvocation, TaskList};

/// Lists and runs tasks from a read-only registry
#[derive(Clone, Debug)]
pub struct TaskDispatcher {
    registry: Arc<TaskRegistry>,
}

impl TaskDispatcher {
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Names and descriptions of every registered task
    pub fn list_tasks(&self) -> TaskList {
        self.registry.descriptors().into_iter().collect()
    }

    /// Runs the named task with the invocation payload
    ///
    /// The body runs on its own tokio task: a panic inside it is reported as
    /// [`TaskError::Panicked`] and the worker keeps serving. Dropping the
    /// returned future does not cancel a run that already started.
    pub async fn invoke(&self, invocation: TaskInvocation) -> Result<Value, TaskError> {
        let name = invocation.name.clone();
        let task = self
            .registry
            .get(&name)
            .ok_or_else(|| TaskError::NotFound { name: name.clone() })?;

        info!(task = %name, fields = invocation.payload.len(), "Running task");
        let started = Instant::now();

        let joined = tokio::spawn(async move { task.run(invocation.into()).await }).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match joined {
            Ok(Ok(result)) => {
                debug!(task = %name, elapsed_ms, "Task finished");
                Ok(result)
            }
            Ok(Err(TaskFailure::InvalidPayload(message))) => {
                warn!(task = %name, %message, "Task rejected payload");
                Err(TaskError::InvalidPayload { name, message })
            }
            Ok(Err(TaskFailure::Failed(message))) => {
                warn!(task = %name, elapsed_ms, %message, "Task failed");
                Err(TaskError::Failed { name, message })
            }
            Err(e) if e.is_panic() => {
                let message = crate::fault::panic_message(e.into_panic().as_ref());
                warn!(task = %name, %message, "Task panicked");
                Err(TaskError::Panicked { name, message })
            }
            Err(e) => Err(TaskError::Failed {
                name,
                message: e.to_string(),
            }),
        }
    }
}
