use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

use super::traits::{Task, TaskFailure};
use super::types::TaskEvent;

/// Task backed by an async closure
pub struct FnTask<F> {
    description: String,
    run: F,
}

impl<F, Fut> FnTask<F>
where
    F: Fn(TaskEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskFailure>> + Send + 'static,
{
    pub fn new(description: impl Into<String>, run: F) -> Self {
        Self {
            description: description.into(),
            run,
        }
    }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(TaskEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TaskFailure>> + Send + 'static,
{
    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, event: TaskEvent) -> Result<Value, TaskFailure> {
        (self.run)(event).await
    }
}

/// Returns its payload unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTask;

#[async_trait]
impl Task for EchoTask {
    fn description(&self) -> &str {
        "Return the invocation payload unchanged"
    }

    async fn run(&self, event: TaskEvent) -> Result<Value, TaskFailure> {
        Ok(Value::Object(event.payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::types::Payload;
    use serde_json::json;

    fn event(payload: Value) -> TaskEvent {
        let Value::Object(payload) = payload else {
            panic!("payload must be an object");
        };
        TaskEvent {
            name: "test".to_string(),
            payload,
        }
    }

    #[tokio::test]
    async fn test_echo_returns_payload() {
        let result = EchoTask.run(event(json!({ "x": [1, 2] }))).await.unwrap();
        assert_eq!(result, json!({ "x": [1, 2] }));
    }

    #[tokio::test]
    async fn test_fn_task_runs_closure() {
        let task = FnTask::new("Sum two numbers", |event: TaskEvent| async move {
            let field = |key: &str| {
                event
                    .payload
                    .get(key)
                    .and_then(Value::as_i64)
                    .ok_or_else(|| TaskFailure::InvalidPayload(format!("missing {key}")))
            };
            Ok::<_, TaskFailure>(json!({ "sum": field("a")? + field("b")? }))
        });

        assert_eq!(task.description(), "Sum two numbers");
        assert_eq!(
            task.run(event(json!({ "a": 2, "b": 3 }))).await.unwrap(),
            json!({ "sum": 5 })
        );
        assert!(matches!(
            task.run(TaskEvent {
                name: "sum".to_string(),
                payload: Payload::new(),
            })
            .await,
            Err(TaskFailure::InvalidPayload(_))
        ));
    }
}
