use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Invocation parameters, keyed by field name
pub type Payload = Map<String, Value>;

/// Public view of a registered task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDescriptor {
    pub name: String,
    pub description: String,
}

/// Entry of the task index, keyed by name in [`TaskList`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub description: String,
}

/// Body of the task index endpoint: `{"tasks":{"<name>":{"description":"..."}}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskList {
    pub tasks: BTreeMap<String, TaskSummary>,
}

impl FromIterator<TaskDescriptor> for TaskList {
    fn from_iter<I: IntoIterator<Item = TaskDescriptor>>(iter: I) -> Self {
        Self {
            tasks: iter
                .into_iter()
                .map(|d| (d.name, TaskSummary { description: d.description }))
                .collect(),
        }
    }
}

/// A request to run one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInvocation {
    pub name: String,
    pub payload: Payload,
}

impl TaskInvocation {
    pub fn new(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Merges query parameters with body fields; body fields win on collision.
    pub fn from_parts(name: impl Into<String>, query: Payload, body: Payload) -> Self {
        let mut payload = query;
        payload.extend(body);
        Self::new(name, payload)
    }
}

/// What a task body receives
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEvent {
    pub name: String,
    pub payload: Payload,
}

impl From<TaskInvocation> for TaskEvent {
    fn from(invocation: TaskInvocation) -> Self {
        Self {
            name: invocation.name,
            payload: invocation.payload,
        }
    }
}
