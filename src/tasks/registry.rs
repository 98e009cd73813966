use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use super::traits::Task;
use super::types::TaskDescriptor;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("task already registered: {0}")]
    Duplicate(String),
}

/// Registry mapping task names to task instances
///
/// Built by the application before the worker starts and read-only once
/// handed to the dispatcher.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        task: Arc<dyn Task>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }
        self.tasks.insert(name, task);
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_task(
        mut self,
        name: impl Into<String>,
        task: Arc<dyn Task>,
    ) -> Result<Self, RegistryError> {
        self.register(name, task)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Names and descriptions, ordered by name
    pub fn descriptors(&self) -> Vec<TaskDescriptor> {
        self.tasks
            .iter()
            .map(|(name, task)| TaskDescriptor {
                name: name.clone(),
                description: task.description().to_string(),
            })
            .collect()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}
