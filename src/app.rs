//! Application seam: what the hosting worker serves.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::protocol::BoundAddress;
use crate::shutdown::{CloseHook, HookError};
use crate::tasks::{EchoTask, RegistryError, TaskRegistry};

/// Application hosted by a worker
///
/// The worker merges [`router`](Application::router) with the task routes,
/// calls [`on_listening`](Application::on_listening) once the parent knows the
/// address and runs [`close`](Application::close) first during shutdown.
#[async_trait]
pub trait Application: Send + Sync + 'static {
    fn router(&self) -> Router;

    fn tasks(&self) -> TaskRegistry {
        TaskRegistry::new()
    }

    async fn on_listening(&self, _address: &BoundAddress) {}

    async fn close(&self) -> Result<(), HookError> {
        Ok(())
    }
}

/// Health endpoint plus the built-in `echo` task
#[derive(Debug, Clone)]
pub struct DefaultApplication {
    tasks: TaskRegistry,
}

impl DefaultApplication {
    pub fn new() -> Result<Self, RegistryError> {
        let tasks = TaskRegistry::new().with_task("echo", Arc::new(EchoTask))?;
        Ok(Self { tasks })
    }
}

#[async_trait]
impl Application for DefaultApplication {
    fn router(&self) -> Router {
        Router::new().route("/health", get(health))
    }

    fn tasks(&self) -> TaskRegistry {
        self.tasks.clone()
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Runs [`Application::close`] as a shutdown hook.
pub struct ApplicationHook(pub Arc<dyn Application>);

#[async_trait]
impl CloseHook for ApplicationHook {
    async fn close(&self) -> Result<(), HookError> {
        self.0.close().await
    }
}
