//! Worker entry point: bind, announce, serve, and exit on request.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::address::{self, HostEnvironment};
use crate::app::{Application, ApplicationHook};
use crate::bootstrap::{self, BootstrapError};
use crate::config::Config;
use crate::link::{LinkError, ParentLink};
use crate::shutdown::{
    CloseHook, HookError, LifecycleState, ShutdownCoordinator, ShutdownReason,
};
use crate::tasks::{self, TaskDispatcher};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("could not announce to parent: {0}")]
    Announce(#[from] LinkError),
}

/// Runs one worker until it has exited.
///
/// Returns once the exit announcement was attempted. Bootstrap failures
/// return before anything is sent to the parent.
pub async fn run(
    config: &Config,
    worker_id: u32,
    app: Arc<dyn Application>,
    link: ParentLink,
) -> Result<(), WorkerError> {
    let (announcer, control) = link.split();
    let announcer = Arc::new(announcer);

    let host = HostEnvironment::detect(&config.channel, worker_id);
    let descriptor = address::resolve(&host);
    debug!(?descriptor, worker_id, "Resolved listen address");

    let (listener, bound) = bootstrap::bind(&descriptor).await?;

    let dispatcher = TaskDispatcher::new(app.tasks());
    let router = app
        .router()
        .merge(tasks::router(dispatcher, &config.tasks));

    let mut coordinator =
        ShutdownCoordinator::new(announcer.clone(), config.shutdown.close_timeout());
    let server = tokio::spawn(listener.serve(router, coordinator.shutdown_signal()));

    coordinator.add_hook("listener", Arc::new(ListenerDrain::new(server)));
    coordinator.add_hook("application", Arc::new(ApplicationHook(app.clone())));
    let coordinator = Arc::new(coordinator);

    if let Err(e) = announcer.announce_listening(&bound).await {
        coordinator.request_shutdown(ShutdownReason::ParentGone).await;
        return Err(e.into());
    }

    coordinator.mark_listening();
    info!(address = %bound, worker_id, "Worker listening");
    app.on_listening(&bound).await;

    let reader = control.on_shutdown_requested({
        let coordinator = coordinator.clone();
        move |event| {
            let coordinator = coordinator.clone();
            async move {
                coordinator.request_shutdown(event.into()).await;
            }
        }
    });

    coordinator.wait_for(LifecycleState::Exited).await;
    reader.abort();

    info!(worker_id, "Worker exited");
    Ok(())
}

/// Waits for the server task to drain its connections.
///
/// The server stops accepting as soon as shutdown starts; this hook only
/// observes it finishing. If the wait is abandoned the server is aborted.
struct ListenerDrain {
    server: Mutex<Option<JoinHandle<io::Result<()>>>>,
}

impl ListenerDrain {
    fn new(server: JoinHandle<io::Result<()>>) -> Self {
        Self {
            server: Mutex::new(Some(server)),
        }
    }
}

#[async_trait]
impl CloseHook for ListenerDrain {
    async fn close(&self) -> Result<(), HookError> {
        let Some(server) = self.server.lock().await.take() else {
            return Ok(());
        };
        let mut server = AbortOnDrop(server);

        match (&mut server.0).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(HookError::Failed(format!("server error: {e}"))),
            Err(e) => Err(HookError::Failed(format!("server task ended abnormally: {e}"))),
        }
    }
}

struct AbortOnDrop(JoinHandle<io::Result<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_drain_reports_server_result() {
        let drain = ListenerDrain::new(tokio::spawn(async { Ok(()) }));
        assert!(drain.close().await.is_ok());
        // Second close has nothing left to wait for
        assert!(drain.close().await.is_ok());

        let drain = ListenerDrain::new(tokio::spawn(async {
            Err(io::Error::other("accept failed"))
        }));
        assert!(matches!(drain.close().await, Err(HookError::Failed(_))));
    }

    #[tokio::test]
    async fn test_abandoned_drain_aborts_server() {
        let server = tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok(())
        });
        let abort = server.abort_handle();
        let drain = ListenerDrain::new(server);

        let waited = tokio::time::timeout(Duration::from_millis(20), drain.close()).await;
        assert!(waited.is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(abort.is_finished());
    }
}
