//! Worker lifecycle and the shutdown sequence.
//!
//! `Starting → Listening → ShuttingDown → Exited`, strictly forward. The
//! first shutdown request moves the worker to `ShuttingDown`, runs every
//! registered close hook in order, tells the parent, then moves to
//! `Exited`. Later requests are ignored.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::link::{Announcer, LinkEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Starting,
    Listening,
    ShuttingDown,
    Exited,
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("panicked: {0}")]
    Panicked(String),
}

/// Cleanup step awaited once during shutdown.
#[async_trait]
pub trait CloseHook: Send + Sync {
    async fn close(&self) -> Result<(), HookError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The parent sent `{"event":"shutdown"}`.
    Requested,
    /// The parent channel closed; shutting down on our own.
    ParentGone,
}

impl From<LinkEvent> for ShutdownReason {
    fn from(event: LinkEvent) -> Self {
        match event {
            LinkEvent::ShutdownRequested => ShutdownReason::Requested,
            LinkEvent::ParentGone => ShutdownReason::ParentGone,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// This call ran the hooks and announced exit.
    Completed,
    /// A shutdown had already started; nothing was done.
    Ignored,
}

pub struct ShutdownCoordinator {
    state: watch::Sender<LifecycleState>,
    hooks: Vec<(String, Arc<dyn CloseHook>)>,
    announcer: Arc<Announcer>,
    close_timeout: Option<Duration>,
}

impl ShutdownCoordinator {
    /// `close_timeout` bounds each hook; `None` waits for as long as a hook takes.
    pub fn new(announcer: Arc<Announcer>, close_timeout: Option<Duration>) -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            state,
            hooks: Vec::new(),
            announcer,
            close_timeout,
        }
    }

    /// Hooks run in registration order.
    pub fn add_hook(&mut self, name: impl Into<String>, hook: Arc<dyn CloseHook>) {
        self.hooks.push((name.into(), hook));
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn mark_listening(&self) -> bool {
        self.advance(LifecycleState::Listening)
    }

    /// Resolves once `target` (or a later state) is reached.
    pub async fn wait_for(&self, target: LifecycleState) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state >= target).await;
    }

    /// Future for graceful server shutdown: resolves on entering `ShuttingDown`.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + use<> {
        let mut rx = self.state.subscribe();
        async move {
            let _ = rx
                .wait_for(|state| *state >= LifecycleState::ShuttingDown)
                .await;
        }
    }

    pub async fn request_shutdown(&self, reason: ShutdownReason) -> ShutdownOutcome {
        if !self.advance(LifecycleState::ShuttingDown) {
            debug!(?reason, state = ?self.state(), "Shutdown already in progress, ignoring");
            return ShutdownOutcome::Ignored;
        }

        info!(?reason, "Shutting down worker");

        for (name, hook) in &self.hooks {
            match self.run_hook(hook.clone()).await {
                Ok(()) => debug!(hook = %name, "Close hook finished"),
                Err(e) => error!(hook = %name, error = %e, "Close hook failed"),
            }
        }

        if let Err(e) = self.announcer.announce_exit().await {
            warn!(error = %e, "Could not announce exit to parent");
        }

        // Published last so waiters on `Exited` also see the exit line written.
        self.advance(LifecycleState::Exited);

        ShutdownOutcome::Completed
    }

    /// Runs the hook on its own task so a panic is reported, not propagated.
    async fn run_hook(&self, hook: Arc<dyn CloseHook>) -> Result<(), HookError> {
        let mut task = tokio::spawn(async move { hook.close().await });

        let joined = match self.close_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(HookError::TimedOut(limit));
                }
            },
            None => task.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(HookError::Panicked(crate::fault::panic_message(
                e.into_panic().as_ref(),
            ))),
            Err(e) => Err(HookError::Failed(e.to_string())),
        }
    }

    fn advance(&self, next: LifecycleState) -> bool {
        self.state.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::ParentLink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};

    struct CountingHook {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingHook {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl CloseHook for CountingHook {
        async fn close(&self) -> Result<(), HookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail {
                Err(HookError::Failed("database still open".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct StuckHook;

    #[async_trait]
    impl CloseHook for StuckHook {
        async fn close(&self) -> Result<(), HookError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct PanickingHook;

    #[async_trait]
    impl CloseHook for PanickingHook {
        async fn close(&self) -> Result<(), HookError> {
            panic!("hook exploded");
        }
    }

    fn coordinator(timeout: Option<Duration>) -> (ShutdownCoordinator, BufReader<DuplexStream>) {
        let (worker, parent) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(worker);
        let (announcer, _control) = ParentLink::new(reader, writer).split();
        (
            ShutdownCoordinator::new(Arc::new(announcer), timeout),
            BufReader::new(parent),
        )
    }

    async fn lines(mut parent: BufReader<DuplexStream>) -> Vec<String> {
        let mut out = Vec::new();
        let mut line = String::new();
        while parent.read_line(&mut line).await.unwrap() > 0 {
            out.push(line.trim().to_string());
            line.clear();
        }
        out
    }

    #[tokio::test]
    async fn test_states_only_move_forward() {
        let (coordinator, _parent) = coordinator(None);
        assert_eq!(coordinator.state(), LifecycleState::Starting);

        assert!(coordinator.mark_listening());
        assert!(!coordinator.mark_listening());
        assert_eq!(coordinator.state(), LifecycleState::Listening);

        coordinator.request_shutdown(ShutdownReason::Requested).await;
        assert_eq!(coordinator.state(), LifecycleState::Exited);

        assert!(!coordinator.mark_listening());
        assert_eq!(coordinator.state(), LifecycleState::Exited);
    }

    #[tokio::test]
    async fn test_double_shutdown_runs_hook_once() {
        let (mut coordinator, parent) = coordinator(None);
        let hook = CountingHook::new(false);
        coordinator.add_hook("app", hook.clone());
        coordinator.mark_listening();
        let coordinator = Arc::new(coordinator);

        let first = tokio::spawn({
            let c = coordinator.clone();
            async move { c.request_shutdown(ShutdownReason::Requested).await }
        });
        let second = tokio::spawn({
            let c = coordinator.clone();
            async move { c.request_shutdown(ShutdownReason::Requested).await }
        });

        let mut outcomes = vec![first.await.unwrap(), second.await.unwrap()];
        outcomes.sort_by_key(|o| *o == ShutdownOutcome::Ignored);
        assert_eq!(
            outcomes,
            vec![ShutdownOutcome::Completed, ShutdownOutcome::Ignored]
        );
        assert_eq!(
            coordinator.request_shutdown(ShutdownReason::Requested).await,
            ShutdownOutcome::Ignored
        );

        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);

        drop(coordinator);
        assert_eq!(lines(parent).await, vec![r#"{"event":"exit"}"#]);
    }

    #[tokio::test]
    async fn test_failing_hook_still_exits() {
        let (mut coordinator, parent) = coordinator(None);
        let failing = CountingHook::new(true);
        let after = CountingHook::new(false);
        coordinator.add_hook("failing", failing.clone());
        coordinator.add_hook("after", after.clone());

        let outcome = coordinator.request_shutdown(ShutdownReason::Requested).await;

        assert_eq!(outcome, ShutdownOutcome::Completed);
        assert_eq!(coordinator.state(), LifecycleState::Exited);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(after.calls.load(Ordering::SeqCst), 1);

        drop(coordinator);
        assert_eq!(lines(parent).await, vec![r#"{"event":"exit"}"#]);
    }

    #[tokio::test]
    async fn test_stuck_hook_is_bounded_by_timeout() {
        let (mut coordinator, parent) = coordinator(Some(Duration::from_millis(50)));
        coordinator.add_hook("stuck", Arc::new(StuckHook));

        let outcome = coordinator.request_shutdown(ShutdownReason::ParentGone).await;

        assert_eq!(outcome, ShutdownOutcome::Completed);
        drop(coordinator);
        assert_eq!(lines(parent).await, vec![r#"{"event":"exit"}"#]);
    }

    #[tokio::test]
    async fn test_panicking_hook_still_exits() {
        let (mut coordinator, parent) = coordinator(None);
        coordinator.add_hook("panics", Arc::new(PanickingHook));

        coordinator.request_shutdown(ShutdownReason::Requested).await;

        assert_eq!(coordinator.state(), LifecycleState::Exited);
        drop(coordinator);
        assert_eq!(lines(parent).await, vec![r#"{"event":"exit"}"#]);
    }

    #[tokio::test]
    async fn test_shutdown_signal_fires_on_shutting_down() {
        let (coordinator, _parent) = coordinator(None);
        let signal = coordinator.shutdown_signal();

        coordinator.mark_listening();
        coordinator.request_shutdown(ShutdownReason::Requested).await;

        tokio::time::timeout(Duration::from_secs(1), signal)
            .await
            .expect("signal should resolve after shutdown");
        tokio::time::timeout(
            Duration::from_secs(1),
            coordinator.wait_for(LifecycleState::Exited),
        )
        .await
        .unwrap();
    }

    #[test]
    fn test_reason_from_link_event() {
        assert_eq!(
            ShutdownReason::from(LinkEvent::ShutdownRequested),
            ShutdownReason::Requested
        );
        assert_eq!(
            ShutdownReason::from(LinkEvent::ParentGone),
            ShutdownReason::ParentGone
        );
    }
}
