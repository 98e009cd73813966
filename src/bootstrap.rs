//! Binding the worker listener to a resolved address.

use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::address::AddressDescriptor;
use crate::protocol::BoundAddress;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to create socket directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("channel {path} already exists (stale socket or a live duplicate worker)")]
    StaleChannel { path: PathBuf },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Windows reports an existing pipe and an ACL rejection the same way.
    #[error("named pipe {path} already exists or access was denied")]
    PipeUnavailable { path: PathBuf },

    #[error("filesystem channels are not supported on this platform")]
    Unsupported,
}

/// Listener owned by the worker for its whole lifetime.
#[derive(Debug)]
pub enum WorkerListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix {
        listener: tokio::net::UnixListener,
        socket: SocketFile,
    },
    #[cfg(windows)]
    Pipe(pipe::NamedPipeListener),
}

impl WorkerListener {
    /// Serves `app` until `shutdown` resolves and in-flight connections drain.
    /// The socket file, if any, is removed once serving stops.
    pub async fn serve<F>(self, app: Router, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self {
            WorkerListener::Tcp(listener) => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
            }
            #[cfg(unix)]
            WorkerListener::Unix { listener, socket } => {
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await;
                drop(socket);
                result
            }
            #[cfg(windows)]
            WorkerListener::Pipe(listener) => {
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await
            }
        }
    }
}

/// Unix socket path that is unlinked when dropped.
#[derive(Debug)]
pub struct SocketFile {
    path: PathBuf,
}

impl SocketFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

/// Binds a listener for `descriptor` and reports how callers can reach it.
pub async fn bind(
    descriptor: &AddressDescriptor,
) -> Result<(WorkerListener, BoundAddress), BootstrapError> {
    match descriptor {
        AddressDescriptor::Ephemeral => bind_ephemeral().await,
        AddressDescriptor::FilesystemChannel { path } => bind_channel(path).await,
    }
}

async fn bind_ephemeral() -> Result<(WorkerListener, BoundAddress), BootstrapError> {
    let requested = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let bind_error = |source| BootstrapError::Bind {
        address: requested.to_string(),
        source,
    };

    let listener = TcpListener::bind(requested).await.map_err(bind_error)?;
    let local = listener.local_addr().map_err(bind_error)?;

    info!(%local, "Bound ephemeral TCP listener");
    Ok((WorkerListener::Tcp(listener), BoundAddress::localhost(local.port())))
}

#[cfg(unix)]
async fn bind_channel(path: &Path) -> Result<(WorkerListener, BoundAddress), BootstrapError> {
    if let Some(dir) = path.parent() {
        ensure_socket_dir(dir).await?;
    }

    let listener = tokio::net::UnixListener::bind(path).map_err(|source| {
        if source.kind() == io::ErrorKind::AddrInUse {
            BootstrapError::StaleChannel {
                path: path.to_path_buf(),
            }
        } else {
            BootstrapError::Bind {
                address: path.display().to_string(),
                source,
            }
        }
    })?;

    info!(path = %path.display(), "Bound unix socket listener");
    let socket = SocketFile {
        path: path.to_path_buf(),
    };
    let address = BoundAddress::socket(path.to_string_lossy());
    Ok((WorkerListener::Unix { listener, socket }, address))
}

#[cfg(windows)]
async fn bind_channel(path: &Path) -> Result<(WorkerListener, BoundAddress), BootstrapError> {
    let name = path.to_string_lossy().into_owned();

    let listener = pipe::NamedPipeListener::bind(&name).map_err(|source| {
        if source.kind() == io::ErrorKind::PermissionDenied {
            BootstrapError::PipeUnavailable {
                path: path.to_path_buf(),
            }
        } else {
            BootstrapError::Bind {
                address: name.clone(),
                source,
            }
        }
    })?;

    info!(pipe = %name, "Bound named pipe listener");
    Ok((WorkerListener::Pipe(listener), BoundAddress::socket(name)))
}

#[cfg(not(any(unix, windows)))]
async fn bind_channel(_path: &Path) -> Result<(WorkerListener, BoundAddress), BootstrapError> {
    Err(BootstrapError::Unsupported)
}

/// Creates the socket directory (and parents). Existing directories are fine.
pub async fn ensure_socket_dir(dir: &Path) -> Result<(), BootstrapError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| BootstrapError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })
}

#[cfg(windows)]
mod pipe {
    use std::io;
    use std::time::Duration;

    use tokio::net::windows::named_pipe::{NamedPipeServer, ServerOptions};
    use tracing::{error, warn};

    /// Accept loop over a named pipe. Each accepted client consumes the
    /// pending server instance and a fresh one is created for the next.
    #[derive(Debug)]
    pub struct NamedPipeListener {
        name: String,
        next: NamedPipeServer,
    }

    impl NamedPipeListener {
        /// Fails if any instance of the pipe already exists.
        pub fn bind(name: &str) -> io::Result<Self> {
            let next = ServerOptions::new()
                .first_pipe_instance(true)
                .create(name)?;
            Ok(Self {
                name: name.to_string(),
                next,
            })
        }

        fn fresh_instance(&self) -> io::Result<NamedPipeServer> {
            ServerOptions::new().create(&self.name)
        }
    }

    impl axum::serve::Listener for NamedPipeListener {
        type Io = NamedPipeServer;
        type Addr = String;

        async fn accept(&mut self) -> (Self::Io, Self::Addr) {
            loop {
                if let Err(e) = self.next.connect().await {
                    warn!(pipe = %self.name, error = %e, "Named pipe connect failed");
                    continue;
                }

                let fresh = loop {
                    match self.fresh_instance() {
                        Ok(server) => break server,
                        Err(e) => {
                            error!(pipe = %self.name, error = %e, "Failed to create pipe instance");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                };

                let connected = std::mem::replace(&mut self.next, fresh);
                return (connected, self.name.clone());
            }
        }

        fn local_addr(&self) -> io::Result<Self::Addr> {
            Ok(self.name.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_bind_ephemeral_reports_assigned_port() {
        let (listener, address) = bind(&AddressDescriptor::Ephemeral).await.unwrap();

        let WorkerListener::Tcp(ref tcp) = listener else {
            panic!("expected a TCP listener");
        };
        let port = tcp.local_addr().unwrap().port();

        assert_ne!(port, 0);
        assert_eq!(address, BoundAddress::localhost(port));
    }

    #[tokio::test]
    async fn test_serve_until_shutdown() {
        let (listener, address) = bind(&AddressDescriptor::Ephemeral).await.unwrap();
        let BoundAddress::Tcp { port, .. } = address else {
            panic!("expected a TCP address");
        };

        let app = Router::new().route("/ping", get(|| async { "pong" }));
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(listener.serve(app, async move {
            let _ = stop_rx.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("pong"));

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_channel_creates_directory() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path().join("nested/devworker/worker-1-1.sock");

        let (listener, address) = bind(&AddressDescriptor::FilesystemChannel { path: path.clone() })
            .await
            .unwrap();

        assert!(path.exists());
        assert_eq!(address, BoundAddress::socket(path.to_string_lossy()));

        drop(listener);
        assert!(!path.exists(), "socket file should be removed on release");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_existing_socket_file_fails_loudly() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path().join("worker-1-1.sock");
        std::fs::write(&path, b"stale").unwrap();

        let result = bind(&AddressDescriptor::FilesystemChannel { path: path.clone() }).await;

        assert!(matches!(result, Err(BootstrapError::StaleChannel { .. })));
        assert!(path.exists(), "stale file must be left for the caller");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_live_duplicate_is_rejected() {
        let root = tempfile::TempDir::new().unwrap();
        let descriptor = AddressDescriptor::FilesystemChannel {
            path: root.path().join("worker-1-1.sock"),
        };

        let (_first, _) = bind(&descriptor).await.unwrap();
        let second = bind(&descriptor).await;

        assert!(matches!(second, Err(BootstrapError::StaleChannel { .. })));
    }

    #[cfg(windows)]
    #[tokio::test]
    async fn test_duplicate_pipe_is_rejected() {
        let descriptor = AddressDescriptor::FilesystemChannel {
            path: PathBuf::from(format!(
                r"\\.\pipe\devworker-test\worker-{}-1.sock",
                std::process::id()
            )),
        };

        let (_first, _) = bind(&descriptor).await.unwrap();
        let second = bind(&descriptor).await;

        assert!(matches!(second, Err(BootstrapError::PipeUnavailable { .. })));
    }

    #[test]
    fn test_pipe_error_names_both_causes() {
        let err = BootstrapError::PipeUnavailable {
            path: PathBuf::from(r"\\.\pipe\devworker\worker-1-1.sock"),
        };
        let text = err.to_string();

        assert!(text.contains("already exists"));
        assert!(text.contains("access was denied"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_directory_creation_failure_propagates() {
        let root = tempfile::TempDir::new().unwrap();
        let blocker = root.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let path = blocker.join("devworker/worker-1-1.sock");
        let result = bind(&AddressDescriptor::FilesystemChannel { path }).await;

        assert!(matches!(result, Err(BootstrapError::CreateDir { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ensure_socket_dir_is_idempotent() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = root.path().join("a/b/c");

        ensure_socket_dir(&dir).await.unwrap();
        ensure_socket_dir(&dir).await.unwrap();

        assert!(dir.is_dir());
    }
}
