//! Duplex message channel with the supervising parent.
//!
//! The link is split into two halves with closed message sets:
//! [`Announcer`] only writes [`ParentMessage`]s and [`ControlReceiver`] only
//! surfaces shutdown requests (or the loss of the parent). Messages are
//! newline-delimited JSON, by default over the process's stdout and stdin.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::protocol::{BoundAddress, ControlMessage, ParentMessage};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("listen address was already announced")]
    AlreadyListening,

    #[error("exit was already announced")]
    AlreadyExited,

    #[error("failed to encode parent message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("parent channel write failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// What the control half observed from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    ShutdownRequested,
    /// The control channel closed or failed; nobody will ask us to stop.
    ParentGone,
}

pub struct ParentLink {
    announcer: Announcer,
    control: ControlReceiver,
}

impl ParentLink {
    /// Link over this process's stdin (control) and stdout (announcements).
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }

    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            announcer: Announcer::new(Box::new(writer)),
            control: ControlReceiver::new(Box::new(reader)),
        }
    }

    pub fn split(self) -> (Announcer, ControlReceiver) {
        (self.announcer, self.control)
    }
}

/// Worker → parent half.
pub struct Announcer {
    writer: Mutex<BoxedWriter>,
    listening: AtomicBool,
    exited: AtomicBool,
}

impl Announcer {
    fn new(writer: BoxedWriter) -> Self {
        Self {
            writer: Mutex::new(writer),
            listening: AtomicBool::new(false),
            exited: AtomicBool::new(false),
        }
    }

    /// Tells the parent where to connect. Only the first call sends anything.
    pub async fn announce_listening(&self, address: &BoundAddress) -> Result<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(LinkError::AlreadyListening);
        }

        info!(%address, "Announcing listen address to parent");
        self.send(&ParentMessage::Listen {
            address: address.clone(),
        })
        .await
    }

    /// Last message of the worker's life. Only the first call sends anything.
    pub async fn announce_exit(&self) -> Result<()> {
        if self.exited.swap(true, Ordering::SeqCst) {
            return Err(LinkError::AlreadyExited);
        }

        info!("Announcing exit to parent");
        self.send(&ParentMessage::Exit).await
    }

    async fn send(&self, message: &ParentMessage) -> Result<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Parent → worker half.
pub struct ControlReceiver {
    reader: BufReader<BoxedReader>,
    line: Vec<u8>,
}

impl ControlReceiver {
    fn new(reader: BoxedReader) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: Vec::new(),
        }
    }

    /// Waits for the next shutdown request, skipping anything unrecognized.
    ///
    /// Only end of input or a failed read means the parent is gone; lines
    /// that are not UTF-8 are dropped like any other unknown message.
    pub async fn next_event(&mut self) -> LinkEvent {
        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line).await {
                Ok(0) => return LinkEvent::ParentGone,
                Ok(_) => {
                    let Ok(line) = std::str::from_utf8(&self.line) else {
                        debug!(bytes = self.line.len(), "Ignoring non UTF-8 parent message");
                        continue;
                    };
                    match ControlMessage::parse(line) {
                        Some(ControlMessage::Shutdown) => return LinkEvent::ShutdownRequested,
                        None if line.trim().is_empty() => {}
                        None => debug!(
                            line = %line.trim_end(),
                            "Ignoring unrecognized parent message"
                        ),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Reading from parent failed");
                    return LinkEvent::ParentGone;
                }
            }
        }
    }

    /// Runs `callback` for every shutdown request, and once more with
    /// [`LinkEvent::ParentGone`] when the channel closes. Each callback
    /// completes before the next message is read.
    pub fn on_shutdown_requested<F, Fut>(mut self, callback: F) -> JoinHandle<()>
    where
        F: Fn(LinkEvent) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            loop {
                let event = self.next_event().await;
                callback(event).await;

                if event == LinkEvent::ParentGone {
                    break;
                }
            }
        })
    }
}
