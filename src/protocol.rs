//! Wire messages exchanged with the supervising parent process.
//!
//! Every message is a single JSON object on its own line. The worker only
//! ever emits [`ParentMessage`] values and only ever acts on
//! [`ControlMessage`] values; anything else read from the parent is dropped.
//!
//! ```json
//! {"event":"listen","address":{"socketPath":"/tmp/devworker/worker-42-1.sock"}}
//! {"event":"listen","address":{"host":"localhost","port":41234}}
//! {"event":"exit"}
//! {"event":"shutdown"}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// How external callers can reach the bound listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundAddress {
    Socket {
        #[serde(rename = "socketPath")]
        socket_path: String,
    },
    Tcp { host: String, port: u16 },
}

impl BoundAddress {
    pub fn socket(path: impl Into<String>) -> Self {
        BoundAddress::Socket {
            socket_path: path.into(),
        }
    }

    pub fn localhost(port: u16) -> Self {
        BoundAddress::Tcp {
            host: "localhost".to_string(),
            port,
        }
    }
}

impl fmt::Display for BoundAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundAddress::Socket { socket_path } => write!(f, "unix:{socket_path}"),
            BoundAddress::Tcp { host, port } => write!(f, "http://{host}:{port}"),
        }
    }
}

/// Worker → parent announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ParentMessage {
    Listen { address: BoundAddress },
    Exit,
}

/// Parent → worker control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ControlMessage {
    Shutdown,
}

impl ControlMessage {
    /// Parses one line from the parent. Unknown or malformed shapes yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line.trim()).ok()
    }
}
