//! Listen address selection.
//!
//! [`resolve`] is pure: every host fact it depends on is captured up front
//! in a [`HostEnvironment`], so the policy can be exercised for any platform
//! from any platform.

use serde::Serialize;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::ChannelConfig;

/// Plain environment flag that forces an ephemeral TCP listener.
pub const DISABLE_SOCKET_ENV: &str = "DEVWORKER_NO_UNIX_SOCKET";

const PIPE_NAMESPACE: &str = r"\\.\pipe";

/// Where the worker should listen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AddressDescriptor {
    /// Loopback TCP, port chosen by the OS.
    Ephemeral,
    /// Unix domain socket path or Windows named pipe path.
    FilesystemChannel { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Posix,
    /// No filesystem-backed channel support (e.g. wasm targets).
    Unsupported,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(unix) {
            Platform::Posix
        } else {
            Platform::Unsupported
        }
    }
}

/// Host facts the resolver decides on.
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    pub platform: Platform,
    pub pid: u32,
    pub worker_id: u32,
    /// Running inside a constrained provider that cannot host local sockets
    pub sandboxed: bool,
    pub socket_disabled: bool,
    /// Parent directory for the POSIX socket directory
    pub temp_dir: PathBuf,
    pub socket_dir: String,
}

impl HostEnvironment {
    /// Captures the facts of the running process.
    pub fn detect(config: &ChannelConfig, worker_id: u32) -> Self {
        Self::from_lookup(config, worker_id, |key| std::env::var_os(key))
    }

    /// Same as [`detect`](Self::detect) with an injectable environment lookup.
    pub fn from_lookup<F>(config: &ChannelConfig, worker_id: u32, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let sandboxed = config
            .sandbox_env_vars
            .iter()
            .any(|key| lookup(key).is_some());

        let socket_disabled = config.disable_socket
            || lookup(DISABLE_SOCKET_ENV).is_some_and(|value| !value.is_empty());

        Self {
            platform: Platform::current(),
            pid: std::process::id(),
            worker_id,
            sandboxed,
            socket_disabled,
            temp_dir: config
                .socket_root
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            socket_dir: config.socket_dir.clone(),
        }
    }
}

/// File name shared by every worker channel: `worker-<pid>-<workerId>.sock`.
pub fn socket_name(pid: u32, worker_id: u32) -> String {
    format!("worker-{pid}-{worker_id}.sock")
}

/// Picks the listen address for this worker. First match wins:
/// sandbox / disable flag / no channel support → ephemeral TCP, otherwise a
/// per-(pid, worker) channel path.
pub fn resolve(env: &HostEnvironment) -> AddressDescriptor {
    if env.sandboxed || env.socket_disabled || env.platform == Platform::Unsupported {
        return AddressDescriptor::Ephemeral;
    }

    let name = socket_name(env.pid, env.worker_id);
    let path = match env.platform {
        Platform::Windows => PathBuf::from(format!(
            "{PIPE_NAMESPACE}\\{}\\{name}",
            env.socket_dir
        )),
        _ => env.temp_dir.join(&env.socket_dir).join(name),
    };

    AddressDescriptor::FilesystemChannel { path }
}
