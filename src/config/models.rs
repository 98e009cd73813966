use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listen channel selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelConfig {
    /// Directory (POSIX) or pipe namespace segment (Windows) holding worker sockets
    #[serde(default = "default_socket_dir")]
    pub socket_dir: String,
    /// Parent of `socket_dir` on POSIX; the OS temp dir when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_root: Option<PathBuf>,
    /// Always listen on an ephemeral loopback port
    #[serde(default)]
    pub disable_socket: bool,
    /// Environment variables whose presence marks a sandboxed provider
    #[serde(default = "default_sandbox_env_vars")]
    pub sandbox_env_vars: Vec<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            socket_dir: default_socket_dir(),
            socket_root: None,
            disable_socket: false,
            sandbox_env_vars: default_sandbox_env_vars(),
        }
    }
}

fn default_socket_dir() -> String {
    "devworker".to_string()
}

fn default_sandbox_env_vars() -> Vec<String> {
    vec!["STACKBLITZ".to_string(), "WEBCONTAINER".to_string()]
}

/// Internal task endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TasksConfig {
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            route_prefix: default_route_prefix(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_route_prefix() -> String {
    "/_internal/tasks".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024 // 1 MiB
}

/// Shutdown sequencing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShutdownConfig {
    /// Upper bound for each close step; 0 waits indefinitely
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

impl ShutdownConfig {
    pub fn close_timeout(&self) -> Option<Duration> {
        (self.close_timeout_ms > 0).then(|| Duration::from_millis(self.close_timeout_ms))
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

fn default_close_timeout_ms() -> u64 {
    30_000
}

/// Log output
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
