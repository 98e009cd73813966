//! Configuration management for devworker
//!
//! Settings are layered from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Environment Variables
//!
//! Any setting can be overridden with `DEVWORKER__<section>__<key>`:
//! - `DEVWORKER__CHANNEL__DISABLE_SOCKET=true`
//! - `DEVWORKER__SHUTDOWN__CLOSE_TIMEOUT_MS=5000`
//! - `DEVWORKER__TASKS__ROUTE_PREFIX=/_tasks`
//!
//! # Configuration File
//!
//! Loaded from `config/devworker.toml` unless `DEVWORKER_CONFIG` points
//! elsewhere. A missing file is not an error.

mod models;
mod sources;
mod validation;

pub use models::{ChannelConfig, Config, LoggingConfig, ShutdownConfig, TasksConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
