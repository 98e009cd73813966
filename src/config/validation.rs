use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("tasks.route_prefix must start with '/' and not end with '/': '{0}'")]
    InvalidRoutePrefix(String),

    #[error("channel.socket_dir must be a single non-empty path segment: '{0}'")]
    InvalidSocketDir(String),

    #[error("tasks.max_body_bytes must be positive")]
    InvalidBodyLimit,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_route_prefix(&config.tasks.route_prefix)?;
    validate_socket_dir(&config.channel.socket_dir)?;

    if config.tasks.max_body_bytes == 0 {
        return Err(ValidationError::InvalidBodyLimit);
    }

    Ok(())
}

fn validate_route_prefix(prefix: &str) -> Result<(), ValidationError> {
    if !prefix.starts_with('/') || prefix.ends_with('/') {
        return Err(ValidationError::InvalidRoutePrefix(prefix.to_string()));
    }
    Ok(())
}

/// The directory name is joined under the temp dir and the pipe namespace,
/// so it must not escape either.
fn validate_socket_dir(dir: &str) -> Result<(), ValidationError> {
    let invalid = dir.is_empty()
        || dir == "."
        || dir == ".."
        || dir.contains('/')
        || dir.contains('\\')
        || dir.contains('\0');

    if invalid {
        return Err(ValidationError::InvalidSocketDir(dir.to_string()));
    }
    Ok(())
}
