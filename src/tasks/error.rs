use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

/// Structured failure of a task invocation, rendered as a JSON response
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task `{name}` is not available")]
    NotFound { name: String },
    #[error("task `{name}` rejected its payload: {message}")]
    InvalidPayload { name: String, message: String },
    #[error("task `{name}` failed: {message}")]
    Failed { name: String, message: String },
    #[error("task `{name}` panicked: {message}")]
    Panicked { name: String, message: String },
}

#[derive(Debug, Serialize)]
pub struct TaskErrorResponse {
    pub code: &'static str,
    pub message: String,
    pub task: String,
}

impl TaskError {
    pub fn task_name(&self) -> &str {
        match self {
            TaskError::NotFound { name }
            | TaskError::InvalidPayload { name, .. }
            | TaskError::Failed { name, .. }
            | TaskError::Panicked { name, .. } => name,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            TaskError::NotFound { .. } => StatusCode::NOT_FOUND,
            TaskError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            TaskError::Failed { .. } | TaskError::Panicked { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TaskError::NotFound { .. } => "TASK_NOT_FOUND",
            TaskError::InvalidPayload { .. } => "INVALID_PAYLOAD",
            TaskError::Failed { .. } => "TASK_FAILED",
            TaskError::Panicked { .. } => "TASK_PANICKED",
        }
    }

    pub fn to_response_body(&self) -> TaskErrorResponse {
        TaskErrorResponse {
            code: self.code(),
            message: self.to_string(),
            task: self.task_name().to_string(),
        }
    }
}

impl IntoResponse for TaskError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_response_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_not_found_body() {
        let err = TaskError::NotFound {
            name: "nonexistent".to_string(),
        };

        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::to_value(err.to_response_body()).unwrap(),
            json!({
                "code": "TASK_NOT_FOUND",
                "message": "task `nonexistent` is not available",
                "task": "nonexistent"
            })
        );
    }

    #[test]
    fn test_status_codes() {
        let failed = TaskError::Failed {
            name: "t".to_string(),
            message: "boom".to_string(),
        };
        let invalid = TaskError::InvalidPayload {
            name: "t".to_string(),
            message: "missing id".to_string(),
        };

        assert_eq!(failed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.code(), "TASK_FAILED");
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.task_name(), "t");
    }
}
