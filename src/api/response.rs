//! Error responses for the labor cost API.
//!
//! Engine errors map onto HTTP statuses: missing entities are 404, rejected
//! input is 400 and configuration or store failures are 500.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a validation error response.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }

    fn not_found(code: &str, kind: &str, id: &str) -> Self {
        Self::with_details(
            code,
            format!("{} not found: {}", kind, id),
            format!("No {} with id '{}' exists for this tenant", kind.to_lowercase(), id),
        )
    }
}

/// API error with HTTP status code.
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// A 400 response.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }

    fn not_found(error: ApiError) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error,
        }
    }

    fn internal(error: ApiError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            Json(self.error),
        )
            .into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::ConfigNotFound { path } => Self::internal(ApiError::with_details(
                "CONFIG_ERROR",
                "Configuration error",
                format!("Configuration file not found: {}", path),
            )),
            EngineError::ConfigParseError { path, message } => {
                Self::internal(ApiError::with_details(
                    "CONFIG_ERROR",
                    "Configuration parse error",
                    format!("Failed to parse {}: {}", path, message),
                ))
            }
            EngineError::ConfigInvalid { message } => Self::internal(ApiError::with_details(
                "CONFIG_ERROR",
                "Configuration is inconsistent",
                message,
            )),
            EngineError::WorkerNotFound { id } => {
                Self::not_found(ApiError::not_found("WORKER_NOT_FOUND", "Worker", &id))
            }
            EngineError::WorkOrderNotFound { id } => {
                Self::not_found(ApiError::not_found("WORK_ORDER_NOT_FOUND", "Work order", &id))
            }
            EngineError::TaskNotFound { id } => {
                Self::not_found(ApiError::not_found("TASK_NOT_FOUND", "Task", &id))
            }
            EngineError::SubTaskNotFound {
                task_id,
                sub_task_id,
            } => Self::not_found(ApiError::with_details(
                "SUBTASK_NOT_FOUND",
                format!("Subtask not found: {}", sub_task_id),
                format!("Task '{}' has no subtask '{}'", task_id, sub_task_id),
            )),
            EngineError::ProductNotFound { id } => {
                Self::not_found(ApiError::not_found("PRODUCT_NOT_FOUND", "Product", &id))
            }
            EngineError::ProjectNotFound { id } => {
                Self::not_found(ApiError::not_found("PROJECT_NOT_FOUND", "Project", &id))
            }
            EngineError::UnknownStage { stage } => Self::bad_request(ApiError::with_details(
                "UNKNOWN_STAGE",
                format!("Unknown stage: {}", stage),
                "The stage is not part of the configured stage order",
            )),
            EngineError::InvalidInput { field, message } => Self::bad_request(
                ApiError::with_details(
                    "VALIDATION_ERROR",
                    format!("Invalid field '{}': {}", field, message),
                    "The request contains invalid information",
                ),
            ),
            EngineError::Store { message } => Self::internal(ApiError::with_details(
                "STORE_ERROR",
                "Storage operation failed",
                message,
            )),
        }
    }
}
