use crate::{services::ServiceError, storage::StorageError, validation::ValidationError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use tracing::{error, warn};

/// HTTP-facing error. Serialized as `{ "error", "status", "code"? }`, where
/// `code` is the datastore's own error code when it reported one.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<String>,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: Option<String>) -> Self {
        self.code = code;
        self
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message,
            "status": self.status.as_u16()
        });
        if let Some(code) = self.code {
            body["code"] = json!(code);
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        let status = match err {
            ValidationError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        AppError::new(status, err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        let status = match &err {
            StorageError::NotFound { .. } | StorageError::Sqlx(sqlx::Error::RowNotFound) => {
                StatusCode::NOT_FOUND
            }
            StorageError::RemoteDisabled | StorageError::GatewayDisabled => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            StorageError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            StorageError::Gateway { .. } | StorageError::Http(_) | StorageError::Malformed(_) => {
                StatusCode::BAD_GATEWAY
            }
            StorageError::Sqlx(_) | StorageError::Io(_) | StorageError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(error = %err, "storage failure");
        }
        AppError::new(status, err.to_string()).with_code(err.code())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(err) => err.into(),
            ServiceError::Storage(err) => err.into(),
            ServiceError::UploadFailed { .. } => {
                AppError::new(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            ServiceError::GalleryClosed(_) => {
                warn!(error = %err, "write to closed gallery");
                AppError::new(StatusCode::FORBIDDEN, err.to_string())
            }
        }
    }
}
