use crate::compliance::{
    AlertError, BatchError, BatchSelectorError, RepositoryError, SnapshotError, StatusServiceError,
};
use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Status(StatusServiceError),
    Batch(BatchError),
    Snapshot(SnapshotError),
    Alert(AlertError),
    Serialization(serde_json::Error),
}

impl AppError {
    /// Batch selector problems are usage errors rather than run failures.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, AppError::Batch(BatchError::Selector(_)))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Status(err) => write!(f, "status error: {}", err),
            AppError::Batch(err) => write!(f, "batch error: {}", err),
            AppError::Snapshot(err) => write!(f, "snapshot error: {}", err),
            AppError::Alert(err) => write!(f, "alert error: {}", err),
            AppError::Serialization(err) => write!(f, "serialization error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Status(err) => Some(err),
            AppError::Batch(err) => Some(err),
            AppError::Snapshot(err) => Some(err),
            AppError::Alert(err) => Some(err),
            AppError::Serialization(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Status(
                StatusServiceError::ControlNotFound(_)
                | StatusServiceError::EvidenceNotFound(_)
                | StatusServiceError::PackNotFound(_)
                | StatusServiceError::NoteNotFound(_)
                | StatusServiceError::Repository(RepositoryError::NotFound),
            ) => StatusCode::NOT_FOUND,
            AppError::Status(StatusServiceError::BlankNote) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Status(StatusServiceError::Repository(RepositoryError::Conflict)) => {
                StatusCode::CONFLICT
            }
            AppError::Status(StatusServiceError::Repository(RepositoryError::Unavailable(_))) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Batch(BatchError::Selector(_)) => StatusCode::BAD_REQUEST,
            AppError::Snapshot(SnapshotError::InvalidRule(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Status(_)
            | AppError::Batch(_)
            | AppError::Snapshot(_)
            | AppError::Alert(_)
            | AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<StatusServiceError> for AppError {
    fn from(value: StatusServiceError) -> Self {
        Self::Status(value)
    }
}

impl From<BatchError> for AppError {
    fn from(value: BatchError) -> Self {
        Self::Batch(value)
    }
}

impl From<BatchSelectorError> for AppError {
    fn from(value: BatchSelectorError) -> Self {
        Self::Batch(BatchError::Selector(value))
    }
}

impl From<SnapshotError> for AppError {
    fn from(value: SnapshotError) -> Self {
        Self::Snapshot(value)
    }
}

impl From<AlertError> for AppError {
    fn from(value: AlertError) -> Self {
        Self::Alert(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
