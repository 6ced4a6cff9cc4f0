//! Service and HTTP error types.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{
        commands::WorkerStopped,
        roster::{ErrorClass, RosterError},
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A roster rule rejected the command.
    #[error(transparent)]
    Roster(#[from] RosterError),
    /// The caller lacks the capability required by the command.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The roster worker is no longer running.
    #[error(transparent)]
    WorkerStopped(#[from] WorkerStopped),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The caller is not allowed to run the command.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Roster(rule) => {
                let message = rule.to_string();
                match rule.class() {
                    ErrorClass::NotFound => AppError::NotFound(message),
                    ErrorClass::Duplicate | ErrorClass::Liability => AppError::Conflict(message),
                    ErrorClass::InvalidInput => AppError::BadRequest(message),
                    ErrorClass::Forbidden => AppError::Forbidden(message),
                }
            }
            ServiceError::PermissionDenied(message) => AppError::Forbidden(message),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::WorkerStopped(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<RosterError> for AppError {
    fn from(err: RosterError) -> Self {
        ServiceError::from(err).into()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::player::SlotKind;

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn roster_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(RosterError::NoActiveList.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                RosterError::AlreadyListed {
                    name: "Dana".into(),
                    slot: SlotKind::Waiting,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(RosterError::LiableCannotLeave.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(RosterError::InvalidIdentity("x".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(
                RosterError::Banned {
                    name: "Dana".into(),
                    until: time::macros::datetime!(2026-10-25 12:00 UTC),
                }
                .into()
            ),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn capability_and_storage_failures_are_distinguished() {
        assert_eq!(
            status_of(ServiceError::PermissionDenied("admins only".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ServiceError::Degraded),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
