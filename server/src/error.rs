use axum::http::StatusCode;

/// Failures surfaced to callers of the identity and outpass operations.
///
/// Handlers convert this into the `(StatusCode, String)` rejection used across
/// the router, so `?` works directly inside handler bodies.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Bad or missing input fields. Reported, never retried.
    #[error("{0}")]
    Validation(String),

    /// Unknown record id.
    #[error("{0}")]
    NotFound(String),

    /// The record's current state forbids the transition.
    #[error("{0}")]
    Conflict(String),

    /// Missing, invalid or expired credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// The backing store failed (lock poisoned, SQL error, task join).
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(e: rusqlite::Error) -> Self {
        ServiceError::Storage(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServiceError::Storage(format!("Task join: {}", e))
    }
}

impl From<ServiceError> for (StatusCode, String) {
    fn from(e: ServiceError) -> Self {
        if let ServiceError::Storage(ref detail) = e {
            tracing::error!(error = %detail, "Storage failure");
        }
        (e.status(), e.to_string())
    }
}
