//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service, and the mapping of
//! core failures onto HTTP rejections.

use crate::config::ConfigError;
use axum::http::StatusCode;
use panchakarma_core::CoreError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure to apply the database migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The rejection type returned by every REST handler.
pub type Rejection = (StatusCode, String);

/// Maps a core failure onto the status code and message shown to the client.
pub fn reject(err: CoreError) -> Rejection {
    let status = match &err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::InvalidTransition { .. }
        | CoreError::PrematureCompletion { .. }
        | CoreError::Conflict { .. } => StatusCode::CONFLICT,
        CoreError::SessionNotEligible { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    }
    (status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use panchakarma_core::{PortError, SessionStatus};

    #[test]
    fn maps_taxonomy_to_status_codes() {
        assert_eq!(reject(CoreError::Validation("rating".into())).0, StatusCode::BAD_REQUEST);
        assert_eq!(
            reject(CoreError::InvalidTransition {
                from: SessionStatus::Completed,
                to: SessionStatus::Cancelled
            })
            .0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            reject(CoreError::upstream(
                "list_sessions",
                None,
                PortError::Unavailable("timed out".into())
            ))
            .0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
