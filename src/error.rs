use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Storage Errors
///
/// Database failures are split so handlers can react to the ones that are
/// the caller's fault:
///
/// - `Conflict` - A unique constraint was violated (e.g. duplicate email)
/// - `Database` - Any other driver or pool failure (never shown to clients)
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Template rendering failed: {0}")]
    Template(#[from] askama::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    /// Whether this error was caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Conflict(_)
                | AppError::NotFound(_)
                | AppError::BadRequest(_)
                | AppError::Validation(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full error details server-side for debugging
        // but only expose sanitized messages to clients
        if self.is_client_error() {
            tracing::debug!(error = %self, "Request rejected");
        } else {
            tracing::error!(error = %self, "Request failed");
        }

        let (status, message) = match &self {
            // Internal errors - never expose internal details to clients
            AppError::Database(_) | AppError::Migration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "A storage error occurred. Please try again later.".to_string(),
            ),
            AppError::Session(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Your session could not be loaded. Please try again.".to_string(),
            ),
            AppError::PasswordHash(_) | AppError::Template(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred. Please contact support if the issue persists."
                    .to_string(),
            ),
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Service configuration error. Please contact support.".to_string(),
            ),

            // Client errors - safe to show the message as it's user-facing
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            // 422 is swapped into the page by the htmx beforeSwap hook in static/js/main.js
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
        };

        (
            status,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
