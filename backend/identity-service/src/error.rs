use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crypto_core::jwt::JwtError;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors that leave the identity workflow through the error channel
///
/// Business outcomes (phone number taken, unknown phone number, wrong
/// password) are not errors; they are variants of the per-operation outcome
/// enums in `services::identity`.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("User not found")]
    UserNotFound,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Password hashing error: {0}")]
    Hashing(String),

    #[error("JWT error: {0}")]
    Jwt(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// `{"message": ...}` body shared by every non-validation error response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl IdentityError {
    /// HTTP status for the wire protocol
    pub fn status_code(&self) -> StatusCode {
        match self {
            IdentityError::InvalidToken => StatusCode::FORBIDDEN,
            IdentityError::UserNotFound
            | IdentityError::Hashing(_)
            | IdentityError::Jwt(_)
            | IdentityError::Database(_)
            | IdentityError::Timeout(_)
            | IdentityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            IdentityError::InvalidToken => "Forbidden".to_string(),
            // Don't leak internal details
            _ => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(MessageResponse::new(self.public_message()))).into_response()
    }
}

// Conversions from external error types
impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        IdentityError::Database(err.to_string())
    }
}

impl From<JwtError> for IdentityError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::InvalidToken(reason) => {
                tracing::debug!(%reason, "Rejected token");
                IdentityError::InvalidToken
            }
            JwtError::KeyMaterial(_) | JwtError::Signing(_) => {
                tracing::error!("JWT error: {}", err);
                IdentityError::Jwt(err.to_string())
            }
        }
    }
}

impl From<tokio::task::JoinError> for IdentityError {
    fn from(err: tokio::task::JoinError) -> Self {
        IdentityError::Internal(format!("Blocking task failed: {}", err))
    }
}
