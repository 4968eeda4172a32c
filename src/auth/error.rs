use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failures surfaced by the authentication and authorization core.
///
/// Every variant maps to exactly one HTTP outcome; see [`IntoResponse`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identity or wrong secret. The two cases are never distinguished.
    #[error("invalid credentials")]
    InvalidCredential,
    #[error("expired or invalid token")]
    ExpiredOrInvalidToken,
    /// The claim requirement of a policy is unmet. Carries no claim name.
    #[error("access denied")]
    PolicyDenied,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("secure random source unavailable")]
    Randomness,
    #[error("storage error")]
    Storage(#[from] sqlx::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidCredential => (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response(),
            Self::ExpiredOrInvalidToken => StatusCode::UNAUTHORIZED.into_response(),
            Self::PolicyDenied => StatusCode::FORBIDDEN.into_response(),
            Self::Configuration(message) => {
                error!("Configuration error reached a request: {message}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Randomness => {
                error!("Secure random source unavailable");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Storage(err) => {
                error!("Storage failure during auth: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
