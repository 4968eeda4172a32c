//! API handlers and shared request helpers.

pub mod accounts;
pub mod authors;
pub mod books;
pub mod health;
pub mod root;
#[cfg(test)]
pub(crate) mod test_db;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;

use crate::auth::AuthError;
use crate::pagination::PaginationError;

/// Handler-level failures on top of [`AuthError`].
#[derive(Debug)]
pub enum ServiceError {
    BadRequest(&'static str),
    NotFound,
    Pagination(PaginationError),
    Auth(AuthError),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Auth(AuthError::Storage(err))
    }
}

impl From<PaginationError> for ServiceError {
    fn from(err: PaginationError) -> Self {
        Self::Pagination(err)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Pagination(err) => err.into_response(),
            Self::Auth(err) => err.into_response(),
        }
    }
}

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Lightweight email sanity check on already-normalized input.
pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Trim and drop empty strings.
pub(crate) fn normalize_name(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
