use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;

/// Application error, surfaced directly as the HTTP response.
/// Nothing here is retried or recovered; this app has no resilience layer.
#[derive(Debug, Error)]
pub enum AppError {
    /// Registration with a child_id that already exists
    #[error("Username already exists!")]
    DuplicateAccount,

    /// Login failure. Deliberately does not say whether the account or
    /// the password was wrong.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// No active session; surfaced as a redirect to the login page
    #[error("Not logged in")]
    Unauthenticated,

    /// Unknown goal id
    #[error("Goal not found")]
    NotFound,

    /// Goal owned by a different account
    #[error("Unauthorized")]
    Forbidden,

    /// Malformed form input, e.g. an unparsable due date
    #[error("{0}")]
    BadRequest(String),

    /// Storage or hashing failure
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthenticated => Redirect::to("/login").into_response(),
            AppError::DuplicateAccount => {
                (StatusCode::CONFLICT, self.to_string()).into_response()
            }
            AppError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            AppError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()).into_response(),
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
