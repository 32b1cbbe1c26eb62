use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::AuthError;

/// Maps error kinds to HTTP statuses. The only place that knows about both.
#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    /// Request is missing or has malformed input.
    BadRequest(String),
    /// No `x-auth-token` on a protected route.
    MissingAuth,
    /// Authenticated, but roles do not allow the route.
    Forbidden,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) => match err {
                AuthError::InvalidAuthToken | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::InvalidCredentials | AuthError::InvalidAuthCode => StatusCode::FORBIDDEN,
                AuthError::UserNotFound => StatusCode::NOT_FOUND,
                AuthError::UserNotConfirmed | AuthError::SelfInvitation => {
                    StatusCode::METHOD_NOT_ALLOWED
                }
                AuthError::AccountLocked => StatusCode::REQUEST_TIMEOUT,
                AuthError::MissingExpiration | AuthError::Store(_) | AuthError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingAuth => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Auth(err) => err.code(),
            ApiError::BadRequest(_) => "INCORRECT_FORM_DATA",
            ApiError::MissingAuth | ApiError::Forbidden => "INSUFFICIENT_PRIVILEGES",
        }
    }

    fn message(&self) -> String {
        match self {
            // internal details stay in the logs
            ApiError::Auth(AuthError::Store(_) | AuthError::Internal(_)) => {
                "Unexpected error".to_string()
            }
            ApiError::Auth(err) => err.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::MissingAuth => "Missing x-auth-token header".to_string(),
            ApiError::Forbidden => "Insufficient privileges".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self);
        }
        (
            status,
            Json(json!({ "code": self.code(), "message": self.message() })),
        )
            .into_response()
    }
}
