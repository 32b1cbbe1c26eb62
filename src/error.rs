use thiserror::Error;

/// Failure of a backing store (user, token record or invitation store).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Backend(String),
}

/// Why an action token was rejected. Never exposed to callers: every cause
/// surfaces as the same `AuthError::InvalidToken` kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTokenCause {
    /// No persisted record for the presented id.
    RecordMissing,
    /// Token string does not match the stored hash.
    HashMismatch,
    /// JWT signature invalid or token expired.
    Signature,
    /// Decoded `action` is not the one the caller expected.
    ActionMismatch,
    /// Decoded payload does not match the request it is used with.
    PayloadMismatch,
}

impl InvalidTokenCause {
    pub fn code(&self) -> &'static str {
        match self {
            InvalidTokenCause::RecordMissing => "TOKEN_RECORD_MISSING",
            InvalidTokenCause::HashMismatch => "TOKEN_HASH_MISMATCH",
            InvalidTokenCause::Signature => "TOKEN_SIGNATURE_INVALID",
            InvalidTokenCause::ActionMismatch => "TOKEN_ACTION_MISMATCH",
            InvalidTokenCause::PayloadMismatch => "TOKEN_PAYLOAD_MISMATCH",
        }
    }
}

/// Authentication and token errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("User not found")]
    UserNotFound,

    #[error("User not confirmed")]
    UserNotConfirmed,

    #[error("Max login attempts reached, account is locked")]
    AccountLocked,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing, incorrect or expired auth token")]
    InvalidAuthToken,

    #[error("Token hash missing or incorrect")]
    InvalidToken(InvalidTokenCause),

    #[error("Verification code missing, incorrect or expired")]
    InvalidAuthCode,

    #[error("Users cannot invite themselves")]
    SelfInvitation,

    #[error("Missing token expiration")]
    MissingExpiration,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "USER_NOT_FOUND",
            AuthError::UserNotConfirmed => "USER_NOT_CONFIRMED",
            AuthError::AccountLocked => "MAX_LOGIN_ATTEMPTS",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::InvalidAuthToken => "INVALID_AUTH_TOKEN",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::InvalidAuthCode => "INVALID_AUTH_CODE",
            AuthError::SelfInvitation => "METHOD_NOT_ALLOWED",
            AuthError::MissingExpiration | AuthError::Store(_) | AuthError::Internal(_) => {
                "UNEXPECTED_ERROR"
            }
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
