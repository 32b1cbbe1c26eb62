use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::Role;

/// Discriminates token families and one-time action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenAction {
    ChangePassword,
    InviteMember,
    AcceptInvitation,
    Refresh,
    AuthToken,
}

impl TokenAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenAction::ChangePassword => "CHANGE_PASSWORD",
            TokenAction::InviteMember => "INVITE_MEMBER",
            TokenAction::AcceptInvitation => "ACCEPT_INVITATION",
            TokenAction::Refresh => "REFRESH",
            TokenAction::AuthToken => "AUTH_TOKEN",
        }
    }
}

impl std::fmt::Display for TokenAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller hands to the signer: the `data` body plus an optional
/// informational action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPayload<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<TokenAction>,
}

impl<T> TokenPayload<T> {
    pub fn new(data: T) -> Self {
        Self { data, action: None }
    }

    pub fn with_action(data: T, action: TokenAction) -> Self {
        Self {
            data,
            action: Some(action),
        }
    }
}

/// Full JWT claim set as written to and read from the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<TokenAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Body of a session auth token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub roles: Vec<Role>,
}

/// Body of a refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshData {
    pub uid: Uuid,
}

/// Body of a change-password action token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordData {
    pub phone_number: String,
    pub uid: Uuid,
}

/// An action token and the id of its persisted hash record. Both travel
/// together; the id cannot be derived from the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    pub token: String,
    pub id: String,
}

/// Response of `getRefreshToken`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBundle {
    pub auth_token: String,
    pub refresh_token: String,
    /// Absolute refresh token expiry, epoch millis.
    pub expires: i64,
}

/// Response of `renewAuthToken`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewedAuthToken {
    pub auth_token: String,
    /// Absolute auth token expiry, epoch millis.
    pub expires_in: i64,
}

/// Extracted from a validated `x-auth-token` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
}

impl From<SessionData> for AuthenticatedUser {
    fn from(data: SessionData) -> Self {
        Self {
            user_id: data.id,
            roles: data.roles,
        }
    }
}
