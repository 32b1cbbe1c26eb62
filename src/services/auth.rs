use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    db::{TokenStore, UserStore},
    error::{AuthError, AuthResult, InvalidTokenCause},
    models::{
        auth::{
            ChangePasswordData, RefreshData, RefreshTokenBundle, RenewedAuthToken, SessionData,
            TokenAction, TokenClaims, TokenData, TokenPayload,
        },
        user::UserRecord,
    },
    services::{
        action_tokens::ActionTokens,
        auth_code::AuthCodes,
        jwt::{DecodeOptions, JwtSigner, SignOptions},
        lockout::{FailedLogin, LockoutPolicy},
        password,
    },
};

/// Session login, refresh/renew and the action-token operations built on top.
/// Constructed once at start-up and shared through router state.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    signer: JwtSigner,
    action_tokens: ActionTokens,
    codes: AuthCodes,
    lockout: LockoutPolicy,
    auth_token_lifetime: Duration,
    refresh_token_lifetime: Duration,
    change_password_token_lifetime: Duration,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        codes: AuthCodes,
    ) -> Self {
        let signer = JwtSigner::new(&config.secret);
        Self {
            users,
            action_tokens: ActionTokens::new(
                tokens,
                signer.clone(),
                config.action_token_lifetime,
                config.bcrypt_cost,
            ),
            signer,
            codes,
            lockout: LockoutPolicy::new(config.max_login_attempts, config.lock_duration),
            auth_token_lifetime: config.auth_token_lifetime,
            refresh_token_lifetime: config.refresh_token_lifetime,
            change_password_token_lifetime: config.change_password_token_lifetime,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    /// Phone number + password login. Returns a session auth token.
    pub async fn authenticate(&self, phone_number: &str, password: &str) -> AuthResult<String> {
        let user = self
            .users
            .find_by_phone_number(phone_number)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let now = Utc::now();
        if self.lockout.is_locked(&user, now) {
            tracing::warn!(user_id = %user.id, "login rejected: account locked");
            return Err(AuthError::AccountLocked);
        }
        if !user.confirmed {
            return Err(AuthError::UserNotConfirmed);
        }

        let valid = match password::verify(password, &user.password_hash).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(user_id = %user.id, "password verify error: {e}");
                false
            }
        };
        if !valid {
            match self.lockout.on_failure(&user, now) {
                FailedLogin::Restart { lock_until } => {
                    self.users.restart_login_attempts(user.id, lock_until).await?
                }
                FailedLogin::Increment { lock_until } => {
                    if lock_until.is_some() {
                        tracing::warn!(user_id = %user.id, "too many failed logins, locking account");
                    }
                    self.users.increment_login_attempts(user.id, lock_until).await?
                }
            }
            return Err(AuthError::InvalidCredentials);
        }

        self.users.reset_login_attempts(user.id).await?;
        self.users.record_login(user.id, now).await?;
        tracing::info!(user_id = %user.id, "user authenticated");
        self.create_user_token(&user)
    }

    /// Verify a session token and mint a refresh token bound to `audience`,
    /// plus a fresh session token.
    pub async fn get_refresh_token(
        &self,
        auth_token: &str,
        audience: &str,
    ) -> AuthResult<RefreshTokenBundle> {
        let session = self.verify_auth_token(auth_token)?;
        let user = self.load_user(session.id).await?;

        let auth_token = self.create_user_token(&user)?;
        let expires = expires_at_millis(self.refresh_token_lifetime);
        let refresh_token = self
            .signer
            .sign_async(
                TokenPayload::new(RefreshData { uid: user.id }),
                SignOptions::expiring_in(self.refresh_token_lifetime)
                    .audience(audience)
                    .subject(TokenAction::Refresh.as_str()),
            )
            .await?;

        tracing::info!(user_id = %user.id, audience, "refresh token issued");
        Ok(RefreshTokenBundle {
            auth_token,
            refresh_token,
            expires,
        })
    }

    /// Redeem a refresh token issued for `audience`.
    pub async fn renew_auth_token(
        &self,
        refresh_token: &str,
        audience: &str,
    ) -> AuthResult<RenewedAuthToken> {
        let claims: TokenClaims<RefreshData> = self.signer.decode(
            refresh_token,
            &DecodeOptions::default()
                .audience(audience)
                .subject(TokenAction::Refresh.as_str()),
        )?;
        let user = self.load_user(claims.data.uid).await?;

        Ok(RenewedAuthToken {
            auth_token: self.create_user_token(&user)?,
            expires_in: expires_at_millis(self.auth_token_lifetime),
        })
    }

    /// Decode a session auth token into the user's id and roles.
    pub fn verify_auth_token(&self, token: &str) -> AuthResult<SessionData> {
        self.signer
            .decode::<SessionData>(
                token,
                &DecodeOptions::default().subject(TokenAction::AuthToken.as_str()),
            )
            .map(|claims| claims.data)
    }

    pub fn create_user_token(&self, user: &UserRecord) -> AuthResult<String> {
        self.signer.sign(
            &TokenPayload::new(SessionData {
                id: user.id,
                roles: user.roles.clone(),
            }),
            &SignOptions::expiring_in(self.auth_token_lifetime)
                .subject(TokenAction::AuthToken.as_str()),
        )
    }

    pub async fn generate_action_token<T: Serialize>(
        &self,
        data: &T,
        action: TokenAction,
        expires_in: Option<Duration>,
    ) -> AuthResult<TokenData> {
        self.action_tokens.generate(data, action, expires_in).await
    }

    pub async fn check_action_token<T: DeserializeOwned>(
        &self,
        token_data: &TokenData,
    ) -> AuthResult<TokenClaims<T>> {
        self.action_tokens.check(token_data).await
    }

    pub async fn remove_action_token(&self, id: &str) -> AuthResult<()> {
        self.action_tokens.remove(id).await
    }

    /// Single use of a checked action token; fails if it was already used.
    pub async fn consume_action_token(&self, id: &str) -> AuthResult<()> {
        self.action_tokens.consume(id).await
    }

    /// Start a password change: issue a `CHANGE_PASSWORD` action token.
    pub async fn restore_password(&self, phone_number: &str) -> AuthResult<TokenData> {
        let user = self
            .users
            .find_by_phone_number(phone_number)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.confirmed {
            return Err(AuthError::UserNotConfirmed);
        }

        self.codes.issue(&user).await?;
        self.generate_action_token(
            &ChangePasswordData {
                phone_number: phone_number.to_owned(),
                uid: user.id,
            },
            TokenAction::ChangePassword,
            Some(self.change_password_token_lifetime),
        )
        .await
    }

    /// Finish a password change. Needs the action token and the code sent to
    /// the phone; consumes both and returns a new session token.
    pub async fn change_password(
        &self,
        phone_number: &str,
        token_data: &TokenData,
        new_password: &str,
        code: &str,
    ) -> AuthResult<String> {
        let claims: TokenClaims<ChangePasswordData> =
            self.check_action_token(token_data).await?;
        if claims.action != Some(TokenAction::ChangePassword) {
            return Err(AuthError::InvalidToken(InvalidTokenCause::ActionMismatch));
        }
        if claims.data.phone_number != phone_number {
            return Err(AuthError::InvalidToken(InvalidTokenCause::PayloadMismatch));
        }

        let user = self.load_user(claims.data.uid).await?;
        self.codes.check(&user, code).await?;
        self.consume_action_token(&token_data.id).await?;

        let hash = password::hash(new_password, self.bcrypt_cost).await?;
        self.users.update_password(user.id, &hash).await?;
        let auth_token = self.create_user_token(&user)?;
        tracing::info!(user_id = %user.id, "password changed");
        Ok(auth_token)
    }

    async fn load_user(&self, id: Uuid) -> AuthResult<UserRecord> {
        self.users.find_by_id(id).await?.ok_or(AuthError::UserNotFound)
    }
}

fn expires_at_millis(lifetime: Duration) -> i64 {
    Utc::now().timestamp_millis() + lifetime.as_millis() as i64
}
