//! Short numeric verification codes sent to a user's phone. A code is the
//! second factor of a password change: the action token alone is not enough.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use crate::config::AuthConfig;
use crate::db::AuthCodeStore;
use crate::error::{AuthError, AuthResult};
use crate::models::user::UserRecord;

/// Delivers a code to a phone number.
#[async_trait]
pub trait CodeSender: Send + Sync {
    async fn send(&self, phone_number: &str, code: &str) -> AuthResult<()>;
}

/// Sender used when no SMS gateway is wired in. Records the delivery in the
/// logs without the code itself.
pub struct LogCodeSender;

#[async_trait]
impl CodeSender for LogCodeSender {
    async fn send(&self, phone_number: &str, _code: &str) -> AuthResult<()> {
        tracing::info!(phone_number, "verification code issued");
        Ok(())
    }
}

pub struct AuthCodes {
    store: Arc<dyn AuthCodeStore>,
    sender: Arc<dyn CodeSender>,
    lifetime: Duration,
    max_attempts: u32,
}

impl AuthCodes {
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn AuthCodeStore>,
        sender: Arc<dyn CodeSender>,
    ) -> Self {
        Self {
            store,
            sender,
            lifetime: config.auth_code_lifetime,
            max_attempts: config.max_code_attempts,
        }
    }

    /// Generate a 6-digit code, replacing any pending one, and send it.
    pub async fn issue(&self, user: &UserRecord) -> AuthResult<()> {
        let code = rand::thread_rng().gen_range(100000..=999999u32).to_string();
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.lifetime)
                .map_err(|e| AuthError::Internal(format!("code lifetime: {e}")))?;

        self.store.replace_code(user.id, &code, expires_at).await?;
        self.sender.send(&user.phone_number, &code).await
    }

    /// Accept `code` once. Every failed comparison counts as an attempt.
    pub async fn check(&self, user: &UserRecord, code: &str) -> AuthResult<()> {
        let record = self
            .store
            .find_code(user.id)
            .await?
            .ok_or(AuthError::InvalidAuthCode)?;

        if record.expires_at <= Utc::now() {
            self.store.delete_code(user.id).await?;
            return Err(AuthError::InvalidAuthCode);
        }
        if record.attempts >= self.max_attempts {
            tracing::warn!(user_id = %user.id, "verification code attempts exhausted");
            return Err(AuthError::InvalidAuthCode);
        }

        self.store.increment_code_attempts(user.id).await?;
        if code.is_empty() || record.code != code {
            return Err(AuthError::InvalidAuthCode);
        }
        // a concurrent check may have used it first
        if !self.store.delete_code(user.id).await? {
            return Err(AuthError::InvalidAuthCode);
        }
        Ok(())
    }
}
