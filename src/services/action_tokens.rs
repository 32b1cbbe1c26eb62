//! One-time action tokens: a signed JWT paired with a persisted bcrypt hash
//! of the token's SHA-256 digest. Valid only while both halves check out, so
//! deleting the record revokes the token.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::TokenStore;
use crate::error::{AuthError, AuthResult, InvalidTokenCause};
use crate::models::auth::{TokenAction, TokenClaims, TokenData, TokenPayload};
use crate::services::jwt::{DecodeOptions, JwtSigner, SignOptions};
use crate::services::password;

pub struct ActionTokens {
    store: Arc<dyn TokenStore>,
    signer: JwtSigner,
    default_lifetime: Duration,
    bcrypt_cost: u32,
}

impl ActionTokens {
    pub fn new(
        store: Arc<dyn TokenStore>,
        signer: JwtSigner,
        default_lifetime: Duration,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            store,
            signer,
            default_lifetime,
            bcrypt_cost,
        }
    }

    /// Sign `{data, action}` and persist the token hash under a fresh id.
    /// `action` is carried in the payload only; it is not bound as `sub`.
    pub async fn generate<T: Serialize>(
        &self,
        data: &T,
        action: TokenAction,
        expires_in: Option<Duration>,
    ) -> AuthResult<TokenData> {
        let expires_in = expires_in.unwrap_or(self.default_lifetime);
        let payload = TokenPayload::with_action(data, action);
        let token = self
            .signer
            .sign(
                &payload,
                &SignOptions::expiring_in(expires_in).jwt_id(Uuid::new_v4().to_string()),
            )?;

        let expires_at = Utc::now()
            + chrono::Duration::from_std(expires_in)
                .map_err(|e| AuthError::Internal(format!("token lifetime: {e}")))?;
        let hash = password::hash(&digest(&token), self.bcrypt_cost).await?;
        let id = self.store.create(&hash, expires_at).await?;

        tracing::info!(token_id = %id, %action, "action token issued");
        Ok(TokenData {
            token,
            id: id.to_string(),
        })
    }

    /// Record existence, then hash match, then signature/expiry.
    pub async fn check<T: DeserializeOwned>(
        &self,
        token_data: &TokenData,
    ) -> AuthResult<TokenClaims<T>> {
        let record = match token_data.id.parse::<Uuid>() {
            Ok(id) => self.store.find_by_id(id).await?,
            Err(_) => None,
        };
        let record = record.ok_or_else(|| reject(InvalidTokenCause::RecordMissing))?;

        let matches = match password::verify(&digest(&token_data.token), &record.hash).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(token_id = %record.id, "token hash verify error: {e}");
                false
            }
        };
        if !matches {
            return Err(reject(InvalidTokenCause::HashMismatch));
        }

        self.signer
            .decode(&token_data.token, &DecodeOptions::default())
            .map_err(|_| reject(InvalidTokenCause::Signature))
    }

    /// Delete the persisted record. Absent records are not an error.
    pub async fn remove(&self, id: &str) -> AuthResult<()> {
        if let Ok(id) = id.parse::<Uuid>() {
            if self.store.delete_by_id(id).await? {
                tracing::info!(token_id = %id, "action token removed");
            }
        }
        Ok(())
    }

    /// Delete the record as the single use of a checked token. Only one of
    /// any number of concurrent callers succeeds.
    pub async fn consume(&self, id: &str) -> AuthResult<()> {
        let id = id
            .parse::<Uuid>()
            .map_err(|_| reject(InvalidTokenCause::RecordMissing))?;
        if !self.store.delete_by_id(id).await? {
            return Err(reject(InvalidTokenCause::RecordMissing));
        }
        tracing::info!(token_id = %id, "action token consumed");
        Ok(())
    }
}

/// bcrypt reads only the first 72 bytes of its input, and every JWT here
/// shares a long common prefix. Hashing the digest binds the whole token.
fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn reject(cause: InvalidTokenCause) -> AuthError {
    tracing::debug!(cause = cause.code(), "action token rejected");
    AuthError::InvalidToken(cause)
}
