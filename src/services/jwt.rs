//! JWT signing and verification against one shared secret.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AuthError, AuthResult};
use crate::models::auth::{TokenClaims, TokenPayload};

#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    pub expires_in: Option<Duration>,
    pub subject: Option<String>,
    pub audience: Option<String>,
    pub jwt_id: Option<String>,
}

impl SignOptions {
    pub fn expiring_in(expires_in: Duration) -> Self {
        Self {
            expires_in: Some(expires_in),
            ..Self::default()
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn jwt_id(mut self, jwt_id: impl Into<String>) -> Self {
        self.jwt_id = Some(jwt_id.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    pub subject: Option<String>,
    pub audience: Option<String>,
}

impl DecodeOptions {
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

#[derive(Clone)]
pub struct JwtSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign `payload`. Fails with `MissingExpiration` when no lifetime, or a
    /// zero lifetime, is given. Sub-second lifetimes round up to one second.
    pub fn sign<T: Serialize>(
        &self,
        payload: &TokenPayload<T>,
        options: &SignOptions,
    ) -> AuthResult<String> {
        let expires_in = options
            .expires_in
            .filter(|d| !d.is_zero())
            .ok_or(AuthError::MissingExpiration)?;
        let secs = expires_in.as_secs() + u64::from(expires_in.subsec_nanos() > 0);
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            data: &payload.data,
            action: payload.action,
            sub: options.subject.clone(),
            aud: options.audience.clone(),
            iat: now,
            exp: now + secs as i64,
            jti: options.jwt_id.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Same contract as [`sign`](Self::sign), run on the blocking pool.
    pub async fn sign_async<T>(
        &self,
        payload: TokenPayload<T>,
        options: SignOptions,
    ) -> AuthResult<String>
    where
        T: Serialize + Send + 'static,
    {
        if options.expires_in.map_or(true, |d| d.is_zero()) {
            return Err(AuthError::MissingExpiration);
        }
        let signer = self.clone();
        tokio::task::spawn_blocking(move || signer.sign(&payload, &options))
            .await
            .map_err(|e| AuthError::Internal(format!("signing task failed: {e}")))?
    }

    /// Verify signature, expiry and the requested audience/subject.
    pub fn decode<T: DeserializeOwned>(
        &self,
        token: &str,
        options: &DecodeOptions,
    ) -> AuthResult<TokenClaims<T>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        let mut required = vec!["exp"];
        match &options.audience {
            Some(aud) => {
                validation.set_audience(&[aud]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        if options.subject.is_some() {
            validation.sub = options.subject.clone();
            required.push("sub");
        }
        validation.set_required_spec_claims(&required[..]);

        decode::<TokenClaims<T>>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("jwt decode rejected: {e}");
                AuthError::InvalidAuthToken
            })
    }
}
