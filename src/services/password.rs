//! bcrypt hashing for passwords and action token strings, run on the
//! blocking pool so request tasks never stall on key derivation.

use crate::error::{AuthError, AuthResult};

pub async fn hash(value: &str, cost: u32) -> AuthResult<String> {
    let value = value.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(value, cost))
        .await
        .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
}

/// Compare `value` against a stored bcrypt hash. A malformed hash is an error,
/// not a mismatch.
pub async fn verify(value: &str, hash: &str) -> AuthResult<bool> {
    let value = value.to_owned();
    let hash = hash.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::verify(value, &hash))
        .await
        .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
}
