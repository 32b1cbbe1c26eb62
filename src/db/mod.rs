//! Storage seams consumed by the auth core.
//!
//! Implementations: [`postgres`] for deployments and [`memory`] for local
//! development and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::user::{Invitation, UserRecord};

pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted half of an action token.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    pub id: Uuid,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_phone_number(&self, phone_number: &str) -> StoreResult<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>>;

    /// Atomically add one failed attempt, setting `lock_until` when given.
    async fn increment_login_attempts(
        &self,
        id: Uuid,
        lock_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Set the counter to 1 and replace the lock (expired lock path).
    async fn restart_login_attempts(
        &self,
        id: Uuid,
        lock_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Set the counter to 0 and clear the lock.
    async fn reset_login_attempts(&self, id: Uuid) -> StoreResult<()>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()>;

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn create(&self, hash: &str, expires_at: DateTime<Utc>) -> StoreResult<Uuid>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<TokenRecord>>;

    /// Returns whether a record was deleted. Two concurrent deletes of the
    /// same id never both return `true`.
    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool>;
}

/// Pending verification code of a user.
#[derive(Debug, Clone)]
pub struct AuthCodeRecord {
    pub code: String,
    pub attempts: u32,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuthCodeStore: Send + Sync {
    /// Store `code` as the user's only pending code, resetting attempts.
    async fn replace_code(
        &self,
        user_id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn find_code(&self, user_id: Uuid) -> StoreResult<Option<AuthCodeRecord>>;

    async fn increment_code_attempts(&self, user_id: Uuid) -> StoreResult<()>;

    /// Returns whether a pending code was deleted.
    async fn delete_code(&self, user_id: Uuid) -> StoreResult<bool>;
}

/// Invitations embedded under their sender.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn find_embedded(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Invitation>>;

    /// Returns whether an invitation was removed.
    async fn remove_embedded(&self, owner: Uuid, id: Uuid) -> StoreResult<bool>;

    /// Insert or replace by id.
    async fn save(&self, owner: Uuid, invitation: &Invitation) -> StoreResult<()>;

    async fn list(&self, owner: Uuid) -> StoreResult<Vec<Invitation>>;
}

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the migrations embedded in ./migrations/
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
