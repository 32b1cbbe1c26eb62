use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    AuthCodeRecord, AuthCodeStore, InvitationStore, StoreResult, TokenRecord, TokenStore,
    UserStore,
};
use crate::error::StoreError;
use crate::models::user::{Invitation, Role, UserRecord};

/// DB row; roles are kept as TEXT[] and parsed on the way out.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    phone_number: String,
    email: Option<String>,
    password_hash: String,
    roles: Vec<String>,
    confirmed: bool,
    login_attempts: i32,
    lock_until: Option<DateTime<Utc>>,
    last_login: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let roles = row
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Backend)?;
        Ok(Self {
            id: row.id,
            phone_number: row.phone_number,
            email: row.email,
            password_hash: row.password_hash,
            roles,
            confirmed: row.confirmed,
            login_attempts: row.login_attempts.max(0) as u32,
            lock_until: row.lock_until,
            last_login: row.last_login,
        })
    }
}

const USER_COLUMNS: &str = "id, phone_number, email, password_hash, roles, confirmed,
    login_attempts, lock_until, last_login";

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_phone_number(&self, phone_number: &str) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone_number = $1"
        ))
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserRecord::try_from).transpose()
    }

    async fn increment_login_attempts(
        &self,
        id: Uuid,
        lock_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE users SET login_attempts = login_attempts + 1,
                lock_until = COALESCE($2, lock_until)
             WHERE id = $1",
        )
        .bind(id)
        .bind(lock_until)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn restart_login_attempts(
        &self,
        id: Uuid,
        lock_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE users SET login_attempts = 1, lock_until = $2 WHERE id = $1")
            .bind(id)
            .bind(lock_until)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_login_attempts(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE users SET login_attempts = 0, lock_until = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn create(&self, hash: &str, expires_at: DateTime<Utc>) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO action_tokens (id, hash, expires_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(hash)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<TokenRecord>> {
        let row: Option<(Uuid, String, DateTime<Utc>)> =
            sqlx::query_as("SELECT id, hash, expires_at FROM action_tokens WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, hash, expires_at)| TokenRecord {
            id,
            hash,
            expires_at,
        }))
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM action_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Clone)]
pub struct PgAuthCodeStore {
    pool: PgPool,
}

impl PgAuthCodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthCodeStore for PgAuthCodeStore {
    async fn replace_code(
        &self,
        user_id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO auth_codes (user_id, code, attempts, expires_at)
             VALUES ($1, $2, 0, $3)
             ON CONFLICT (user_id) DO UPDATE SET
                code = EXCLUDED.code,
                attempts = 0,
                expires_at = EXCLUDED.expires_at,
                created_at = NOW()",
        )
        .bind(user_id)
        .bind(code)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_code(&self, user_id: Uuid) -> StoreResult<Option<AuthCodeRecord>> {
        let row: Option<(String, i16, DateTime<Utc>)> = sqlx::query_as(
            "SELECT code, attempts, expires_at FROM auth_codes WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(code, attempts, expires_at)| AuthCodeRecord {
            code,
            attempts: attempts.max(0) as u32,
            expires_at,
        }))
    }

    async fn increment_code_attempts(&self, user_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE auth_codes SET attempts = attempts + 1 WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_code(&self, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM auth_codes WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct InvitationRow {
    id: Uuid,
    owner_id: Uuid,
    phone_number: String,
    patient_id: Option<String>,
    resource_type: String,
    first_name: String,
    last_name: String,
    state: String,
    token_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = StoreError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            uid: row.owner_id,
            phone_number: row.phone_number,
            patient_id: row.patient_id,
            resource_type: row.resource_type.parse().map_err(StoreError::Backend)?,
            first_name: row.first_name,
            last_name: row.last_name,
            created_at: row.created_at,
            state: row.state.parse().map_err(StoreError::Backend)?,
            token_id: row.token_id,
        })
    }
}

const INVITATION_COLUMNS: &str = "id, owner_id, phone_number, patient_id, resource_type,
    first_name, last_name, state, token_id, created_at";

#[derive(Clone)]
pub struct PgInvitationStore {
    pool: PgPool,
}

impl PgInvitationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvitationStore for PgInvitationStore {
    async fn find_embedded(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Invitation>> {
        let row = sqlx::query_as::<_, InvitationRow>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations WHERE owner_id = $1 AND id = $2"
        ))
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Invitation::try_from).transpose()
    }

    async fn remove_embedded(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM invitations WHERE owner_id = $1 AND id = $2")
            .bind(owner)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn save(&self, owner: Uuid, invitation: &Invitation) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO invitations
                (id, owner_id, phone_number, patient_id, resource_type,
                 first_name, last_name, state, token_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (id) DO UPDATE SET
                phone_number = EXCLUDED.phone_number,
                patient_id = EXCLUDED.patient_id,
                resource_type = EXCLUDED.resource_type,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                state = EXCLUDED.state,
                token_id = EXCLUDED.token_id",
        )
        .bind(invitation.id)
        .bind(owner)
        .bind(&invitation.phone_number)
        .bind(&invitation.patient_id)
        .bind(invitation.resource_type.to_string())
        .bind(&invitation.first_name)
        .bind(&invitation.last_name)
        .bind(invitation.state.to_string())
        .bind(&invitation.token_id)
        .bind(invitation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, owner: Uuid) -> StoreResult<Vec<Invitation>> {
        let rows = sqlx::query_as::<_, InvitationRow>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations
             WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Invitation::try_from).collect()
    }
}
