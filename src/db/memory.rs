use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AuthCodeRecord, AuthCodeStore, InvitationStore, StoreResult, TokenRecord, TokenStore,
    UserStore,
};
use crate::models::user::{Invitation, UserRecord};

/// Process-local implementation of every store. Each write holds the map's
/// lock for the whole read-modify-write, which stands in for the atomic
/// single-statement updates of the Postgres store.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, UserRecord>>,
    tokens: RwLock<HashMap<Uuid, TokenRecord>>,
    invitations: RwLock<HashMap<Uuid, Vec<Invitation>>>,
    codes: RwLock<HashMap<Uuid, AuthCodeRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: UserRecord) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn token_count(&self) -> usize {
        self.tokens.read().await.len()
    }

    async fn update_user<F>(&self, id: Uuid, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut UserRecord) + Send,
    {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            f(user);
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_phone_number(&self, phone_number: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.phone_number == phone_number)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn increment_login_attempts(
        &self,
        id: Uuid,
        lock_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        self.update_user(id, |u| {
            u.login_attempts = u.login_attempts.saturating_add(1);
            if lock_until.is_some() {
                u.lock_until = lock_until;
            }
        })
        .await
    }

    async fn restart_login_attempts(
        &self,
        id: Uuid,
        lock_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        self.update_user(id, |u| {
            u.login_attempts = 1;
            u.lock_until = lock_until;
        })
        .await
    }

    async fn reset_login_attempts(&self, id: Uuid) -> StoreResult<()> {
        self.update_user(id, |u| {
            u.login_attempts = 0;
            u.lock_until = None;
        })
        .await
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> StoreResult<()> {
        let password_hash = password_hash.to_owned();
        self.update_user(id, move |u| u.password_hash = password_hash)
            .await
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        self.update_user(id, |u| u.last_login = Some(at)).await
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn create(&self, hash: &str, expires_at: DateTime<Utc>) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.tokens.write().await.insert(
            id,
            TokenRecord {
                id,
                hash: hash.to_owned(),
                expires_at,
            },
        );
        Ok(id)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<TokenRecord>> {
        Ok(self.tokens.read().await.get(&id).cloned())
    }

    async fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tokens.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl AuthCodeStore for MemoryStore {
    async fn replace_code(
        &self,
        user_id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.codes.write().await.insert(
            user_id,
            AuthCodeRecord {
                code: code.to_owned(),
                attempts: 0,
                expires_at,
            },
        );
        Ok(())
    }

    async fn find_code(&self, user_id: Uuid) -> StoreResult<Option<AuthCodeRecord>> {
        Ok(self.codes.read().await.get(&user_id).cloned())
    }

    async fn increment_code_attempts(&self, user_id: Uuid) -> StoreResult<()> {
        if let Some(record) = self.codes.write().await.get_mut(&user_id) {
            record.attempts = record.attempts.saturating_add(1);
        }
        Ok(())
    }

    async fn delete_code(&self, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.codes.write().await.remove(&user_id).is_some())
    }
}

#[async_trait]
impl InvitationStore for MemoryStore {
    async fn find_embedded(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Invitation>> {
        Ok(self
            .invitations
            .read()
            .await
            .get(&owner)
            .and_then(|list| list.iter().find(|i| i.id == id).cloned()))
    }

    async fn remove_embedded(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut map = self.invitations.write().await;
        let Some(list) = map.get_mut(&owner) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|i| i.id != id);
        Ok(list.len() < before)
    }

    async fn save(&self, owner: Uuid, invitation: &Invitation) -> StoreResult<()> {
        let mut map = self.invitations.write().await;
        let list = map.entry(owner).or_default();
        match list.iter_mut().find(|i| i.id == invitation.id) {
            Some(existing) => *existing = invitation.clone(),
            None => list.push(invitation.clone()),
        }
        Ok(())
    }

    async fn list(&self, owner: Uuid) -> StoreResult<Vec<Invitation>> {
        Ok(self
            .invitations
            .read()
            .await
            .get(&owner)
            .cloned()
            .unwrap_or_default())
    }
}
