//! In-process implementations of the session stores.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use ragvault_shared::types::{SessionFamilyId, TenantId, UserId};
use uuid::Uuid;

use super::store::{
    DirectoryUser, NewRefreshToken, RefreshTokenRecord, RefreshTokenStore, Replacement,
    RotateOutcome, StoreError, UserDirectory,
};

/// Refresh tokens held in a mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    rows: Mutex<HashMap<Uuid, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of a family.
    #[must_use]
    pub fn family(&self, family_id: SessionFamilyId) -> Vec<RefreshTokenRecord> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| r.family_id == family_id)
            .cloned()
            .collect()
    }

    /// Number of rows not rotated, revoked, or expired.
    #[must_use]
    pub fn live_count(&self) -> usize {
        let now = Utc::now();
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| r.rotated_at.is_none() && r.revoked_at.is_none() && r.expires_at > now)
            .count()
    }
}

fn record_from(token: NewRefreshToken) -> RefreshTokenRecord {
    RefreshTokenRecord {
        id: Uuid::now_v7(),
        family_id: token.family_id,
        user_id: token.user_id,
        tenant_id: token.tenant_id,
        token_hash: token.token_hash,
        role: token.role,
        email: token.email,
        expires_at: token.expires_at,
        rotated_at: None,
        replaced_by: None,
        revoked_at: None,
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        if rows.values().any(|r| r.token_hash == token.token_hash) {
            return Err(StoreError("duplicate token hash".into()));
        }
        let record = record_from(token);
        rows.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.values().find(|r| r.token_hash == token_hash).cloned())
    }

    async fn rotate(&self, presented_hash: &str, replacement: Replacement) -> Result<RotateOutcome, StoreError> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(previous) = rows.values().find(|r| r.token_hash == presented_hash).cloned() else {
            return Ok(RotateOutcome::NotFound);
        };
        if let Some(outcome) = RotateOutcome::classify_unrotatable(previous.clone(), now) {
            return Ok(outcome);
        }

        let current = record_from(NewRefreshToken {
            family_id: previous.family_id,
            user_id: previous.user_id,
            tenant_id: previous.tenant_id,
            token_hash: replacement.token_hash,
            role: previous.role,
            email: previous.email.clone(),
            expires_at: replacement.expires_at,
            client: replacement.client,
        });
        let mut previous = previous;
        previous.rotated_at = Some(now);
        previous.replaced_by = Some(current.id);
        rows.insert(previous.id, previous.clone());
        rows.insert(current.id, current.clone());
        Ok(RotateOutcome::Rotated { previous, current })
    }

    async fn revoke_family(&self, family_id: SessionFamilyId, _reason: &str) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut revoked = 0;
        for row in rows.values_mut().filter(|r| r.family_id == family_id && r.revoked_at.is_none()) {
            row.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }

    async fn revoke_all_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        _reason: &str,
    ) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let mut revoked = 0;
        for row in rows
            .values_mut()
            .filter(|r| r.tenant_id == tenant_id && r.user_id == user_id && r.revoked_at.is_none())
        {
            row.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }
}

/// Tenants and users held in memory.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    tenants: Mutex<HashMap<String, TenantId>>,
    users: Mutex<Vec<DirectoryUser>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an active tenant.
    pub fn add_tenant(&self, slug: &str, tenant_id: TenantId) {
        self.tenants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slug.to_string(), tenant_id);
    }

    /// Registers a user, replacing any user with the same id.
    pub fn upsert_user(&self, user: DirectoryUser) {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users.retain(|u| u.id != user.id);
        users.push(user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<TenantId>, StoreError> {
        Ok(self
            .tenants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(slug)
            .copied())
    }

    async fn find_user_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> Result<Option<DirectoryUser>, StoreError> {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(users
            .iter()
            .find(|u| u.tenant_id == tenant_id && u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user(&self, tenant_id: TenantId, user_id: UserId) -> Result<Option<DirectoryUser>, StoreError> {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(users
            .iter()
            .find(|u| u.tenant_id == tenant_id && u.id == user_id)
            .cloned())
    }
}
