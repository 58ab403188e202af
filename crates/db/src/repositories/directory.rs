//! [`UserDirectory`] over PostgreSQL.
//!
//! Tenant lookup reads the unscoped `tenants` table; user lookups open a
//! short tenant-bound transaction, so login obeys the same isolation
//! policies as every other request.

use async_trait::async_trait;
use ragvault_core::auth::store::DirectoryUser;
use ragvault_core::auth::{StoreError, UserDirectory};
use ragvault_shared::types::{TenantId, UserId};
use sea_orm::DatabaseConnection;

use super::tenant::TenantRepository;
use super::user::UserRepository;
use crate::entities::users;
use crate::rls::TenantConnection;

/// Login-time tenant and user lookups.
#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    db: DatabaseConnection,
}

impl PgUserDirectory {
    /// Creates the directory.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_directory_user(model: users::Model) -> DirectoryUser {
    DirectoryUser {
        id: UserId::from_uuid(model.id),
        tenant_id: TenantId::from_uuid(model.tenant_id),
        email: model.email,
        password_hash: model.password_hash,
        role: model.role.into(),
        is_active: model.is_active,
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_tenant_by_slug(&self, slug: &str) -> Result<Option<TenantId>, StoreError> {
        TenantRepository::new(self.db.clone())
            .find_active_by_slug(slug.trim())
            .await
            .map(|t| t.map(|t| TenantId::from_uuid(t.id)))
            .map_err(StoreError::from_display)
    }

    async fn find_user_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> Result<Option<DirectoryUser>, StoreError> {
        let conn = TenantConnection::new(&self.db, tenant_id)
            .await
            .map_err(StoreError::from_display)?;
        let user = UserRepository::new(&conn)
            .find_by_email(email)
            .await
            .map_err(StoreError::from_display)?;
        conn.commit().await.map_err(StoreError::from_display)?;
        Ok(user.map(to_directory_user))
    }

    async fn find_user(&self, tenant_id: TenantId, user_id: UserId) -> Result<Option<DirectoryUser>, StoreError> {
        let conn = TenantConnection::new(&self.db, tenant_id)
            .await
            .map_err(StoreError::from_display)?;
        let user = UserRepository::new(&conn)
            .find_by_id(user_id)
            .await
            .map_err(StoreError::from_display)?;
        conn.commit().await.map_err(StoreError::from_display)?;
        Ok(user.map(to_directory_user))
    }
}
