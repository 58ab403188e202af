//! User repository for database operations.

use chrono::Utc;
use ragvault_shared::Role;
use ragvault_shared::types::UserId;
use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::sea_orm_active_enums::UserRole;
use crate::entities::users;
use crate::rls::TenantConnection;

/// Input for creating a user in the bound tenant.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Email; stored trimmed and lowercased.
    pub email: String,
    /// Argon2id PHC hash, `None` for federated users.
    pub password_hash: Option<String>,
    /// Display name.
    pub full_name: String,
    /// Role.
    pub role: Role,
}

/// Lowercases and trims an email for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// User repository, scoped to one tenant.
#[derive(Debug, Clone, Copy)]
pub struct UserRepository<'a> {
    conn: &'a TenantConnection,
}

impl<'a> UserRepository<'a> {
    /// Creates a repository over a tenant-bound connection.
    #[must_use]
    pub const fn new(conn: &'a TenantConnection) -> Self {
        Self { conn }
    }

    /// Finds a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(self.conn.transaction())
            .await
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id.into_inner())
            .one(self.conn.transaction())
            .await
    }

    /// Creates a user in the bound tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, input: NewUser) -> Result<users::Model, DbErr> {
        let now = Utc::now().into();
        let user = users::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(self.conn.tenant_id().into_inner()),
            email: Set(normalize_email(&input.email)),
            password_hash: Set(input.password_hash),
            full_name: Set(input.full_name),
            role: Set(UserRole::from(input.role)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        user.insert(self.conn.transaction()).await
    }

    /// Changes a user's role. Returns false when no visible user matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_role(&self, id: UserId, role: Role) -> Result<bool, DbErr> {
        let result = users::Entity::update_many()
            .col_expr(
                users::Column::Role,
                Expr::val(UserRole::from(role)).as_enum(Alias::new("user_role")),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id.into_inner()))
            .exec(self.conn.transaction())
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Enables or disables a user. Returns false when no visible user matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn set_active(&self, id: UserId, active: bool) -> Result<bool, DbErr> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::IsActive, Expr::value(active))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id.into_inner()))
            .exec(self.conn.transaction())
            .await?;
        Ok(result.rows_affected > 0)
    }
}
