//! Tenant provisioning. Runs on the admin connection.

use chrono::Utc;
use ragvault_core::storage::tenant_prefix;
use ragvault_shared::AppError;
use ragvault_shared::types::TenantId;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use thiserror::Error;
use tracing::info;

use crate::entities::sea_orm_active_enums::PlanTier;
use crate::entities::tenants;
use crate::error::is_unique_violation;

const MAX_SLUG_LEN: usize = 63;

/// Tenant errors.
#[derive(Debug, Error)]
pub enum TenantError {
    /// Slug does not match `^[a-z0-9][a-z0-9-]*$` or is too long.
    #[error("invalid tenant slug: {0}")]
    InvalidSlug(String),

    /// Slug already taken.
    #[error("tenant slug already exists: {0}")]
    SlugTaken(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl From<TenantError> for AppError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::InvalidSlug(_) => Self::Validation(err.to_string()),
            TenantError::SlugTaken(_) => Self::Conflict(err.to_string()),
            TenantError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

/// Input for creating a tenant.
#[derive(Debug, Clone)]
pub struct NewTenant {
    /// URL-safe unique handle used at login.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// Plan.
    pub plan: PlanTier,
}

/// Checks a tenant slug.
///
/// # Errors
///
/// Returns [`TenantError::InvalidSlug`] when the slug is empty, too long,
/// starts with `-` or contains anything but `[a-z0-9-]`.
pub fn validate_slug(slug: &str) -> Result<(), TenantError> {
    let valid = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('-')
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(TenantError::InvalidSlug(slug.to_string()))
    }
}

/// Tenant repository.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    db: DatabaseConnection,
}

impl TenantRepository {
    /// Creates a new tenant repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a tenant. The storage prefix is derived from the new id.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid or taken slug, or a database failure.
    pub async fn create(&self, input: NewTenant) -> Result<tenants::Model, TenantError> {
        validate_slug(&input.slug)?;
        let id = TenantId::new();
        let now = Utc::now().into();
        let tenant = tenants::ActiveModel {
            id: Set(id.into_inner()),
            slug: Set(input.slug.clone()),
            name: Set(input.name),
            plan: Set(input.plan),
            is_active: Set(true),
            storage_prefix: Set(tenant_prefix(id)),
            kms_key_ref: Set(None),
            iam_role_ref: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = tenant.insert(&self.db).await.map_err(|e| {
            if is_unique_violation(&e) {
                TenantError::SlugTaken(input.slug.clone())
            } else {
                TenantError::Database(e)
            }
        })?;
        info!(tenant_id = %model.id, slug = %model.slug, "tenant created");
        Ok(model)
    }

    /// Finds a tenant by slug, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<tenants::Model>, DbErr> {
        tenants::Entity::find()
            .filter(tenants::Column::Slug.eq(slug))
            .one(&self.db)
            .await
    }

    /// Finds an active tenant by slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_active_by_slug(&self, slug: &str) -> Result<Option<tenants::Model>, DbErr> {
        tenants::Entity::find()
            .filter(tenants::Column::Slug.eq(slug))
            .filter(tenants::Column::IsActive.eq(true))
            .one(&self.db)
            .await
    }

    /// Finds a tenant by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: TenantId) -> Result<Option<tenants::Model>, DbErr> {
        tenants::Entity::find_by_id(id.into_inner()).one(&self.db).await
    }

    /// Deactivates a tenant. Returns false if it was unknown or already inactive.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn deactivate(&self, id: TenantId) -> Result<bool, DbErr> {
        let result = tenants::Entity::update_many()
            .col_expr(tenants::Column::IsActive, Expr::value(false))
            .col_expr(tenants::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(tenants::Column::Id.eq(id.into_inner()))
            .filter(tenants::Column::IsActive.eq(true))
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            info!(tenant_id = %id, "tenant deactivated");
        }
        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("acme")]
    #[case("acme-corp")]
    #[case("a1")]
    #[case("0day")]
    fn test_valid_slugs(#[case] slug: &str) {
        assert!(validate_slug(slug).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("-acme")]
    #[case("Acme")]
    #[case("acme corp")]
    #[case("acme_corp")]
    #[case("acmé")]
    fn test_invalid_slugs(#[case] slug: &str) {
        assert!(matches!(validate_slug(slug), Err(TenantError::InvalidSlug(_))));
    }

    #[test]
    fn test_slug_length_cap() {
        assert!(validate_slug(&"a".repeat(MAX_SLUG_LEN)).is_ok());
        assert!(validate_slug(&"a".repeat(MAX_SLUG_LEN + 1)).is_err());
    }

    #[test]
    fn test_errors_map_to_api_errors() {
        let app: AppError = TenantError::SlugTaken("acme".into()).into();
        assert_eq!(app.status_code(), 409);
        let app: AppError = TenantError::InvalidSlug("A".into()).into();
        assert_eq!(app.status_code(), 400);
    }
}
