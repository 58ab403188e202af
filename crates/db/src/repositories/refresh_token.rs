//! Refresh token persistence on PostgreSQL.
//!
//! Rotation is a compare-and-set on the presented row: the `UPDATE` only
//! matches while the token is unrotated, unrevoked and unexpired, so of two
//! concurrent rotations exactly one sees a row affected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragvault_core::auth::store::{
    ClientInfo, NewRefreshToken, RefreshTokenRecord, Replacement, RotateOutcome,
};
use ragvault_core::auth::{RefreshTokenStore, StoreError};
use ragvault_shared::types::{SessionFamilyId, TenantId, UserId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::refresh_tokens;
use crate::entities::sea_orm_active_enums::UserRole;

/// Refresh token repository on the pool (not tenant-bound).
#[derive(Debug, Clone)]
pub struct RefreshTokenRepository {
    db: DatabaseConnection,
}

impl RefreshTokenRepository {
    /// Creates a new refresh token repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists every token of a family, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn family(&self, family_id: SessionFamilyId) -> Result<Vec<RefreshTokenRecord>, DbErr> {
        let rows = refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::FamilyId.eq(family_id.into_inner()))
            .order_by_asc(refresh_tokens::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(to_record).collect())
    }
}

fn to_record(model: refresh_tokens::Model) -> RefreshTokenRecord {
    RefreshTokenRecord {
        id: model.id,
        family_id: SessionFamilyId::from_uuid(model.family_id),
        user_id: UserId::from_uuid(model.user_id),
        tenant_id: TenantId::from_uuid(model.tenant_id),
        token_hash: model.token_hash,
        role: model.role.into(),
        email: model.email,
        expires_at: model.expires_at.with_timezone(&Utc),
        rotated_at: model.rotated_at.map(|t| t.with_timezone(&Utc)),
        replaced_by: model.replaced_by,
        revoked_at: model.revoked_at.map(|t| t.with_timezone(&Utc)),
    }
}

fn new_row(token: NewRefreshToken, now: DateTime<Utc>) -> refresh_tokens::ActiveModel {
    let ClientInfo {
        user_agent,
        ip_address,
    } = token.client;
    refresh_tokens::ActiveModel {
        id: Set(Uuid::now_v7()),
        family_id: Set(token.family_id.into_inner()),
        user_id: Set(token.user_id.into_inner()),
        tenant_id: Set(token.tenant_id.into_inner()),
        token_hash: Set(token.token_hash),
        role: Set(UserRole::from(token.role)),
        email: Set(token.email),
        expires_at: Set(token.expires_at.into()),
        rotated_at: Set(None),
        replaced_by: Set(None),
        revoked_at: Set(None),
        revoke_reason: Set(None),
        user_agent: Set(user_agent),
        ip_address: Set(ip_address),
        created_at: Set(now.into()),
    }
}

async fn find_by_hash<C: ConnectionTrait>(conn: &C, token_hash: &str) -> Result<Option<refresh_tokens::Model>, DbErr> {
    refresh_tokens::Entity::find()
        .filter(refresh_tokens::Column::TokenHash.eq(token_hash))
        .one(conn)
        .await
}

async fn rotate_in<C: ConnectionTrait>(
    txn: &C,
    presented_hash: &str,
    replacement: Replacement,
) -> Result<RotateOutcome, DbErr> {
    let now = Utc::now();
    let Some(previous) = find_by_hash(txn, presented_hash).await? else {
        return Ok(RotateOutcome::NotFound);
    };
    if let Some(outcome) = RotateOutcome::classify_unrotatable(to_record(previous.clone()), now) {
        return Ok(outcome);
    }

    let claimed = refresh_tokens::Entity::update_many()
        .col_expr(refresh_tokens::Column::RotatedAt, Expr::value(now))
        .filter(refresh_tokens::Column::Id.eq(previous.id))
        .filter(refresh_tokens::Column::RotatedAt.is_null())
        .filter(refresh_tokens::Column::RevokedAt.is_null())
        .filter(refresh_tokens::Column::ExpiresAt.gt(now))
        .exec(txn)
        .await?;
    if claimed.rows_affected == 0 {
        // Lost the race: whoever won has committed by now.
        debug!(token_id = %previous.id, "rotation lost compare-and-set");
        let latest = refresh_tokens::Entity::find_by_id(previous.id)
            .one(txn)
            .await?
            .unwrap_or(previous);
        let record = to_record(latest);
        return Ok(RotateOutcome::classify_unrotatable(record.clone(), now)
            .unwrap_or(RotateOutcome::Reused(record)));
    }

    let successor = new_row(
        NewRefreshToken {
            family_id: SessionFamilyId::from_uuid(previous.family_id),
            user_id: UserId::from_uuid(previous.user_id),
            tenant_id: TenantId::from_uuid(previous.tenant_id),
            token_hash: replacement.token_hash,
            role: previous.role.into(),
            email: previous.email.clone(),
            expires_at: replacement.expires_at,
            client: replacement.client,
        },
        now,
    )
    .insert(txn)
    .await?;

    refresh_tokens::Entity::update_many()
        .col_expr(refresh_tokens::Column::ReplacedBy, Expr::value(successor.id))
        .filter(refresh_tokens::Column::Id.eq(previous.id))
        .exec(txn)
        .await?;

    let mut previous = to_record(previous);
    previous.rotated_at = Some(now);
    previous.replaced_by = Some(successor.id);
    Ok(RotateOutcome::Rotated {
        previous,
        current: to_record(successor),
    })
}

#[async_trait]
impl RefreshTokenStore for RefreshTokenRepository {
    async fn insert(&self, token: NewRefreshToken) -> Result<RefreshTokenRecord, StoreError> {
        let model = new_row(token, Utc::now())
            .insert(&self.db)
            .await
            .map_err(StoreError::from_display)?;
        Ok(to_record(model))
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, StoreError> {
        find_by_hash(&self.db, token_hash)
            .await
            .map(|m| m.map(to_record))
            .map_err(StoreError::from_display)
    }

    async fn rotate(&self, presented_hash: &str, replacement: Replacement) -> Result<RotateOutcome, StoreError> {
        let txn = self.db.begin().await.map_err(StoreError::from_display)?;
        let outcome = rotate_in(&txn, presented_hash, replacement)
            .await
            .map_err(StoreError::from_display)?;
        txn.commit().await.map_err(StoreError::from_display)?;
        Ok(outcome)
    }

    async fn revoke_family(&self, family_id: SessionFamilyId, reason: &str) -> Result<u64, StoreError> {
        let result = refresh_tokens::Entity::update_many()
            .col_expr(refresh_tokens::Column::RevokedAt, Expr::value(Utc::now()))
            .col_expr(refresh_tokens::Column::RevokeReason, Expr::value(reason))
            .filter(refresh_tokens::Column::FamilyId.eq(family_id.into_inner()))
            .filter(refresh_tokens::Column::RevokedAt.is_null())
            .exec(&self.db)
            .await
            .map_err(StoreError::from_display)?;
        Ok(result.rows_affected)
    }

    async fn revoke_all_for_user(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        reason: &str,
    ) -> Result<u64, StoreError> {
        let result = refresh_tokens::Entity::update_many()
            .col_expr(refresh_tokens::Column::RevokedAt, Expr::value(Utc::now()))
            .col_expr(refresh_tokens::Column::RevokeReason, Expr::value(reason))
            .filter(refresh_tokens::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(refresh_tokens::Column::UserId.eq(user_id.into_inner()))
            .filter(refresh_tokens::Column::RevokedAt.is_null())
            .exec(&self.db)
            .await
            .map_err(StoreError::from_display)?;
        Ok(result.rows_affected)
    }
}
