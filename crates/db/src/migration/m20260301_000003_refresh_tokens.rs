//! Refresh token families.
//!
//! Looked up before any tenant is known, so this table is not tenant-scoped.
//! Only hashes are stored.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS refresh_tokens CASCADE;")
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = r"
CREATE TABLE refresh_tokens (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    family_id UUID NOT NULL,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    tenant_id UUID NOT NULL REFERENCES tenants(id),
    token_hash CHAR(64) NOT NULL UNIQUE,
    role user_role NOT NULL,
    email VARCHAR(320) NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL,
    rotated_at TIMESTAMPTZ,
    replaced_by UUID REFERENCES refresh_tokens(id),
    revoked_at TIMESTAMPTZ,
    revoke_reason VARCHAR(64),
    user_agent TEXT,
    ip_address VARCHAR(45),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_refresh_expires_future CHECK (expires_at > created_at)
);

CREATE INDEX idx_refresh_tokens_family ON refresh_tokens(family_id);
CREATE INDEX idx_refresh_tokens_user_live
    ON refresh_tokens(tenant_id, user_id) WHERE revoked_at IS NULL;

GRANT SELECT, INSERT, UPDATE ON refresh_tokens TO ragvault_app;
";
