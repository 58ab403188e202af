//! Row-level security: tenant isolation policies, the application role and
//! the append-only guard on `audit_logs`.
//!
//! Policies are both enabled and forced, so the table owner is subject to
//! them as well. The application role owns nothing and cannot alter them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// Tables carrying a `tenant_id` column and a `tenant_isolation` policy.
const TENANT_TABLES: [&str; 7] = [
    "users",
    "api_keys",
    "external_identities",
    "identity_provider_configs",
    "documents",
    "chunks",
    "audit_logs",
];

/// Tables the application role may read and write freely.
const MUTABLE_TENANT_TABLES: &str =
    "users, api_keys, external_identities, identity_provider_configs, documents, chunks";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(FUNCTIONS_SQL).await?;
        for table in TENANT_TABLES {
            db.execute_unprepared(&policy_sql(table)).await?;
        }
        db.execute_unprepared(&grants_sql()).await?;
        db.execute_unprepared(AUDIT_GUARD_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_AUDIT_GUARD_SQL).await?;
        for table in TENANT_TABLES {
            db.execute_unprepared(&drop_policy_sql(table)).await?;
        }
        db.execute_unprepared(&revoke_sql()).await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS current_tenant_id();")
            .await?;
        Ok(())
    }
}

const FUNCTIONS_SQL: &str = r"
-- Missing or empty setting yields NULL, which matches no row.
CREATE OR REPLACE FUNCTION current_tenant_id() RETURNS uuid
    LANGUAGE sql STABLE
AS $$
    SELECT NULLIF(current_setting('app.current_tenant_id', true), '')::uuid
$$;

DO $$
BEGIN
    IF NOT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = 'ragvault_app') THEN
        CREATE ROLE ragvault_app NOLOGIN;
    END IF;
END
$$;
";

fn policy_sql(table: &str) -> String {
    format!(
        "ALTER TABLE {table} ENABLE ROW LEVEL SECURITY;
ALTER TABLE {table} FORCE ROW LEVEL SECURITY;
CREATE POLICY tenant_isolation ON {table}
    USING (tenant_id = current_tenant_id())
    WITH CHECK (tenant_id = current_tenant_id());"
    )
}

fn drop_policy_sql(table: &str) -> String {
    format!(
        "DROP POLICY IF EXISTS tenant_isolation ON {table};
ALTER TABLE {table} NO FORCE ROW LEVEL SECURITY;
ALTER TABLE {table} DISABLE ROW LEVEL SECURITY;"
    )
}

fn grants_sql() -> String {
    format!(
        "GRANT USAGE ON SCHEMA public TO ragvault_app;
GRANT SELECT ON tenants TO ragvault_app;
GRANT SELECT, INSERT, UPDATE, DELETE ON {MUTABLE_TENANT_TABLES} TO ragvault_app;
GRANT SELECT, INSERT ON audit_logs TO ragvault_app;
GRANT EXECUTE ON FUNCTION current_tenant_id() TO ragvault_app;"
    )
}

fn revoke_sql() -> String {
    format!(
        "REVOKE ALL ON tenants, audit_logs, {MUTABLE_TENANT_TABLES} FROM ragvault_app;
REVOKE EXECUTE ON FUNCTION current_tenant_id() FROM ragvault_app;"
    )
}

const AUDIT_GUARD_SQL: &str = r"
CREATE OR REPLACE FUNCTION audit_logs_append_only() RETURNS trigger
    LANGUAGE plpgsql
AS $$
BEGIN
    RAISE EXCEPTION 'audit_logs is append-only' USING ERRCODE = '42501';
END
$$;

CREATE TRIGGER audit_logs_append_only
    BEFORE UPDATE OR DELETE OR TRUNCATE ON audit_logs
    FOR EACH STATEMENT EXECUTE FUNCTION audit_logs_append_only();
";

const DROP_AUDIT_GUARD_SQL: &str = r"
DROP TRIGGER IF EXISTS audit_logs_append_only ON audit_logs;
DROP FUNCTION IF EXISTS audit_logs_append_only();
";
