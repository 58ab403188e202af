//! Integration tests for row-level security tenant isolation.
//!
//! Requires a running PostgreSQL with migrations applied; see `common`.

mod common;

use common::{admin_db, app_db, create_tenant, create_user};
use ragvault_core::document::{IntakeLimits, PreparedDocument, prepare_upload};
use ragvault_db::entities::{documents, users};
use ragvault_db::error::RlsError;
use ragvault_db::repositories::{AuditLogRepository, DocumentRepository, NewAuditEntry};
use ragvault_db::rls::{TenantConnection, current_tenant_setting};
use ragvault_shared::Role;
use ragvault_shared::types::{DocumentId, PageRequest, TenantId};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbBackend, EntityTrait, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

fn prepared(tenant_id: TenantId, body: &str) -> PreparedDocument {
    prepare_upload(
        IntakeLimits::default(),
        tenant_id,
        "notes.txt",
        "Notes",
        None,
        body.as_bytes(),
    )
    .expect("valid upload")
}

async fn seed_document(admin: &sea_orm::DatabaseConnection, tenant_id: TenantId, body: &str) -> DocumentId {
    let conn = TenantConnection::new(admin, tenant_id).await.expect("bind");
    let doc = DocumentRepository::new(&conn)
        .insert(&prepared(tenant_id, body), None)
        .await
        .expect("insert document");
    conn.commit().await.expect("commit");
    DocumentId::from_uuid(doc.id)
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_tenant_sees_only_its_own_documents() {
    let admin = admin_db().await;
    let tenant_a = create_tenant(&admin, "iso-a").await;
    let tenant_b = create_tenant(&admin, "iso-b").await;
    let doc_a = seed_document(&admin, tenant_a, &format!("a {}", Uuid::new_v4())).await;
    let doc_b = seed_document(&admin, tenant_b, &format!("b {}", Uuid::new_v4())).await;

    let db = app_db(4).await;

    let conn = TenantConnection::new(&db, tenant_a).await.expect("bind a");
    let repo = DocumentRepository::new(&conn);
    let (rows, total) = repo.list(PageRequest::default()).await.expect("list");
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, doc_a.into_inner());
    assert!(rows.iter().all(|d| d.tenant_id == tenant_a.into_inner()));

    // Another tenant's row is invisible, not forbidden.
    let foreign = repo.find_by_id(doc_b).await.expect("query succeeds");
    assert!(foreign.is_none());
    conn.rollback().await.expect("rollback");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_unbound_connection_sees_nothing() {
    let admin = admin_db().await;
    let tenant = create_tenant(&admin, "unbound").await;
    seed_document(&admin, tenant, &format!("u {}", Uuid::new_v4())).await;

    let db = app_db(2).await;
    let rows = documents::Entity::find().all(&db).await.expect("query succeeds");
    assert!(rows.is_empty(), "missing binding must fail closed");

    let rows = users::Entity::find().all(&db).await.expect("query succeeds");
    assert!(rows.is_empty());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_cross_tenant_writes_are_refused_or_affect_nothing() {
    let admin = admin_db().await;
    let tenant_a = create_tenant(&admin, "write-a").await;
    let tenant_b = create_tenant(&admin, "write-b").await;
    let doc_b = seed_document(&admin, tenant_b, &format!("wb {}", Uuid::new_v4())).await;

    let db = app_db(2).await;

    // Updating B's document while bound to A affects zero rows.
    let conn = TenantConnection::new(&db, tenant_a).await.expect("bind a");
    let err = DocumentRepository::new(&conn)
        .update_status(doc_b, ragvault_core::document::DocumentStatus::Processing, None)
        .await
        .expect_err("invisible document");
    assert!(matches!(err, ragvault_db::repositories::DocumentRepoError::NotFound(_)));
    conn.rollback().await.expect("rollback");

    // Inserting a row labelled with B while bound to A violates WITH CHECK.
    let conn = TenantConnection::new(&db, tenant_a).await.expect("bind a");
    let now = chrono::Utc::now().into();
    let result = users::ActiveModel {
        id: Set(Uuid::now_v7()),
        tenant_id: Set(tenant_b.into_inner()),
        email: Set(format!("smuggled-{}@example.com", Uuid::new_v4().simple())),
        password_hash: Set(None),
        full_name: Set(String::new()),
        role: Set(ragvault_db::entities::sea_orm_active_enums::UserRole::Owner),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn.transaction())
    .await;
    assert!(result.is_err(), "policy must reject foreign tenant_id");
    conn.rollback().await.expect("rollback");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_binding_ends_with_transaction() {
    let db = app_db(1).await;
    let tenant = TenantId::new();

    let conn = TenantConnection::new(&db, tenant).await.expect("bind");
    let inside = current_tenant_setting(conn.transaction()).await.expect("read");
    assert_eq!(inside, Some(tenant.to_string()));
    conn.commit().await.expect("commit");

    // Single-connection pool: the same physical connection is reused.
    let txn = db.begin().await.expect("begin");
    let after = current_tenant_setting(&txn).await.expect("read");
    assert_eq!(after, None);
    txn.rollback().await.expect("rollback");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_dropped_guard_does_not_leak_binding() {
    let db = app_db(1).await;
    {
        let _conn = TenantConnection::new(&db, TenantId::new()).await.expect("bind");
    }
    let after = current_tenant_setting(&db).await.expect("read");
    assert_eq!(after, None);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_session_level_setting_is_reset_on_release() {
    let db = app_db(1).await;
    db.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT set_config('app.current_tenant_id', $1, false)",
        [TenantId::new().to_string().into()],
    ))
    .await
    .expect("session-level set");

    let after = current_tenant_setting(&db).await.expect("read");
    assert_eq!(after, None, "after_release hook must reset the setting");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_bind_rejects_malformed_identifier() {
    let db = app_db(1).await;
    let err = TenantConnection::bind(&db, "tenant-a").await.unwrap_err();
    assert!(matches!(err, RlsError::InvalidTenant(_)));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_unknown_tenant_binds_and_sees_nothing() {
    let db = app_db(1).await;
    let conn = TenantConnection::bind(&db, &Uuid::new_v4().to_string())
        .await
        .expect("existence is not checked");
    let (rows, total) = DocumentRepository::new(&conn)
        .list(PageRequest::default())
        .await
        .expect("list");
    assert!(rows.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_audit_log_is_append_only() {
    let admin = admin_db().await;
    let tenant = create_tenant(&admin, "audit").await;
    let (user, _) = create_user(&admin, tenant, Role::Admin, None).await;

    let db = app_db(2).await;
    let conn = TenantConnection::new(&db, tenant).await.expect("bind");
    let entry = AuditLogRepository::new(&conn)
        .append(NewAuditEntry::success("document.uploaded").by(user))
        .await
        .expect("append");
    conn.commit().await.expect("commit");

    let conn = TenantConnection::new(&db, tenant).await.expect("bind");
    let err = AuditLogRepository::new(&conn)
        .update_action(entry.id, "document.deleted")
        .await
        .unwrap_err();
    assert!(matches!(err, RlsError::ImmutabilityViolation(_)), "{err}");
    conn.rollback().await.expect("rollback");

    let conn = TenantConnection::new(&db, tenant).await.expect("bind");
    let err = AuditLogRepository::new(&conn).delete(entry.id).await.unwrap_err();
    assert!(matches!(err, RlsError::ImmutabilityViolation(_)), "{err}");
    conn.rollback().await.expect("rollback");

    // Even the owner is stopped by the trigger.
    let conn = TenantConnection::new(&admin, tenant).await.expect("bind");
    let err = AuditLogRepository::new(&conn).delete(entry.id).await.unwrap_err();
    assert!(matches!(err, RlsError::ImmutabilityViolation(_)), "{err}");
    conn.rollback().await.expect("rollback");

    let conn = TenantConnection::new(&db, tenant).await.expect("bind");
    let rows = AuditLogRepository::new(&conn)
        .list_by_action("document.uploaded")
        .await
        .expect("list");
    assert!(rows.iter().any(|r| r.id == entry.id));
}
