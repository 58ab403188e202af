//! Integration tests for refresh token rotation on PostgreSQL.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{admin_db, app_db, create_tenant, create_user};
use futures::future::join_all;
use ragvault_core::auth::session::hash_refresh_token;
use ragvault_core::auth::store::{NewRefreshToken, Replacement, RotateOutcome};
use ragvault_core::auth::{ClientInfo, RefreshTokenStore};
use ragvault_db::RefreshTokenRepository;
use ragvault_shared::Role;
use ragvault_shared::types::{SessionFamilyId, TenantId, UserId};
use uuid::Uuid;

fn unique_hash() -> String {
    hash_refresh_token(&Uuid::new_v4().to_string())
}

fn replacement() -> Replacement {
    Replacement {
        token_hash: unique_hash(),
        expires_at: Utc::now() + Duration::days(14),
        client: ClientInfo::default(),
    }
}

async fn issue(repo: &RefreshTokenRepository, tenant_id: TenantId, user_id: UserId, family_id: SessionFamilyId) -> String {
    let hash = unique_hash();
    repo.insert(NewRefreshToken {
        family_id,
        user_id,
        tenant_id,
        token_hash: hash.clone(),
        role: Role::Member,
        email: "member@example.com".into(),
        expires_at: Utc::now() + Duration::days(14),
        client: ClientInfo {
            user_agent: Some("integration".into()),
            ip_address: Some("127.0.0.1".into()),
        },
    })
    .await
    .expect("insert refresh token");
    hash
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_rotate_then_reuse() {
    let admin = admin_db().await;
    let tenant = create_tenant(&admin, "rt").await;
    let (user, _) = create_user(&admin, tenant, Role::Member, None).await;
    let repo = RefreshTokenRepository::new(app_db(4).await);
    let family = SessionFamilyId::new();
    let first = issue(&repo, tenant, user, family).await;

    let outcome = repo.rotate(&first, replacement()).await.expect("rotate");
    let RotateOutcome::Rotated { previous, current } = outcome else {
        panic!("expected rotation, got {outcome:?}");
    };
    assert_eq!(previous.replaced_by, Some(current.id));
    assert_eq!(current.family_id, family);
    assert!(current.rotated_at.is_none());

    let again = repo.rotate(&first, replacement()).await.expect("rotate");
    assert!(matches!(again, RotateOutcome::Reused(_)), "{again:?}");

    let stored = repo.family(family).await.expect("family");
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_concurrent_rotation_has_one_winner() {
    let admin = admin_db().await;
    let tenant = create_tenant(&admin, "rt-race").await;
    let (user, _) = create_user(&admin, tenant, Role::Member, None).await;
    let repo = Arc::new(RefreshTokenRepository::new(app_db(8).await));
    let token = issue(&repo, tenant, user, SessionFamilyId::new()).await;

    let attempts = (0..8).map(|_| {
        let repo = Arc::clone(&repo);
        let token = token.clone();
        async move { repo.rotate(&token, replacement()).await.expect("rotate") }
    });
    let outcomes = join_all(attempts).await;

    let rotated = outcomes
        .iter()
        .filter(|o| matches!(o, RotateOutcome::Rotated { .. }))
        .count();
    assert_eq!(rotated, 1, "{outcomes:?}");
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, RotateOutcome::Rotated { .. } | RotateOutcome::Reused(_)))
    );
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_revoke_all_for_user_spans_families() {
    let admin = admin_db().await;
    let tenant = create_tenant(&admin, "rt-revoke").await;
    let (user, _) = create_user(&admin, tenant, Role::Member, None).await;
    let (other, _) = create_user(&admin, tenant, Role::Member, None).await;
    let repo = RefreshTokenRepository::new(app_db(4).await);

    let laptop = issue(&repo, tenant, user, SessionFamilyId::new()).await;
    let phone = issue(&repo, tenant, user, SessionFamilyId::new()).await;
    let bystander = issue(&repo, tenant, other, SessionFamilyId::new()).await;

    let revoked = repo
        .revoke_all_for_user(tenant, user, "reuse_detected")
        .await
        .expect("revoke");
    assert_eq!(revoked, 2);

    for hash in [&laptop, &phone] {
        let outcome = repo.rotate(hash, replacement()).await.expect("rotate");
        assert_eq!(outcome, RotateOutcome::Revoked);
    }
    let outcome = repo.rotate(&bystander, replacement()).await.expect("rotate");
    assert!(matches!(outcome, RotateOutcome::Rotated { .. }));
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_unknown_hash_is_not_found() {
    let repo = RefreshTokenRepository::new(app_db(1).await);
    let outcome = repo.rotate(&unique_hash(), replacement()).await.expect("rotate");
    assert_eq!(outcome, RotateOutcome::NotFound);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_revoke_family_leaves_other_families() {
    let admin = admin_db().await;
    let tenant = create_tenant(&admin, "rt-family").await;
    let (user, _) = create_user(&admin, tenant, Role::Member, None).await;
    let repo = RefreshTokenRepository::new(app_db(2).await);
    let family = SessionFamilyId::new();
    let a = issue(&repo, tenant, user, family).await;
    let b = issue(&repo, tenant, user, SessionFamilyId::new()).await;

    assert_eq!(repo.revoke_family(family, "logout").await.expect("revoke"), 1);
    assert_eq!(repo.rotate(&a, replacement()).await.expect("rotate"), RotateOutcome::Revoked);
    assert!(matches!(
        repo.rotate(&b, replacement()).await.expect("rotate"),
        RotateOutcome::Rotated { .. }
    ));
}
