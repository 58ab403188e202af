use super::*;
use crate::auth::issuer::TokenIssuer;
use crate::auth::jwks::StaticKeySource;
use jsonwebtoken::{EncodingKey, Header, encode};
use ragvault_shared::Role;
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use serde_json::json;
use std::sync::Arc;

const PEM_A: &str = include_str!("../../testdata/signing_a.pem");
const PEM_B: &str = include_str!("../../testdata/signing_b.pem");
const ISS: &str = "https://auth.ragvault.test";
const AUD: &str = "ragvault-api";
const NS: &str = "https://ragvault.io";

fn issuer(pem: &str, kid: &str) -> TokenIssuer {
    TokenIssuer::from_pem(pem, kid, ISS, AUD, 900).unwrap()
}

fn verifier() -> TokenVerifier {
    let source = StaticKeySource::new(issuer(PEM_A, "a").public_jwks().clone());
    let config = VerifierConfig {
        issuer: ISS.into(),
        audience: AUD.into(),
        claim_namespace: Some(NS.into()),
    };
    TokenVerifier::new(&config, KeyCache::new(Arc::new(source)))
}

fn claims_for(tenant: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": "user-123",
        "tenant_id": tenant,
        "role": "admin",
        "email": "owner@acme.test",
        "iat": now,
        "exp": now + 300,
        "iss": ISS,
        "aud": AUD,
    })
}

fn raw_encoding_key(pem: &str) -> EncodingKey {
    let der = RsaPrivateKey::from_pkcs8_pem(pem).unwrap().to_pkcs1_der().unwrap();
    EncodingKey::from_rsa_der(der.as_bytes())
}

#[tokio::test]
async fn test_valid_token_yields_identity() {
    let tenant = TenantId::new();
    let token = issuer(PEM_A, "a").sign_claims(&claims_for(&tenant.to_string())).unwrap();

    let verified = verifier().verify(&token).await.unwrap();
    assert_eq!(verified.subject, "user-123");
    assert_eq!(verified.tenant_id, tenant);
    assert_eq!(verified.role, Role::Admin);
    assert_eq!(verified.email.as_deref(), Some("owner@acme.test"));
    assert!(verified.expires_at > Utc::now());
}

#[tokio::test]
async fn test_issued_access_token_roundtrip() {
    let tenant = TenantId::new();
    let issued = issuer(PEM_A, "a")
        .issue_access_token("u-1", tenant, Role::Owner, None)
        .unwrap();
    let verified = verifier().verify(&issued.token).await.unwrap();
    assert_eq!(verified.tenant_id, tenant);
    assert_eq!(verified.role, Role::Owner);
    assert!(verified.email.is_none());
}

#[tokio::test]
async fn test_expired_token_rejected_without_leeway() {
    let mut claims = claims_for(&TenantId::new().to_string());
    claims["exp"] = json!(Utc::now().timestamp() - 1);
    let token = issuer(PEM_A, "a").sign_claims(&claims).unwrap();
    assert_eq!(verifier().verify(&token).await, Err(TokenRejection::Expired));
}

#[tokio::test]
async fn test_wrong_issuer_rejected() {
    let mut claims = claims_for(&TenantId::new().to_string());
    claims["iss"] = json!("https://evil.test");
    let token = issuer(PEM_A, "a").sign_claims(&claims).unwrap();
    assert_eq!(verifier().verify(&token).await, Err(TokenRejection::Issuer));
}

#[tokio::test]
async fn test_wrong_audience_rejected() {
    let mut claims = claims_for(&TenantId::new().to_string());
    claims["aud"] = json!("another-api");
    let token = issuer(PEM_A, "a").sign_claims(&claims).unwrap();
    assert_eq!(verifier().verify(&token).await, Err(TokenRejection::Audience));
}

#[tokio::test]
async fn test_foreign_key_under_known_kid_fails_signature() {
    let token = issuer(PEM_B, "a")
        .sign_claims(&claims_for(&TenantId::new().to_string()))
        .unwrap();
    assert_eq!(verifier().verify(&token).await, Err(TokenRejection::Signature));
}

#[tokio::test]
async fn test_tampered_payload_fails_signature() {
    let token = issuer(PEM_A, "a")
        .sign_claims(&claims_for(&TenantId::new().to_string()))
        .unwrap();
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let other = issuer(PEM_A, "a")
        .sign_claims(&claims_for(&TenantId::new().to_string()))
        .unwrap();
    parts[1] = other.split('.').nth(1).unwrap().to_string();
    // Same header and signature, different payload.
    let forged = parts.join(".");
    assert_eq!(verifier().verify(&forged).await, Err(TokenRejection::Signature));
}

#[tokio::test]
async fn test_unknown_kid_rejected() {
    let token = issuer(PEM_A, "rotated-away")
        .sign_claims(&claims_for(&TenantId::new().to_string()))
        .unwrap();
    assert_eq!(
        verifier().verify(&token).await,
        Err(TokenRejection::UnknownKey("rotated-away".into()))
    );
}

#[tokio::test]
async fn test_missing_kid_rejected() {
    let token = encode(
        &Header::new(Algorithm::RS256),
        &claims_for(&TenantId::new().to_string()),
        &raw_encoding_key(PEM_A),
    )
    .unwrap();
    assert_eq!(verifier().verify(&token).await, Err(TokenRejection::MissingKeyId));
}

#[tokio::test]
async fn test_symmetric_algorithm_rejected() {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("a".into());
    let token = encode(
        &header,
        &claims_for(&TenantId::new().to_string()),
        &EncodingKey::from_secret(b"shared-secret"),
    )
    .unwrap();
    assert_eq!(verifier().verify(&token).await, Err(TokenRejection::Algorithm));
}

#[tokio::test]
async fn test_missing_tenant_rejected() {
    let mut claims = claims_for("x");
    claims.as_object_mut().unwrap().remove("tenant_id");
    let token = issuer(PEM_A, "a").sign_claims(&claims).unwrap();
    assert_eq!(verifier().verify(&token).await, Err(TokenRejection::MissingTenant));
}

#[tokio::test]
async fn test_non_uuid_tenant_rejected() {
    let token = issuer(PEM_A, "a").sign_claims(&claims_for("acme-corp")).unwrap();
    assert_eq!(verifier().verify(&token).await, Err(TokenRejection::InvalidTenant));
}

#[tokio::test]
async fn test_missing_subject_rejected() {
    let mut claims = claims_for(&TenantId::new().to_string());
    claims.as_object_mut().unwrap().remove("sub");
    let token = issuer(PEM_A, "a").sign_claims(&claims).unwrap();
    assert_eq!(
        verifier().verify(&token).await,
        Err(TokenRejection::MissingClaim("sub".into()))
    );
}

#[tokio::test]
async fn test_garbage_rejected_as_malformed() {
    let result = verifier().verify("not.a.jwt").await;
    assert!(matches!(result, Err(TokenRejection::Malformed(_))));
}

#[tokio::test]
async fn test_provider_claim_variants() {
    let tenant = TenantId::new();
    let now = Utc::now().timestamp();
    let cognito = json!({
        "sub": "c-1",
        "custom:tenant_id": tenant.to_string(),
        "cognito:groups": ["member"],
        "exp": now + 60,
        "iss": ISS,
        "aud": AUD,
    });
    let auth0 = json!({
        "sub": "auth0|1",
        "https://ragvault.io/tenant_id": tenant.to_string(),
        "https://ragvault.io/role": "owner",
        "exp": now + 60,
        "iss": ISS,
        "aud": AUD,
    });
    let issuer = issuer(PEM_A, "a");
    let verifier = verifier();

    let c = verifier.verify(&issuer.sign_claims(&cognito).unwrap()).await.unwrap();
    assert_eq!((c.tenant_id, c.role), (tenant, Role::Member));

    let a = verifier.verify(&issuer.sign_claims(&auth0).unwrap()).await.unwrap();
    assert_eq!((a.tenant_id, a.role), (tenant, Role::Owner));
}

#[tokio::test]
async fn test_unrecognised_role_is_least_privilege() {
    let mut claims = claims_for(&TenantId::new().to_string());
    claims["role"] = json!("root");
    let token = issuer(PEM_A, "a").sign_claims(&claims).unwrap();
    assert_eq!(verifier().verify(&token).await.unwrap().role, Role::Viewer);
}

#[test]
fn test_rejections_collapse_to_unauthorized() {
    for rejection in [
        TokenRejection::Expired,
        TokenRejection::Signature,
        TokenRejection::InvalidTenant,
        TokenRejection::UnknownKey("k".into()),
    ] {
        let err: AppError = rejection.into();
        assert_eq!(err.status_code(), 401);
        assert_eq!(err.public_message(), "Authentication required");
    }
}
