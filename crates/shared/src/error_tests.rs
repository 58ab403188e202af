use super::*;
use rstest::rstest;

#[rstest]
#[case(AppError::Unauthorized("test".into()), 401, "UNAUTHORIZED")]
#[case(AppError::Forbidden("test".into()), 403, "FORBIDDEN")]
#[case(AppError::NotFound("test".into()), 404, "NOT_FOUND")]
#[case(AppError::InvalidTenant("test".into()), 400, "INVALID_TENANT")]
#[case(AppError::ImmutabilityViolation("test".into()), 409, "IMMUTABILITY_VIOLATION")]
#[case(AppError::RefreshReuseDetected("test".into()), 401, "UNAUTHORIZED")]
#[case(AppError::Validation("test".into()), 400, "VALIDATION_ERROR")]
#[case(AppError::Conflict("test".into()), 409, "CONFLICT")]
#[case(AppError::PayloadTooLarge("test".into()), 413, "PAYLOAD_TOO_LARGE")]
#[case(AppError::Database("test".into()), 500, "DATABASE_ERROR")]
#[case(AppError::ExternalService("test".into()), 500, "EXTERNAL_SERVICE_ERROR")]
#[case(AppError::Internal("test".into()), 500, "INTERNAL_ERROR")]
fn test_app_error_mapping(#[case] err: AppError, #[case] status: u16, #[case] code: &str) {
    assert_eq!(err.status_code(), status);
    assert_eq!(err.error_code(), code);
}

#[test]
fn test_app_error_display() {
    assert_eq!(
        format!("{}", AppError::Unauthorized("msg".into())),
        "Authentication failed: msg"
    );
    assert_eq!(
        format!("{}", AppError::ImmutabilityViolation("msg".into())),
        "Immutability violation: msg"
    );
    assert_eq!(
        format!("{}", AppError::InvalidTenant("msg".into())),
        "Invalid tenant: msg"
    );
}

#[test]
fn test_reuse_is_externally_indistinguishable_from_unauthorized() {
    let reuse = AppError::RefreshReuseDetected("family 42 replayed".into());
    let plain = AppError::Unauthorized("expired".into());
    assert_eq!(reuse.status_code(), plain.status_code());
    assert_eq!(reuse.error_code(), plain.error_code());
    assert_eq!(reuse.public_message(), plain.public_message());
    assert_eq!(reuse.public_message(), UNAUTHORIZED_MESSAGE);
}

#[test]
fn test_internal_detail_is_hidden() {
    let err = AppError::Database("relation \"documents\" does not exist".into());
    assert!(!err.public_message().contains("documents"));
}

#[test]
fn test_tenant_id_error_converts_to_invalid_tenant() {
    let err: AppError = TenantIdError::Nil.into();
    assert_eq!(err.error_code(), "INVALID_TENANT");
}
