use super::*;
use proptest::prelude::*;
use rstest::rstest;
use serde_json::json;

const PDF: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n1 0 obj";
const DOCX: &[u8] = b"PK\x03\x04\x14\x00\x06\x00";
const DOC: &[u8] = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1\x00\x00";

#[rstest]
#[case("report.pdf", "report.pdf")]
#[case("../../etc/passwd", "passwd")]
#[case("C:\\Users\\ada\\notes.md", "notes.md")]
#[case("my file (1).pdf", "my_file__1_.pdf")]
#[case("résumé.docx", "r_sum_.docx")]
#[case("", "upload")]
#[case("..", "upload")]
#[case("dir/", "upload")]
fn test_sanitize_filename(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(sanitize_filename(raw), expected);
}

#[test]
fn test_sanitize_filename_caps_length() {
    let long = format!("{}.pdf", "a".repeat(500));
    assert_eq!(sanitize_filename(&long).len(), MAX_FILENAME_LEN);
}

#[test]
fn test_document_name_validation() {
    assert_eq!(validate_document_name("  Q3 Board Deck ").unwrap(), "Q3 Board Deck");
    assert!(validate_document_name("   ").is_err());
    assert!(validate_document_name(&"x".repeat(256)).is_err());
    assert!(validate_document_name(&"é".repeat(255)).is_ok());
    assert!(validate_document_name("bad\u{0007}name").is_err());
}

#[rstest]
#[case("a.pdf", PDF, DocumentKind::Pdf)]
#[case("a.docx", DOCX, DocumentKind::Docx)]
#[case("a.doc", DOC, DocumentKind::Doc)]
#[case("a.txt", b"hello world", DocumentKind::Text)]
#[case("a.md", b"# Title\n", DocumentKind::Markdown)]
#[case("A.PDF", PDF, DocumentKind::Pdf)]
fn test_detect_kind(#[case] filename: &str, #[case] content: &[u8], #[case] expected: DocumentKind) {
    assert_eq!(detect_kind(filename, content).unwrap(), expected);
}

#[test]
fn test_magic_bytes_win_over_extension() {
    // A PDF renamed to .txt is still a PDF.
    assert_eq!(detect_kind("sneaky.txt", PDF).unwrap(), DocumentKind::Pdf);
}

#[test]
fn test_binary_named_pdf_is_rejected() {
    let err = detect_kind("fake.pdf", b"\x7fELF\x02\x01\x01").unwrap_err();
    assert!(matches!(err, DocumentError::UnsupportedContent(_)));
}

#[test]
fn test_binary_named_txt_is_rejected() {
    let err = detect_kind("fake.txt", b"abc\x00def").unwrap_err();
    assert!(matches!(err, DocumentError::UnsupportedContent(_)));
}

#[test]
fn test_disallowed_extension() {
    assert_eq!(
        detect_kind("macro.docm", DOCX).unwrap_err(),
        DocumentError::ExtensionNotAllowed(".docm".into())
    );
    assert!(matches!(
        detect_kind("noext", PDF).unwrap_err(),
        DocumentError::ExtensionNotAllowed(_)
    ));
}

#[test]
fn test_checksum_is_sha256_hex() {
    assert_eq!(
        checksum(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn test_storage_key_layout() {
    let tenant = TenantId::new();
    let document = DocumentId::new();
    assert_eq!(
        document_storage_key(tenant, document, DocumentKind::Pdf),
        format!("tenants/{tenant}/documents/{document}.pdf")
    );
}

#[test]
fn test_prepare_upload() {
    let tenant = TenantId::new();
    let prepared = prepare_upload(
        IntakeLimits::default(),
        tenant,
        "../Q3 deck.pdf",
        " Q3 deck ",
        Some(json!({ "source": "board" })),
        PDF,
    )
    .unwrap();

    assert_eq!(prepared.tenant_id, tenant);
    assert_eq!(prepared.filename, "Q3_deck.pdf");
    assert_eq!(prepared.document_name, "Q3 deck");
    assert_eq!(prepared.kind, DocumentKind::Pdf);
    assert_eq!(prepared.size_bytes, PDF.len() as u64);
    assert_eq!(prepared.checksum, checksum(PDF));
    assert!(prepared.storage_key.starts_with(&format!("tenants/{tenant}/documents/")));
    assert_eq!(prepared.metadata["source"], "board");
}

#[test]
fn test_prepare_upload_limits() {
    let tenant = TenantId::new();
    let tiny = IntakeLimits { max_bytes: 4 };
    assert!(matches!(
        prepare_upload(tiny, tenant, "a.pdf", "a", None, PDF).unwrap_err(),
        DocumentError::FileTooLarge { max: 4, .. }
    ));
    assert_eq!(
        prepare_upload(IntakeLimits::default(), tenant, "a.pdf", "a", None, b"").unwrap_err(),
        DocumentError::EmptyFile
    );
    assert_eq!(
        prepare_upload(IntakeLimits::default(), tenant, "a.pdf", "a", Some(json!([1])), PDF)
            .unwrap_err(),
        DocumentError::InvalidMetadata
    );
}

#[test]
fn test_same_content_same_checksum_across_tenants() {
    let a = prepare_upload(IntakeLimits::default(), TenantId::new(), "a.pdf", "a", None, PDF).unwrap();
    let b = prepare_upload(IntakeLimits::default(), TenantId::new(), "b.pdf", "b", None, PDF).unwrap();
    assert_eq!(a.checksum, b.checksum);
    assert_ne!(a.storage_key, b.storage_key);
}

proptest! {
    #[test]
    fn prop_sanitized_filename_is_safe(raw in ".*") {
        let safe = sanitize_filename(&raw);
        prop_assert!(!safe.is_empty());
        prop_assert!(safe.len() <= MAX_FILENAME_LEN);
        prop_assert!(!safe.contains('/') && !safe.contains('\\'));
        prop_assert!(safe != "." && safe != "..");
        for c in safe.chars() {
            prop_assert!(c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_');
        }
    }
}
