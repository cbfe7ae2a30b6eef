use memgate_core::{
    CredentialStore, EvidenceGateway, GatewayError, MembershipEvidence, MemoryStore, ProviderGateway,
    ServiceError,
};
use memgate_locale::{Locale, RecognizedDate};
use memgate_test_utils::{oauth, pair, screenshot, FakeMembershipApi, ScriptedOcr};
use memgate_vault::{CredentialVault, VaultKey};
use pretty_assertions::assert_eq;
use std::sync::Arc;

struct Fixture {
    store: Arc<MemoryStore>,
    api: Arc<FakeMembershipApi>,
    gateway: ProviderGateway,
}

fn fixture(ocr: ScriptedOcr, api: FakeMembershipApi) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let api = Arc::new(api);
    let gateway = ProviderGateway::new(
        Arc::new(ocr),
        api.clone(),
        store.clone(),
        CredentialVault::new(&VaultKey::generate()),
    );
    Fixture { store, api, gateway }
}

#[tokio::test]
async fn test_oauth_uses_decrypted_token() {
    let f = fixture(ScriptedOcr::default(), FakeMembershipApi::answering(true));
    let key = pair(1);
    f.gateway.link_oauth_token(key.user, "refresh-abc").await.unwrap();

    let sealed = f.store.oauth_token(key.user).await.unwrap().unwrap();
    assert!(!sealed.to_hex().contains(&hex_of("refresh-abc")));

    let evidence = f.gateway.fetch_evidence(&key, &oauth("UC-channel")).await.unwrap();
    assert_eq!(evidence, MembershipEvidence::ApiMembership(true));
    assert_eq!(f.api.tokens_seen(), vec!["refresh-abc".to_string()]);
}

fn hex_of(s: &str) -> String {
    s.bytes().map(|b| format!("{b:02x}")).collect()
}

#[tokio::test]
async fn test_oauth_without_token_is_missing_credential() {
    let f = fixture(ScriptedOcr::default(), FakeMembershipApi::answering(true));
    let err = f
        .gateway
        .fetch_evidence(&pair(2), &oauth("UC-channel"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::MissingCredential(user) if user == pair(2).user));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_provider_failure_classification_passes_through() {
    let api = FakeMembershipApi::answering(true)
        .then(Err(ServiceError::Transient("503".into())))
        .then(Err(ServiceError::Permanent("invalid_grant".into())));
    let f = fixture(ScriptedOcr::default(), api);
    let key = pair(3);
    f.gateway.link_oauth_token(key.user, "refresh").await.unwrap();

    let first = f.gateway.fetch_evidence(&key, &oauth("UC")).await.unwrap_err();
    assert!(first.is_retryable());
    let second = f.gateway.fetch_evidence(&key, &oauth("UC")).await.unwrap_err();
    assert!(!second.is_retryable());
}

#[tokio::test]
async fn test_screenshot_parses_first_matching_line() {
    let ocr = ScriptedOcr::lines(["Mitgliedschaft", "Nächste Abrechnung: 1.2.2026", "Erneuert am 1.1.2026"]);
    let f = fixture(ocr, FakeMembershipApi::answering(false));

    let evidence = f
        .gateway
        .fetch_evidence(&pair(4), &screenshot(Locale::German))
        .await
        .unwrap();
    assert_eq!(evidence, MembershipEvidence::ParsedDate(RecognizedDate::ymd(2026, 2, 1)));
}

#[tokio::test]
async fn test_fallback_locale_yields_unknown_date() {
    let f = fixture(
        ScriptedOcr::lines(["Next billing date: March 15, 2025"]),
        FakeMembershipApi::answering(false),
    );
    let evidence = f
        .gateway
        .fetch_evidence(&pair(5), &screenshot(Locale::English))
        .await
        .unwrap();
    assert_eq!(evidence, MembershipEvidence::ParsedDate(RecognizedDate::unknown()));
}

#[tokio::test]
async fn test_ocr_failure_is_unavailable() {
    let ocr = ScriptedOcr::default().then(Err(ServiceError::Transient("ocr busy".into())));
    let f = fixture(ocr, FakeMembershipApi::answering(false));
    let err = f
        .gateway
        .fetch_evidence(&pair(6), &screenshot(Locale::Korean))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Unavailable(ServiceError::Transient(_))));
}
