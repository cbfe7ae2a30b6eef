use memgate_cli::commands;
use memgate_core::{BillingDate, Decision, GateConfig, MembershipState, MembershipStatus, VerificationMethod};
use memgate_locale::{Locale, RecognizedDate};
use memgate_test_utils::{date, pair};
use memgate_vault::VaultKey;
use pretty_assertions::assert_eq;
use std::io::Write;

fn active(user: u64, method: VerificationMethod, billing: Option<BillingDate>) -> MembershipStatus {
    let mut status = MembershipStatus::pending(pair(user), method);
    status.state = MembershipState::Active;
    status.role_applied = true;
    status.next_billing_date = billing;
    status
}

#[test]
fn test_parse_chinese_line() {
    let lines = vec!["订阅".to_string(), "下次付款日期：2025年3月15日".to_string()];
    let report = commands::parse("chi_sim", &lines, date(2025, 3, 1)).unwrap();

    assert_eq!(report.locale, Some(Locale::ChineseSimplified));
    assert_eq!(report.recognized, RecognizedDate::ymd(2025, 3, 15));
    assert_eq!(report.decision, Decision::Active);
}

#[test]
fn test_parse_without_match_is_indeterminate() {
    let lines = vec!["no date here".to_string()];
    let report = commands::parse("kor", &lines, date(2025, 3, 1)).unwrap();
    assert!(matches!(report.decision, Decision::Indeterminate(_)));
    assert!(report.to_string().contains("indeterminate"));
}

#[test]
fn test_encrypt_decrypt_with_config_key() {
    let key = VaultKey::generate();
    let config = GateConfig::new().with_vault_key(&key);
    let key = config.vault_key().unwrap();

    let sealed = commands::encrypt(&key, "refresh-token").unwrap();
    assert_eq!(commands::decrypt(&key, &sealed).unwrap(), "refresh-token");

    let other = VaultKey::generate();
    assert!(commands::decrypt(&other, &sealed).is_err());
    assert!(commands::decrypt(&key, "not hex").is_err());
}

#[tokio::test]
async fn test_dry_run_sweep_from_snapshot() {
    let statuses = vec![
        active(
            1,
            VerificationMethod::Screenshot {
                locale: Locale::German,
            },
            Some(BillingDate {
                date: date(2025, 3, 15),
                year_known: true,
            }),
        ),
        active(
            2,
            VerificationMethod::OAuth {
                channel_id: "UC-channel".into(),
            },
            None,
        ),
        MembershipStatus::pending(
            pair(3),
            VerificationMethod::Screenshot {
                locale: Locale::Japanese,
            },
        ),
    ];
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(&statuses).unwrap().as_bytes())
        .unwrap();

    let loaded = commands::load_snapshot(file.path()).unwrap();
    assert_eq!(loaded, statuses);

    let result = commands::sweep(&GateConfig::new(), loaded, date(2025, 4, 1))
        .await
        .unwrap();

    assert_eq!(result.report.checked, 2);
    assert_eq!(result.report.expired, 1);
    assert_eq!(result.report.unavailable, 1);
    assert_eq!(result.role_calls.revokes, 1);
    assert_eq!(result.role_calls.grants, 0);

    let states: Vec<_> = result.statuses.iter().map(|s| s.state).collect();
    assert_eq!(
        states,
        vec![MembershipState::Expired, MembershipState::Active, MembershipState::Pending]
    );
}

#[test]
fn test_snapshot_must_be_records() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(br#"{"not": "an array"}"#).unwrap();
    assert!(commands::load_snapshot(file.path()).is_err());
}
