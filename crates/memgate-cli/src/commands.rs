//! Command implementations
//!
//! Each command returns a serializable report; `main` picks JSON or the
//! report's `Display` form.

use crate::dry_run::{LoggingRolePlatform, OfflineGateway, RoleCalls};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use memgate_core::{
    decide, resolve_billing_date, BillingDate, Decision, GateConfig, MembershipEvidence, MembershipStatus,
    MemoryStore, ReconciliationEngine, SweepReport,
};
use memgate_locale::{parse_billing_date, Locale, RecognizedDate};
use memgate_vault::{CredentialVault, EncryptedSecret, VaultKey};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// What the parser and the decision made of a date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateReport {
    /// Locale used, when the date came from OCR text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<Locale>,
    /// Date as recognized
    pub recognized: RecognizedDate,
    /// Calendar date after year resolution
    pub resolved: Option<BillingDate>,
    /// Reference date
    pub as_of: NaiveDate,
    /// Validity as of `as_of`
    pub decision: Decision,
}

impl DateReport {
    fn new(locale: Option<Locale>, recognized: RecognizedDate, as_of: NaiveDate) -> Self {
        Self {
            locale,
            recognized,
            resolved: resolve_billing_date(&recognized, as_of),
            as_of,
            decision: decide(&MembershipEvidence::ParsedDate(recognized), as_of),
        }
    }
}

impl fmt::Display for DateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(locale) = self.locale {
            writeln!(f, "Locale:     {locale}")?;
        }
        writeln!(f, "Recognized: {}", self.recognized)?;
        match &self.resolved {
            Some(billing) if billing.year_known => writeln!(f, "Resolved:   {}", billing.date)?,
            Some(billing) => writeln!(f, "Resolved:   {} (year inferred)", billing.date)?,
            None => writeln!(f, "Resolved:   -")?,
        }
        writeln!(f, "As of:      {}", self.as_of)?;
        write!(f, "Decision:   {}", self.decision)?;
        if let Decision::Indeterminate(reason) = &self.decision {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}

/// Parse OCR text lines for `locale` and decide as of `as_of`
///
/// # Errors
/// Fails if `locale` is not a supported OCR code
pub fn parse(locale: &str, lines: &[String], as_of: NaiveDate) -> Result<DateReport> {
    let locale: Locale = locale.parse()?;
    let recognized = parse_billing_date(lines, locale);
    Ok(DateReport::new(Some(locale), recognized, as_of))
}

/// Decide a month/day with an optional year as of `as_of`
#[must_use]
pub fn decide_date(year: Option<i32>, month: u32, day: u32, as_of: NaiveDate) -> DateReport {
    let recognized = match year {
        Some(year) => RecognizedDate::ymd(year, month, day),
        None => RecognizedDate::without_year(month, day),
    };
    DateReport::new(None, recognized, as_of)
}

/// Generate a fresh vault key, hex-encoded
#[must_use]
pub fn keygen() -> String {
    VaultKey::generate().to_hex()
}

/// Seal `plaintext`, returning the stored hex form
///
/// # Errors
/// Fails if encryption fails
pub fn encrypt(key: &VaultKey, plaintext: &str) -> Result<String> {
    let secret = CredentialVault::new(key).encrypt_str(plaintext)?;
    Ok(secret.to_hex())
}

/// Open a stored hex secret
///
/// # Errors
/// Fails on malformed hex, a tampered secret, or the wrong key
pub fn decrypt(key: &VaultKey, stored: &str) -> Result<String> {
    let secret = EncryptedSecret::from_hex(stored.trim()).context("stored secret is malformed")?;
    CredentialVault::new(key)
        .decrypt_string(&secret)
        .context("secret does not open with this key")
}

/// Result of a dry-run sweep
#[derive(Debug, Clone, Serialize)]
pub struct DryRunReport {
    /// Sweep tally
    pub report: SweepReport,
    /// Role calls the sweep would have made
    pub role_calls: RoleCalls,
    /// Records after the sweep
    pub statuses: Vec<MembershipStatus>,
}

impl fmt::Display for DryRunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.report;
        writeln!(f, "Recheck sweep (dry run)")?;
        writeln!(f, "  Checked:     {}", r.checked)?;
        writeln!(f, "  Unchanged:   {}", r.unchanged)?;
        writeln!(f, "  Expired:     {}", r.expired)?;
        writeln!(f, "  Rejected:    {}", r.rejected)?;
        writeln!(f, "  Unavailable: {}", r.unavailable)?;
        writeln!(f, "  Skipped:     {}", r.skipped)?;
        writeln!(f, "  Failed:      {}", r.failed)?;
        writeln!(
            f,
            "Role calls: {} grant(s), {} revoke(s)",
            self.role_calls.grants, self.role_calls.revokes
        )?;
        for status in &self.statuses {
            writeln!(f, "  {} {}", status.key, status.state)?;
        }
        Ok(())
    }
}

/// Load a JSON array of status records
///
/// # Errors
/// Fails if the file is unreadable or not a JSON array of records
pub fn load_snapshot(path: &Path) -> Result<Vec<MembershipStatus>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a status snapshot", path.display()))
}

/// Recheck every active record in `statuses` as of `as_of`, offline
///
/// # Errors
/// Fails if the active pairs cannot be listed
pub async fn sweep(config: &GateConfig, statuses: Vec<MembershipStatus>, as_of: NaiveDate) -> Result<DryRunReport> {
    let store = Arc::new(MemoryStore::with_statuses(statuses));
    let roles = Arc::new(LoggingRolePlatform::new());
    let engine = ReconciliationEngine::new(config, store.clone(), roles.clone(), Arc::new(OfflineGateway));

    let now = as_of.and_time(NaiveTime::MIN).and_utc();
    let report = engine.recheck_all(now).await?;

    Ok(DryRunReport {
        report,
        role_calls: roles.calls(),
        statuses: store.snapshot(),
    })
}
