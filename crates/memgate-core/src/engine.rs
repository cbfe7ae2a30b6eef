//! Reconciliation engine
//!
//! Applies membership decisions to persisted status records and to the
//! role platform, exactly once per transition:
//! - Calls for the same pair are serialized by a per-pair lock, released
//!   once no call holds or waits on it
//! - The role call is derived from `role_applied` vs. the target state,
//!   so re-running after a crash repeats at most one idempotent call
//! - The record is written only after the role call succeeded, so a
//!   failure leaves the last committed state intact
//! - Evidence is fetched before anything is written, so evidence that
//!   cannot be fetched never changes state; only evidence
//!   that says "lapsed" revokes a role

use crate::config::GateConfig;
use crate::decision::{decide, resolve_billing_date, Decision};
use crate::error::{GatewayError, ReconcileError};
use crate::evidence::{EvidenceRequest, MembershipEvidence};
use crate::gateway::EvidenceGateway;
use crate::ports::{RolePlatform, StatusStore};
use crate::retry::{RetryFailure, RetryPolicy};
use crate::transition::{transition, RoleEffect, Transition};
use crate::types::{MembershipState, MembershipStatus, PairKey, VerificationMethod};
use chrono::{DateTime, Datelike, Utc};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use memgate_locale::RecognizedDate;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What a reconciliation call did
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// A decision was applied and committed
    Applied {
        /// Committed record
        status: MembershipStatus,
        /// State change and role call made
        transition: Transition,
        /// Decision behind the transition
        decision: Decision,
    },
    /// Evidence could not be obtained; the record is unchanged
    EvidenceUnavailable {
        /// Affected pair
        key: PairKey,
        /// Why evidence was unavailable
        reason: String,
    },
    /// Recheck skipped because the pair is not `Active`
    Skipped {
        /// Affected pair
        key: PairKey,
        /// Current state
        state: MembershipState,
    },
}

impl ReconcileOutcome {
    /// Human-readable reason to show the requester, if the claim was not accepted
    #[must_use]
    pub fn rejection_reason(&self) -> Option<String> {
        match self {
            Self::Applied {
                decision: Decision::Indeterminate(reason),
                ..
            } => Some(reason.to_string()),
            Self::Applied {
                decision: Decision::Expired,
                ..
            } => Some("the membership has expired".to_string()),
            Self::EvidenceUnavailable { reason, .. } => Some(format!(
                "membership could not be checked right now, please try again later ({reason})"
            )),
            Self::Applied { .. } | Self::Skipped { .. } => None,
        }
    }

    /// State after the call, if a record exists
    #[must_use]
    pub fn state(&self) -> Option<MembershipState> {
        match self {
            Self::Applied { status, .. } => Some(status.state),
            Self::Skipped { state, .. } => Some(*state),
            Self::EvidenceUnavailable { .. } => None,
        }
    }
}

/// Tally of a recheck sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Pairs processed
    pub checked: usize,
    /// Applied with no state change
    pub unchanged: usize,
    /// Moved to `Expired`
    pub expired: usize,
    /// Moved to `Rejected`
    pub rejected: usize,
    /// Moved to `Active` (only when a stale non-active key was swept)
    pub activated: usize,
    /// Evidence unavailable; left as-is
    pub unavailable: usize,
    /// Not `Active`, not rechecked
    pub skipped: usize,
    /// Failed with an error
    pub failed: usize,
}

impl SweepReport {
    fn record(&mut self, result: &Result<ReconcileOutcome, ReconcileError>) {
        self.checked += 1;
        match result {
            Ok(ReconcileOutcome::Applied { transition, .. }) if !transition.changes_state() => {
                self.unchanged += 1;
            }
            Ok(ReconcileOutcome::Applied { transition, .. }) => match transition.to {
                MembershipState::Expired => self.expired += 1,
                MembershipState::Rejected => self.rejected += 1,
                MembershipState::Active => self.activated += 1,
                MembershipState::Pending => self.unchanged += 1,
            },
            Ok(ReconcileOutcome::EvidenceUnavailable { .. }) => self.unavailable += 1,
            Ok(ReconcileOutcome::Skipped { .. }) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// The reconciliation engine
pub struct ReconciliationEngine {
    store: Arc<dyn StatusStore>,
    roles: Arc<dyn RolePlatform>,
    gateway: Arc<dyn EvidenceGateway>,
    retry: RetryPolicy,
    sweep_concurrency: usize,
    locks: DashMap<PairKey, Arc<Mutex<()>>>,
}

impl ReconciliationEngine {
    /// Create an engine
    #[must_use]
    pub fn new(
        config: &GateConfig,
        store: Arc<dyn StatusStore>,
        roles: Arc<dyn RolePlatform>,
        gateway: Arc<dyn EvidenceGateway>,
    ) -> Self {
        Self {
            store,
            roles,
            gateway,
            retry: RetryPolicy::new(&config.retry),
            sweep_concurrency: config.sweep_concurrency.max(1),
            locks: DashMap::new(),
        }
    }

    /// With a custom retry policy
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Submit new evidence for a pair
    ///
    /// Fetches evidence first. If it cannot be obtained nothing is written.
    /// Otherwise the record is created as `Pending` on first submission,
    /// or an `Expired`/`Rejected` record is superseded to `Pending`, and the
    /// decision is applied in the same commit. An `Active` record stays
    /// `Active` until the new evidence is decided.
    ///
    /// # Errors
    /// - [`ReconcileError::Decryption`] if the stored OAuth token is corrupt
    /// - [`ReconcileError::RoleApi`] if the role call failed; record unchanged
    /// - [`ReconcileError::Store`] if persistence failed
    #[tracing::instrument(skip_all, fields(pair = %key))]
    pub async fn submit(
        &self,
        key: PairKey,
        request: EvidenceRequest,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.with_pair_lock(key, || self.submit_locked(key, request, now)).await
    }

    async fn submit_locked(
        &self,
        key: PairKey,
        request: EvidenceRequest,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let evidence = match self.fetch_evidence(&key, &request).await? {
            Ok(evidence) => evidence,
            Err(reason) => return Ok(ReconcileOutcome::EvidenceUnavailable { key, reason }),
        };
        let existing = self.load(&key).await?;
        let record = supersede(existing, key, request.method());
        self.apply_locked(record, evidence, EvidenceOrigin::Observed, now).await
    }

    /// Apply already-obtained evidence to an existing pair
    ///
    /// Safe to call any number of times with the same evidence.
    ///
    /// # Errors
    /// - [`ReconcileError::NotFound`] if the pair has no record
    /// - [`ReconcileError::RoleApi`] / [`ReconcileError::Store`] as for [`Self::submit`]
    #[tracing::instrument(skip_all, fields(pair = %key))]
    pub async fn apply(
        &self,
        key: PairKey,
        evidence: MembershipEvidence,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.with_pair_lock(key, || self.apply_existing(key, evidence, now)).await
    }

    async fn apply_existing(
        &self,
        key: PairKey,
        evidence: MembershipEvidence,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let record = self
            .load(&key)
            .await?
            .ok_or(ReconcileError::NotFound(key))?;
        self.apply_locked(record, evidence, EvidenceOrigin::Observed, now).await
    }

    /// Re-validate an `Active` pair
    ///
    /// OAuth pairs re-query the provider. Screenshot pairs re-evaluate the
    /// stored billing date. Non-active pairs are skipped.
    ///
    /// # Errors
    /// As for [`Self::apply`], plus [`ReconcileError::Decryption`]
    #[tracing::instrument(skip_all, fields(pair = %key))]
    pub async fn recheck(&self, key: PairKey, now: DateTime<Utc>) -> Result<ReconcileOutcome, ReconcileError> {
        self.with_pair_lock(key, || self.recheck_locked(key, now)).await
    }

    async fn recheck_locked(&self, key: PairKey, now: DateTime<Utc>) -> Result<ReconcileOutcome, ReconcileError> {
        let record = self
            .load(&key)
            .await?
            .ok_or(ReconcileError::NotFound(key))?;

        if record.state != MembershipState::Active {
            tracing::debug!(state = %record.state, "not active, skipping recheck");
            return Ok(ReconcileOutcome::Skipped {
                key,
                state: record.state,
            });
        }

        let (evidence, origin) = match &record.method {
            VerificationMethod::OAuth { channel_id } => {
                let request = EvidenceRequest::OAuth {
                    channel_id: channel_id.clone(),
                };
                match self.fetch_evidence(&key, &request).await? {
                    Ok(evidence) => (evidence, EvidenceOrigin::Observed),
                    Err(reason) => return Ok(ReconcileOutcome::EvidenceUnavailable { key, reason }),
                }
            }
            VerificationMethod::Screenshot { .. } => match record.next_billing_date {
                Some(billing) => (
                    MembershipEvidence::ParsedDate(RecognizedDate::ymd(
                        billing.date.year(),
                        billing.date.month(),
                        billing.date.day(),
                    )),
                    EvidenceOrigin::StoredDate,
                ),
                None => {
                    return Ok(ReconcileOutcome::EvidenceUnavailable {
                        key,
                        reason: "no stored billing date to recheck".to_string(),
                    })
                }
            },
        };

        self.apply_locked(record, evidence, origin, now).await
    }

    /// Recheck many pairs through a bounded worker pool
    ///
    /// Failures are logged and counted; one bad pair never stops the sweep.
    pub async fn recheck_sweep(&self, keys: Vec<PairKey>, now: DateTime<Utc>) -> SweepReport {
        tracing::info!(pairs = keys.len(), concurrency = self.sweep_concurrency, "starting recheck sweep");

        let report = stream::iter(keys)
            .map(|key| async move { (key, self.recheck(key, now).await) })
            .buffer_unordered(self.sweep_concurrency)
            .fold(SweepReport::default(), |mut report, (key, result)| async move {
                if let Err(e) = &result {
                    if e.requires_operator() {
                        tracing::error!(pair = %key, error = %e, "recheck needs operator attention");
                    } else {
                        tracing::warn!(pair = %key, error = %e, "recheck failed");
                    }
                }
                report.record(&result);
                report
            })
            .await;

        tracing::info!(?report, "recheck sweep finished");
        report
    }

    /// Recheck every `Active` pair in the store
    ///
    /// # Errors
    /// Returns the store error if the active pairs cannot be listed
    pub async fn recheck_all(&self, now: DateTime<Utc>) -> Result<SweepReport, ReconcileError> {
        let keys = self
            .retry
            .run("list_active_pairs", || self.store.active_pairs())
            .await
            .map_err(|f| f.error)?;
        Ok(self.recheck_sweep(keys, now).await)
    }

    /// Pairs with a live lock entry
    #[must_use]
    pub fn tracked_pairs(&self) -> usize {
        self.locks.len()
    }

    /// Run `op` holding the pair's lock, then drop the entry if no one else holds it
    async fn with_pair_lock<T, F, Fut>(&self, key: PairKey, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.locks.entry(key).or_default().value().clone();
        let result = {
            let _guard = lock.lock().await;
            op().await
        };
        drop(lock);
        // Clones are only taken under the shard lock, so a count of 1 means no waiter.
        self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn load(&self, key: &PairKey) -> Result<Option<MembershipStatus>, ReconcileError> {
        self.retry
            .run("get_status", || self.store.get_status(key))
            .await
            .map_err(|f| ReconcileError::Store(f.error))
    }

    async fn save(&self, record: &MembershipStatus) -> Result<u64, ReconcileError> {
        self.retry
            .run("upsert_status", || self.store.upsert_status(record))
            .await
            .map_err(|f| ReconcileError::Store(f.error))
    }

    /// Fetch evidence with retry
    ///
    /// Outer error: fatal. Inner error: evidence unavailable, with reason.
    async fn fetch_evidence(
        &self,
        key: &PairKey,
        request: &EvidenceRequest,
    ) -> Result<Result<MembershipEvidence, String>, ReconcileError> {
        match self
            .retry
            .run("fetch_evidence", || self.gateway.fetch_evidence(key, request))
            .await
        {
            Ok(evidence) => Ok(Ok(evidence)),
            Err(RetryFailure {
                error: GatewayError::Vault(source),
                ..
            }) => {
                tracing::error!(error = %source, "stored credential failed integrity check");
                Err(ReconcileError::Decryption { key: *key, source })
            }
            Err(RetryFailure { error, attempts }) => {
                tracing::warn!(%error, attempts, "evidence unavailable");
                Ok(Err(error.to_string()))
            }
        }
    }

    /// Decide, perform the role call, then commit. Caller holds the pair lock.
    async fn apply_locked(
        &self,
        mut record: MembershipStatus,
        evidence: MembershipEvidence,
        origin: EvidenceOrigin,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let key = record.key;
        let as_of = now.date_naive();
        let decision = decide(&evidence, as_of);
        let step = transition(record.state, record.role_applied, &decision);

        self.perform(key, step.effect).await?;

        tracing::info!(
            from = %step.from,
            to = %step.to,
            effect = ?step.effect,
            decision = %decision,
            "applied membership decision"
        );

        record.state = step.to;
        record.role_applied = step.to.wants_role();
        if origin == EvidenceOrigin::Observed {
            record.last_evidence = Some(evidence);
        }
        record.last_checked_at = Some(now);
        if let MembershipEvidence::ParsedDate(date) = &evidence {
            let resolved = resolve_billing_date(date, as_of);
            // A recheck re-reads the stored date with its year filled in; keep its provenance.
            record.next_billing_date = match (resolved, record.next_billing_date) {
                (Some(new), Some(old)) if new.date == old.date => Some(old),
                (resolved, _) => resolved,
            };
        }

        record.version = self.save(&record).await?;

        Ok(ReconcileOutcome::Applied {
            status: record,
            transition: step,
            decision,
        })
    }

    async fn perform(&self, key: PairKey, effect: RoleEffect) -> Result<(), ReconcileError> {
        let result = match effect {
            RoleEffect::None => return Ok(()),
            RoleEffect::Grant => {
                self.retry
                    .run("grant_role", || self.roles.grant_role(key.guild, key.user, key.role))
                    .await
            }
            RoleEffect::Revoke => {
                self.retry
                    .run("revoke_role", || self.roles.revoke_role(key.guild, key.user, key.role))
                    .await
            }
        };

        result.map_err(|RetryFailure { error, attempts }| {
            tracing::error!(pair = %key, ?effect, %error, attempts, "role call failed, record left unchanged");
            ReconcileError::RoleApi {
                key,
                attempts,
                source: error,
            }
        })
    }
}

/// Where the evidence being applied came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EvidenceOrigin {
    /// Fetched from a collaborator or supplied by the caller
    Observed,
    /// Rebuilt from the record's own billing date
    StoredDate,
}

/// Record a new submission is applied to: created, superseded to `Pending`, or kept
fn supersede(existing: Option<MembershipStatus>, key: PairKey, method: VerificationMethod) -> MembershipStatus {
    match existing {
        Some(mut record) if record.state.accepts_resubmission() => {
            if record.state != MembershipState::Pending {
                tracing::info!(from = %record.state, "superseding record with new submission");
            }
            record.state = MembershipState::Pending;
            record.method = method;
            record
        }
        Some(mut record) => {
            record.method = method;
            record
        }
        None => {
            tracing::info!("first submission, creating pending record");
            MembershipStatus::pending(key, method)
        }
    }
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("retry", &self.retry)
            .field("sweep_concurrency", &self.sweep_concurrency)
            .field("tracked_pairs", &self.tracked_pairs())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::IndeterminateReason;
    use crate::error::StoreError;

    fn applied(to: MembershipState, from: MembershipState) -> Result<ReconcileOutcome, ReconcileError> {
        let key = PairKey::new(1u64, 2u64, 3u64);
        let mut status = MembershipStatus::pending(
            key,
            VerificationMethod::OAuth {
                channel_id: "UC".into(),
            },
        );
        status.state = to;
        Ok(ReconcileOutcome::Applied {
            status,
            transition: Transition {
                from,
                to,
                effect: RoleEffect::None,
            },
            decision: Decision::Active,
        })
    }

    #[test]
    fn sweep_report_tallies() {
        let mut report = SweepReport::default();
        report.record(&applied(MembershipState::Active, MembershipState::Active));
        report.record(&applied(MembershipState::Expired, MembershipState::Active));
        report.record(&applied(MembershipState::Rejected, MembershipState::Active));
        report.record(&Ok(ReconcileOutcome::EvidenceUnavailable {
            key: PairKey::new(1u64, 2u64, 3u64),
            reason: "timeout".into(),
        }));
        report.record(&Err(StoreError::transient("down").into()));

        assert_eq!(
            report,
            SweepReport {
                checked: 5,
                unchanged: 1,
                expired: 1,
                rejected: 1,
                activated: 0,
                unavailable: 1,
                skipped: 0,
                failed: 1,
            }
        );
    }

    #[test]
    fn rejection_reason_surfaces_parse_failure() {
        let key = PairKey::new(1u64, 2u64, 3u64);
        let outcome = ReconcileOutcome::Applied {
            status: MembershipStatus::pending(
                key,
                VerificationMethod::OAuth {
                    channel_id: "UC".into(),
                },
            ),
            transition: Transition {
                from: MembershipState::Pending,
                to: MembershipState::Rejected,
                effect: RoleEffect::None,
            },
            decision: Decision::Indeterminate(IndeterminateReason::NoDateFound),
        };
        assert!(outcome.rejection_reason().unwrap().contains("no billing date"));
    }
}
