//! Testing utilities for the memgate workspace
//!
//! Scripted fakes for every external collaborator, plus fixtures for
//! building an engine wired to them.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use dashmap::DashSet;
use memgate_core::{
    CredentialStore, EvidenceGateway, EvidenceRequest, GateConfig, GatewayError, GuildId, MemoryStore,
    MembershipApi, MembershipEvidence, MembershipRole, MembershipStatus, OcrService, PairKey,
    ReconciliationEngine, RetryPolicy, RoleApiError, RoleId, RolePlatform, ServiceError,
    StatusStore, StoreError, UserId,
};
use memgate_locale::Locale;
use memgate_vault::EncryptedSecret;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const GUILD: u64 = 100;
pub const ROLE: u64 = 300;

/// Pair in the default test guild and role
pub fn pair(user: u64) -> PairKey {
    PairKey::new(GUILD, user, ROLE)
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Noon UTC on the given day
pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

pub fn screenshot(locale: Locale) -> EvidenceRequest {
    EvidenceRequest::Screenshot {
        image: b"fake image bytes".to_vec(),
        locale,
    }
}

pub fn oauth(channel_id: &str) -> EvidenceRequest {
    EvidenceRequest::OAuth {
        channel_id: channel_id.to_string(),
    }
}

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().unwrap().pop_front()
}

/// OCR returning scripted results, then a fixed set of lines
#[derive(Debug, Default)]
pub struct ScriptedOcr {
    script: Mutex<VecDeque<Result<Vec<String>, ServiceError>>>,
    fallback: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedOcr {
    /// Always recognize `lines`
    pub fn lines<S: Into<String>>(lines: impl IntoIterator<Item = S>) -> Self {
        Self {
            fallback: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Queue a result for the next call
    pub fn then(self, result: Result<Vec<String>, ServiceError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrService for ScriptedOcr {
    async fn recognize(&self, _image: &[u8], _locale: Locale) -> Result<Vec<String>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.script).unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Provider API returning scripted answers, then a fixed one
#[derive(Debug)]
pub struct FakeMembershipApi {
    script: Mutex<VecDeque<Result<bool, ServiceError>>>,
    member: bool,
    tokens_seen: Mutex<Vec<String>>,
}

impl FakeMembershipApi {
    pub fn answering(member: bool) -> Self {
        Self {
            script: Mutex::default(),
            member,
            tokens_seen: Mutex::default(),
        }
    }

    pub fn then(self, result: Result<bool, ServiceError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    /// Decrypted tokens the API was called with
    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MembershipApi for FakeMembershipApi {
    async fn check_membership(&self, refresh_token: &str, _channel_id: &str) -> Result<bool, ServiceError> {
        self.tokens_seen.lock().unwrap().push(refresh_token.to_string());
        pop(&self.script).unwrap_or(Ok(self.member))
    }
}

/// Role platform that records calls and tracks held roles
#[derive(Debug, Default)]
pub struct RecordingRolePlatform {
    held: DashSet<(GuildId, UserId, RoleId)>,
    failures: Mutex<VecDeque<RoleApiError>>,
    grants: AtomicUsize,
    revokes: AtomicUsize,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingRolePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next calls with `errors`, in order
    pub fn fail_next(&self, errors: impl IntoIterator<Item = RoleApiError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    /// Successful grant calls
    pub fn grants(&self) -> usize {
        self.grants.load(Ordering::SeqCst)
    }

    /// Successful revoke calls
    pub fn revokes(&self) -> usize {
        self.revokes.load(Ordering::SeqCst)
    }

    pub fn holds(&self, key: &PairKey) -> bool {
        self.held.contains(&(key.guild, key.user, key.role))
    }

    /// Most calls observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn call(&self) -> Result<(), RoleApiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        pop(&self.failures).map_or(Ok(()), Err)
    }
}

#[async_trait]
impl RolePlatform for RecordingRolePlatform {
    async fn grant_role(&self, guild: GuildId, user: UserId, role: RoleId) -> Result<(), RoleApiError> {
        self.call().await?;
        self.grants.fetch_add(1, Ordering::SeqCst);
        self.held.insert((guild, user, role));
        Ok(())
    }

    async fn revoke_role(&self, guild: GuildId, user: UserId, role: RoleId) -> Result<(), RoleApiError> {
        self.call().await?;
        self.revokes.fetch_add(1, Ordering::SeqCst);
        self.held.remove(&(guild, user, role));
        Ok(())
    }
}

/// [`MemoryStore`] that can be told to fail upcoming writes
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing_upserts: Mutex<VecDeque<StoreError>>,
    upserts: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(statuses: impl IntoIterator<Item = MembershipStatus>) -> Self {
        Self {
            inner: MemoryStore::with_statuses(statuses),
            ..Self::default()
        }
    }

    /// Fail the next `upsert_status` calls with `errors`, in order
    pub fn fail_next_upserts(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.failing_upserts.lock().unwrap().extend(errors);
    }

    /// Successful status writes
    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl StatusStore for FlakyStore {
    async fn get_status(&self, key: &PairKey) -> Result<Option<MembershipStatus>, StoreError> {
        self.inner.get_status(key).await
    }

    async fn upsert_status(&self, status: &MembershipStatus) -> Result<u64, StoreError> {
        if let Some(error) = pop(&self.failing_upserts) {
            return Err(error);
        }
        let version = self.inner.upsert_status(status).await?;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(version)
    }

    async fn active_pairs(&self) -> Result<Vec<PairKey>, StoreError> {
        self.inner.active_pairs().await
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<MembershipRole>, StoreError> {
        self.inner.get_role(id).await
    }

    async fn upsert_role(&self, role: &MembershipRole) -> Result<(), StoreError> {
        self.inner.upsert_role(role).await
    }
}

#[async_trait]
impl CredentialStore for FlakyStore {
    async fn oauth_token(&self, user: UserId) -> Result<Option<EncryptedSecret>, StoreError> {
        self.inner.oauth_token(user).await
    }

    async fn put_oauth_token(&self, user: UserId, secret: EncryptedSecret) -> Result<(), StoreError> {
        self.inner.put_oauth_token(user, secret).await
    }
}

/// Gateway returning scripted results, then a fixed piece of evidence
#[derive(Debug)]
pub struct StaticGateway {
    script: Mutex<VecDeque<Result<MembershipEvidence, GatewayError>>>,
    evidence: Mutex<MembershipEvidence>,
    calls: AtomicUsize,
}

impl StaticGateway {
    pub fn returning(evidence: MembershipEvidence) -> Self {
        Self {
            script: Mutex::default(),
            evidence: Mutex::new(evidence),
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue a result for the next call
    pub fn push(&self, result: Result<MembershipEvidence, GatewayError>) {
        self.script.lock().unwrap().push_back(result);
    }

    /// Change the evidence returned once the script runs out
    pub fn set(&self, evidence: MembershipEvidence) {
        *self.evidence.lock().unwrap() = evidence;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvidenceGateway for StaticGateway {
    async fn fetch_evidence(
        &self,
        _key: &PairKey,
        _request: &EvidenceRequest,
    ) -> Result<MembershipEvidence, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pop(&self.script).unwrap_or_else(|| Ok(*self.evidence.lock().unwrap()))
    }
}

/// Engine wired to a [`FlakyStore`], a [`RecordingRolePlatform`] and a caller-chosen gateway
pub struct Harness {
    pub store: Arc<FlakyStore>,
    pub roles: Arc<RecordingRolePlatform>,
    pub engine: ReconciliationEngine,
}

impl Harness {
    /// Harness with zero-delay retries (3 attempts)
    pub fn new(gateway: Arc<dyn EvidenceGateway>) -> Self {
        Self::build(
            Arc::new(FlakyStore::new()),
            Arc::new(RecordingRolePlatform::new()),
            gateway,
            GateConfig::new(),
        )
    }

    pub fn build(
        store: Arc<FlakyStore>,
        roles: Arc<RecordingRolePlatform>,
        gateway: Arc<dyn EvidenceGateway>,
        config: GateConfig,
    ) -> Self {
        let engine = ReconciliationEngine::new(&config, store.clone(), roles.clone(), gateway)
            .with_retry(RetryPolicy::immediate(3));
        Self { store, roles, engine }
    }

    /// Current record for `key`
    pub async fn status(&self, key: &PairKey) -> MembershipStatus {
        self.store.get_status(key).await.unwrap().expect("record exists")
    }
}
