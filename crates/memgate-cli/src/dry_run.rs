//! Offline collaborators for dry-run sweeps
//!
//! A dry run exercises the real engine against a snapshot without
//! touching Discord or the provider: role calls are logged and counted,
//! and OAuth evidence is reported as unavailable so no role is revoked
//! on its account.

use async_trait::async_trait;
use memgate_core::{
    EvidenceGateway, EvidenceRequest, GatewayError, GuildId, MembershipEvidence, PairKey, RoleApiError,
    RoleId, RolePlatform, ServiceError, UserId,
};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Role platform that only logs what it would do
#[derive(Debug, Default)]
pub struct LoggingRolePlatform {
    grants: AtomicUsize,
    revokes: AtomicUsize,
}

/// Role calls a dry run would have made
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoleCalls {
    /// Grants
    pub grants: usize,
    /// Revokes
    pub revokes: usize,
}

impl LoggingRolePlatform {
    /// Create a platform with zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded so far
    #[must_use]
    pub fn calls(&self) -> RoleCalls {
        RoleCalls {
            grants: self.grants.load(Ordering::Relaxed),
            revokes: self.revokes.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl RolePlatform for LoggingRolePlatform {
    async fn grant_role(&self, guild: GuildId, user: UserId, role: RoleId) -> Result<(), RoleApiError> {
        self.grants.fetch_add(1, Ordering::Relaxed);
        tracing::info!(%guild, %user, %role, "dry run: would grant role");
        Ok(())
    }

    async fn revoke_role(&self, guild: GuildId, user: UserId, role: RoleId) -> Result<(), RoleApiError> {
        self.revokes.fetch_add(1, Ordering::Relaxed);
        tracing::info!(%guild, %user, %role, "dry run: would revoke role");
        Ok(())
    }
}

/// Gateway with no network access
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineGateway;

#[async_trait]
impl EvidenceGateway for OfflineGateway {
    async fn fetch_evidence(
        &self,
        key: &PairKey,
        _request: &EvidenceRequest,
    ) -> Result<MembershipEvidence, GatewayError> {
        tracing::debug!(pair = %key, "dry run: provider not contacted");
        Err(GatewayError::Unavailable(ServiceError::Permanent(
            "provider is not contacted during a dry run".into(),
        )))
    }
}
