//! Membership role projection
//!
//! Mirrors Discord role name/color into the store and a `moka` cache
//! whenever the platform reports a rename or recolor. Independent of the
//! membership state machine; last write wins. The store is the source of
//! truth: a sync only evicts, and entries expire after [`ROLE_CACHE_TTL`].

use crate::config::GateConfig;
use crate::error::StoreError;
use crate::ports::StatusStore;
use crate::types::{MembershipRole, RoleId};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Lifetime of a cached role projection
pub const ROLE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Read-through cache of role projections
#[derive(Clone)]
pub struct RoleDirectory {
    cache: Cache<RoleId, MembershipRole>,
    store: Arc<dyn StatusStore>,
}

impl RoleDirectory {
    /// Create a directory holding at most `capacity` cached roles
    #[must_use]
    pub fn new(store: Arc<dyn StatusStore>, capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ROLE_CACHE_TTL)
                .build(),
            store,
        }
    }

    /// Create a directory sized by `config.role_cache_capacity`
    #[must_use]
    pub fn from_config(config: &GateConfig, store: Arc<dyn StatusStore>) -> Self {
        Self::new(store, config.role_cache_capacity)
    }

    /// Maximum number of cached roles
    #[must_use]
    pub fn capacity(&self) -> Option<u64> {
        self.cache.policy().max_capacity()
    }

    /// Record a role update reported by the platform
    ///
    /// # Errors
    /// Returns the store error; the cache is left untouched on failure
    pub async fn sync(&self, role: MembershipRole) -> Result<(), StoreError> {
        self.store.upsert_role(&role).await?;
        tracing::debug!(role = %role.id, name = %role.name, color = role.color, "synced role projection");
        // Concurrent syncs may land in the store in either order; the next read picks the winner.
        self.cache.invalidate(&role.id).await;
        Ok(())
    }

    /// Look up a role, reading through to the store on a miss
    ///
    /// # Errors
    /// Returns the store error on a cache miss that fails to load
    pub async fn get(&self, id: RoleId) -> Result<Option<MembershipRole>, StoreError> {
        if let Some(role) = self.cache.get(&id).await {
            return Ok(Some(role));
        }
        let loaded = self.store.get_role(id).await?;
        if let Some(role) = &loaded {
            self.cache.insert(id, role.clone()).await;
        }
        Ok(loaded)
    }

    /// Drop a cached entry so the next read goes to the store
    pub async fn invalidate(&self, id: RoleId) {
        self.cache.invalidate(&id).await;
    }
}

impl std::fmt::Debug for RoleDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleDirectory")
            .field("entry_count", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}
