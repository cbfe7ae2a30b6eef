//! In-memory persistence
//!
//! [`MemoryStore`] implements [`StatusStore`] and [`CredentialStore`] on
//! `DashMap`s with the same conditional-write contract a database backend
//! must honor. Used by the CLI dry run and by tests.

use crate::error::StoreError;
use crate::ports::{CredentialStore, StatusStore};
use crate::types::{MembershipRole, MembershipState, MembershipStatus, PairKey, RoleId, UserId};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use memgate_vault::EncryptedSecret;

/// Concurrent in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    statuses: DashMap<PairKey, MembershipStatus>,
    roles: DashMap<RoleId, MembershipRole>,
    tokens: DashMap<UserId, EncryptedSecret>,
}

impl MemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `statuses`, keeping their versions
    #[must_use]
    pub fn with_statuses(statuses: impl IntoIterator<Item = MembershipStatus>) -> Self {
        let store = Self::new();
        for status in statuses {
            store.statuses.insert(status.key, status);
        }
        store
    }

    /// Copy of every status record, ordered by key
    #[must_use]
    pub fn snapshot(&self) -> Vec<MembershipStatus> {
        let mut all: Vec<_> = self.statuses.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|s| s.key);
        all
    }

    /// Number of status records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// Whether no status records exist
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn get_status(&self, key: &PairKey) -> Result<Option<MembershipStatus>, StoreError> {
        Ok(self.statuses.get(key).map(|e| e.value().clone()))
    }

    async fn upsert_status(&self, status: &MembershipStatus) -> Result<u64, StoreError> {
        match self.statuses.entry(status.key) {
            Entry::Occupied(mut entry) => {
                let found = entry.get().version;
                if found != status.version {
                    return Err(StoreError::VersionConflict {
                        key: status.key,
                        expected: status.version,
                        found,
                    });
                }
                let mut next = status.clone();
                next.version = found + 1;
                entry.insert(next);
                Ok(found + 1)
            }
            Entry::Vacant(entry) => {
                if status.version != 0 {
                    return Err(StoreError::VersionConflict {
                        key: status.key,
                        expected: status.version,
                        found: 0,
                    });
                }
                let mut next = status.clone();
                next.version = 1;
                entry.insert(next);
                Ok(1)
            }
        }
    }

    async fn active_pairs(&self) -> Result<Vec<PairKey>, StoreError> {
        let mut keys: Vec<_> = self
            .statuses
            .iter()
            .filter(|e| e.value().state == MembershipState::Active)
            .map(|e| *e.key())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<MembershipRole>, StoreError> {
        Ok(self.roles.get(&id).map(|e| e.value().clone()))
    }

    async fn upsert_role(&self, role: &MembershipRole) -> Result<(), StoreError> {
        self.roles.insert(role.id, role.clone());
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn oauth_token(&self, user: UserId) -> Result<Option<EncryptedSecret>, StoreError> {
        Ok(self.tokens.get(&user).map(|e| e.value().clone()))
    }

    async fn put_oauth_token(&self, user: UserId, secret: EncryptedSecret) -> Result<(), StoreError> {
        self.tokens.insert(user, secret);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VerificationMethod;
    use memgate_locale::Locale;

    fn pending(user: u64) -> MembershipStatus {
        MembershipStatus::pending(
            PairKey::new(1u64, user, 9u64),
            VerificationMethod::Screenshot {
                locale: Locale::German,
            },
        )
    }

    #[tokio::test]
    async fn insert_then_update_bumps_version() {
        let store = MemoryStore::new();
        let mut status = pending(1);

        status.version = store.upsert_status(&status).await.unwrap();
        assert_eq!(status.version, 1);

        status.state = MembershipState::Active;
        assert_eq!(store.upsert_status(&status).await.unwrap(), 2);

        let stored = store.get_status(&status.key).await.unwrap().unwrap();
        assert_eq!(stored.state, MembershipState::Active);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn stale_write_conflicts() {
        let store = MemoryStore::new();
        let status = pending(1);
        store.upsert_status(&status).await.unwrap();

        // Second writer still holds version 0
        let err = store.upsert_status(&status).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::VersionConflict {
                key: status.key,
                expected: 0,
                found: 1
            }
        );
    }

    #[tokio::test]
    async fn active_pairs_filters_and_sorts() {
        let mut a = pending(2);
        a.state = MembershipState::Active;
        let mut b = pending(1);
        b.state = MembershipState::Active;
        let c = pending(3);
        let store = MemoryStore::with_statuses([a.clone(), b.clone(), c]);

        assert_eq!(store.active_pairs().await.unwrap(), vec![b.key, a.key]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn roles_overwrite() {
        let store = MemoryStore::new();
        let mut role = MembershipRole {
            id: RoleId(5),
            name: "Members".into(),
            color: 0x00FF_0000,
        };
        store.upsert_role(&role).await.unwrap();
        role.name = "Sponsors".into();
        store.upsert_role(&role).await.unwrap();
        assert_eq!(store.get_role(RoleId(5)).await.unwrap().unwrap().name, "Sponsors");
    }
}
