//! External collaborator interfaces
//!
//! Everything the engine talks to over the network or disk sits behind
//! one of these traits: the OCR service, the provider membership API, the
//! role platform and persistence. Implementations are expected to be
//! cheap to share behind `Arc`.

use crate::error::{RoleApiError, ServiceError, StoreError};
use crate::types::{GuildId, MembershipRole, MembershipStatus, PairKey, RoleId, UserId};
use async_trait::async_trait;
use memgate_locale::Locale;
use memgate_vault::EncryptedSecret;

/// Image-to-text service
#[async_trait]
pub trait OcrService: Send + Sync {
    /// Recognize text lines in `image` using `locale`'s language model
    async fn recognize(&self, image: &[u8], locale: Locale) -> Result<Vec<String>, ServiceError>;
}

/// Provider membership check
#[async_trait]
pub trait MembershipApi: Send + Sync {
    /// Whether the token's owner is a member of `channel_id`
    ///
    /// `refresh_token` is the decrypted token; exchanging it for an access
    /// token is the implementation's concern.
    async fn check_membership(&self, refresh_token: &str, channel_id: &str) -> Result<bool, ServiceError>;
}

/// Discord role assignment
///
/// Both calls must be idempotent on the platform side: granting a held
/// role or revoking an absent one succeeds.
#[async_trait]
pub trait RolePlatform: Send + Sync {
    /// Add `role` to `user`
    async fn grant_role(&self, guild: GuildId, user: UserId, role: RoleId) -> Result<(), RoleApiError>;

    /// Remove `role` from `user`
    async fn revoke_role(&self, guild: GuildId, user: UserId, role: RoleId) -> Result<(), RoleApiError>;
}

/// Membership status and role projection persistence
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Load the record for `key`
    async fn get_status(&self, key: &PairKey) -> Result<Option<MembershipStatus>, StoreError>;

    /// Conditionally write `status`
    ///
    /// Succeeds only if the stored version equals `status.version` (or no
    /// record exists and `status.version == 0`). Returns the new version.
    async fn upsert_status(&self, status: &MembershipStatus) -> Result<u64, StoreError>;

    /// Keys of every `Active` record, for the scheduled recheck
    async fn active_pairs(&self) -> Result<Vec<PairKey>, StoreError>;

    /// Load a cached role projection
    async fn get_role(&self, id: RoleId) -> Result<Option<MembershipRole>, StoreError>;

    /// Insert or overwrite a role projection
    async fn upsert_role(&self, role: &MembershipRole) -> Result<(), StoreError>;
}

/// Encrypted OAuth token storage
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Sealed token for `user`, if one was linked
    async fn oauth_token(&self, user: UserId) -> Result<Option<EncryptedSecret>, StoreError>;

    /// Save or replace the sealed token for `user`
    async fn put_oauth_token(&self, user: UserId, secret: EncryptedSecret) -> Result<(), StoreError>;
}
