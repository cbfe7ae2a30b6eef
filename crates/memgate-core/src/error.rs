//! Error types for memgate core
//!
//! Only I/O boundaries fail: the evidence gateway, the vault, the role
//! platform and the store. Parsing and decisions are total and have no
//! error type. Each error classifies itself as retryable or not so retry
//! policy lives in one place.

use crate::types::{PairKey, UserId};
use memgate_vault::VaultError;
use std::time::Duration;

/// Failure reported by an external collaborator (OCR, provider API)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Worth retrying: timeouts, 5xx, connection resets
    #[error("transient service failure: {0}")]
    Transient(String),

    /// Retrying will not help: bad input, revoked grant, 4xx
    #[error("permanent service failure: {0}")]
    Permanent(String),
}

impl ServiceError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Evidence gateway errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Collaborator call failed
    #[error("evidence unavailable: {0}")]
    Unavailable(#[from] ServiceError),

    /// No OAuth token on file for the user
    #[error("no OAuth token stored for user {0}")]
    MissingCredential(UserId),

    /// Vault refused the stored token (tampered, wrong key); never retried
    #[error("credential vault: {0}")]
    Vault(#[from] VaultError),

    /// Credential lookup failed
    #[error("credential store: {0}")]
    Store(#[from] StoreError),

    /// Call exceeded its timeout
    #[error("evidence request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl GatewayError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(e) => e.is_retryable(),
            Self::Store(e) => e.is_retryable(),
            Self::Timeout(_) => true,
            Self::MissingCredential(_) | Self::Vault(_) => false,
        }
    }
}

/// Role platform errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleApiError {
    /// Platform asked us to slow down
    #[error("rate limited")]
    RateLimited {
        /// Suggested wait, if the platform sent one
        retry_after: Option<Duration>,
    },

    /// Network or 5xx failure
    #[error("transient role API failure: {0}")]
    Transient(String),

    /// Missing permission, unknown role, unknown member
    #[error("permanent role API failure: {0}")]
    Permanent(String),

    /// Call exceeded its timeout
    #[error("role API call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl RoleApiError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

/// Persistence errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Another writer committed first
    #[error("version conflict on {key}: expected {expected}, found {found}")]
    VersionConflict {
        /// Pair being written
        key: PairKey,
        /// Version the writer read
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Backend failure
    #[error("store backend failure: {message}")]
    Backend {
        /// Description
        message: String,
        /// Whether a retry may succeed
        retryable: bool,
    },

    /// Call exceeded its timeout
    #[error("store call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl StoreError {
    /// Transient backend failure
    #[inline]
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            retryable: true,
        }
    }

    /// Check if error is retryable
    ///
    /// Version conflicts are not: the caller must re-read and re-decide.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend { retryable, .. } => *retryable,
            Self::Timeout(_) => true,
            Self::VersionConflict { .. } => false,
        }
    }
}

/// Reconciliation engine errors
///
/// Evidence that cannot be obtained is not an error here; it is reported
/// as an outcome so the caller never confuses it with lapse.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// No status record exists for the pair
    #[error("no membership record for {0}")]
    NotFound(PairKey),

    /// Stored OAuth token is tampered or sealed with another key
    #[error("credential integrity failure for {key}: {source}")]
    Decryption {
        /// Affected pair
        key: PairKey,
        /// Vault error
        source: VaultError,
    },

    /// Role grant/revoke failed after retries; record left unchanged
    #[error("role API failed for {key} after {attempts} attempt(s): {source}")]
    RoleApi {
        /// Affected pair
        key: PairKey,
        /// Attempts made
        attempts: u32,
        /// Last error
        source: RoleApiError,
    },

    /// Persistence failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Whether an operator must look at this failure
    #[inline]
    #[must_use]
    pub fn requires_operator(&self) -> bool {
        match self {
            Self::Decryption { .. } => true,
            Self::RoleApi { source, .. } => !source.is_retryable(),
            Self::NotFound(_) | Self::Store(_) => false,
        }
    }

    /// Whether the scheduler may simply run the pair again
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RoleApi { source, .. } => source.is_retryable(),
            Self::Store(e) => e.is_retryable() || matches!(e, StoreError::VersionConflict { .. }),
            Self::Decryption { .. } | Self::NotFound(_) => false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file malformed
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid config: {0}")]
    Invalid(String),

    /// Neither config nor environment supplied a vault key
    #[error("no vault key configured (set vault_key_hex or MEMGATE_VAULT_KEY)")]
    MissingVaultKey,

    /// Vault key malformed
    #[error("invalid vault key: {0}")]
    VaultKey(#[from] VaultError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_retryable() {
        assert!(ServiceError::Transient("503".into()).is_retryable());
        assert!(!ServiceError::Permanent("400".into()).is_retryable());
    }

    #[test]
    fn decryption_never_retried() {
        assert!(!GatewayError::Vault(VaultError::Decryption).is_retryable());
        assert!(!GatewayError::MissingCredential(UserId(1)).is_retryable());
        assert!(GatewayError::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn role_api_classification() {
        assert!(RoleApiError::RateLimited { retry_after: None }.is_retryable());
        assert!(!RoleApiError::Permanent("missing access".into()).is_retryable());
    }

    #[test]
    fn operator_escalation() {
        let key = PairKey::new(1u64, 2u64, 3u64);
        let err = ReconcileError::Decryption {
            key,
            source: VaultError::Decryption,
        };
        assert!(err.requires_operator());
        assert!(!err.is_retryable());

        let err = ReconcileError::RoleApi {
            key,
            attempts: 1,
            source: RoleApiError::Permanent("unknown role".into()),
        };
        assert!(err.requires_operator());
    }

    #[test]
    fn version_conflict_display() {
        let err = StoreError::VersionConflict {
            key: PairKey::new(1u64, 2u64, 3u64),
            expected: 2,
            found: 3,
        };
        assert!(err.to_string().contains("expected 2, found 3"));
        assert!(!err.is_retryable());
    }
}
