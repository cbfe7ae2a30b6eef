//! memgate core - membership verification and role reconciliation
//!
//! Turns evidence of a paid channel membership into a gated Discord role:
//! - Fetches evidence (OCR'd billing screenshot or provider OAuth check)
//! - Decides `Active`, `Expired` or `Indeterminate` as of a date
//! - Applies the decision to the stored record and the role platform
//!   exactly once, with bounded retries and per-pair serialization
//! - Re-validates active members in a bounded-concurrency sweep
//!
//! # Example
//!
//! ```rust,ignore
//! use memgate_core::prelude::*;
//!
//! # async fn example(engine: ReconciliationEngine) -> Result<(), ReconcileError> {
//! let key = PairKey::new(guild_id, user_id, role_id);
//! let request = EvidenceRequest::Screenshot { image, locale: Locale::ChineseSimplified };
//!
//! let outcome = engine.submit(key, request, chrono::Utc::now()).await?;
//! if let Some(reason) = outcome.rejection_reason() {
//!     println!("not verified: {reason}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod gateway;
pub mod ports;
pub mod retry;
pub mod roles;
pub mod store;
pub mod transition;
pub mod types;

// Re-exports for convenience
pub use config::{GateConfig, RetryConfig, VAULT_KEY_ENV};
pub use decision::{decide, resolve_billing_date, Decision, IndeterminateReason};
pub use engine::{ReconcileOutcome, ReconciliationEngine, SweepReport};
pub use error::{ConfigError, GatewayError, ReconcileError, RoleApiError, ServiceError, StoreError};
pub use evidence::{EvidenceRequest, MembershipEvidence};
pub use gateway::{EvidenceGateway, ProviderGateway};
pub use ports::{CredentialStore, MembershipApi, OcrService, RolePlatform, StatusStore};
pub use retry::{RetryFailure, RetryPolicy, Retryable};
pub use roles::{RoleDirectory, ROLE_CACHE_TTL};
pub use store::MemoryStore;
pub use transition::{role_effect, target_state, transition, RoleEffect, Transition};
pub use types::{
    BillingDate, GuildId, MembershipRole, MembershipState, MembershipStatus, PairKey, RoleId,
    UserId, VerificationMethod,
};

pub use memgate_locale::{Locale, RecognizedDate};
pub use memgate_vault::{CredentialVault, EncryptedSecret, VaultError, VaultKey};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with memgate core
    pub use crate::{
        Decision, EvidenceRequest, GateConfig, Locale, MembershipEvidence, MembershipState,
        PairKey, ReconcileError, ReconcileOutcome, ReconciliationEngine, RoleDirectory,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
