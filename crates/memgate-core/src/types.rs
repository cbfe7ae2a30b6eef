//! Core types for membership reconciliation
//!
//! Defines:
//! - Discord snowflake identifiers and the reconciliation pair
//! - Membership state and the persisted status record
//! - The cached membership role projection

use crate::evidence::MembershipEvidence;
use chrono::{DateTime, NaiveDate, Utc};
use memgate_locale::Locale;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

snowflake_id!(
    /// Discord guild (server) identifier
    GuildId
);
snowflake_id!(
    /// Discord user identifier
    UserId
);
snowflake_id!(
    /// Discord role identifier
    RoleId
);

/// The unit of reconciliation: one user's claim to one membership role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    /// Guild the role belongs to
    pub guild: GuildId,
    /// User holding or requesting the role
    pub user: UserId,
    /// Gated membership role
    pub role: RoleId,
}

impl PairKey {
    /// Create a new pair key
    #[inline]
    #[must_use]
    pub fn new(guild: impl Into<GuildId>, user: impl Into<UserId>, role: impl Into<RoleId>) -> Self {
        Self {
            guild: guild.into(),
            user: user.into(),
            role: role.into(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.guild, self.user, self.role)
    }
}

/// How a pair's membership was last proven
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationMethod {
    /// OCR'd billing page screenshot
    Screenshot {
        /// OCR locale of the screenshot
        locale: Locale,
    },
    /// Provider membership check with a stored OAuth token
    #[serde(rename = "oauth")]
    OAuth {
        /// Provider channel whose membership is checked
        channel_id: String,
    },
}

/// Lifecycle state of a membership claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipState {
    /// Evidence submitted, no decision yet
    Pending,
    /// Membership confirmed; role should be held
    Active,
    /// Membership lapsed
    Expired,
    /// Evidence could not confirm membership
    Rejected,
}

impl MembershipState {
    /// Whether the role should be held in this state
    #[inline]
    #[must_use]
    pub const fn wants_role(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether a new submission may move this state back to `Pending`
    #[inline]
    #[must_use]
    pub const fn accepts_resubmission(self) -> bool {
        matches!(self, Self::Pending | Self::Expired | Self::Rejected)
    }
}

impl fmt::Display for MembershipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Resolved next billing date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDate {
    /// Calendar date
    pub date: NaiveDate,
    /// False when the year was inferred as the next occurrence
    pub year_known: bool,
}

/// Persisted membership status of a pair
///
/// Only the reconciliation engine mutates these records. `version`
/// is bumped by the store on every committed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipStatus {
    /// Pair this record belongs to
    pub key: PairKey,
    /// Current state
    pub state: MembershipState,
    /// How membership was proven
    pub method: VerificationMethod,
    /// Evidence behind the current state
    pub last_evidence: Option<MembershipEvidence>,
    /// When the last decision was applied
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Next billing date, if the evidence carried one
    pub next_billing_date: Option<BillingDate>,
    /// Whether the role is currently granted on the platform
    pub role_applied: bool,
    /// Optimistic concurrency version
    #[serde(default)]
    pub version: u64,
}

impl MembershipStatus {
    /// Fresh `Pending` record for a first submission
    #[must_use]
    pub fn pending(key: PairKey, method: VerificationMethod) -> Self {
        Self {
            key,
            state: MembershipState::Pending,
            method,
            last_evidence: None,
            last_checked_at: None,
            next_billing_date: None,
            role_applied: false,
            version: 0,
        }
    }
}

/// Cached projection of a Discord role
///
/// Mirrored whenever the platform reports a rename or recolor. Not
/// authoritative for membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRole {
    /// Role id
    pub id: RoleId,
    /// Display name
    pub name: String,
    /// RGB color
    pub color: u32,
}
