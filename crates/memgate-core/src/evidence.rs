//! Membership evidence
//!
//! A single piece of input used to justify a membership decision, and the
//! request that asks the gateway to produce one.

use crate::types::VerificationMethod;
use memgate_locale::{Locale, RecognizedDate};
use serde::{Deserialize, Serialize};

/// Evidence produced by one verification attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MembershipEvidence {
    /// Billing date read from an OCR'd screenshot
    ParsedDate(RecognizedDate),
    /// Membership flag reported by the provider API
    ApiMembership(bool),
}

/// What the gateway should fetch
#[derive(Clone, PartialEq, Eq)]
pub enum EvidenceRequest {
    /// Screenshot of a billing page
    Screenshot {
        /// Raw image bytes
        image: Vec<u8>,
        /// OCR locale
        locale: Locale,
    },
    /// Provider check with the user's stored OAuth token
    OAuth {
        /// Provider channel to check
        channel_id: String,
    },
}

impl EvidenceRequest {
    /// The verification method this request records
    #[must_use]
    pub fn method(&self) -> VerificationMethod {
        match self {
            Self::Screenshot { locale, .. } => VerificationMethod::Screenshot { locale: *locale },
            Self::OAuth { channel_id } => VerificationMethod::OAuth {
                channel_id: channel_id.clone(),
            },
        }
    }
}

impl std::fmt::Debug for EvidenceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Screenshot { image, locale } => f
                .debug_struct("Screenshot")
                .field("bytes", &image.len())
                .field("locale", locale)
                .finish(),
            Self::OAuth { channel_id } => f
                .debug_struct("OAuth")
                .field("channel_id", channel_id)
                .finish(),
        }
    }
}
