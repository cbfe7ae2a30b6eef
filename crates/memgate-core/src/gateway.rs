//! Membership evidence gateway
//!
//! Wraps the two evidence sources behind one call:
//! - Screenshot: OCR the image, then run the locale's date parser
//! - OAuth: decrypt the stored token, then ask the provider
//!
//! The gateway never retries. The engine owns retry policy.

use crate::error::GatewayError;
use crate::evidence::{EvidenceRequest, MembershipEvidence};
use crate::ports::{CredentialStore, MembershipApi, OcrService};
use crate::types::{PairKey, UserId};
use async_trait::async_trait;
use memgate_locale::parse_billing_date;
use memgate_vault::CredentialVault;
use std::sync::Arc;

/// Source of membership evidence for a pair
#[async_trait]
pub trait EvidenceGateway: Send + Sync {
    /// Produce one piece of evidence for `key`
    async fn fetch_evidence(
        &self,
        key: &PairKey,
        request: &EvidenceRequest,
    ) -> Result<MembershipEvidence, GatewayError>;
}

/// Gateway backed by an OCR service and a provider API
pub struct ProviderGateway {
    ocr: Arc<dyn OcrService>,
    api: Arc<dyn MembershipApi>,
    credentials: Arc<dyn CredentialStore>,
    vault: CredentialVault,
}

impl ProviderGateway {
    /// Create a gateway
    #[must_use]
    pub fn new(
        ocr: Arc<dyn OcrService>,
        api: Arc<dyn MembershipApi>,
        credentials: Arc<dyn CredentialStore>,
        vault: CredentialVault,
    ) -> Self {
        Self {
            ocr,
            api,
            credentials,
            vault,
        }
    }

    /// Seal and store an already-issued OAuth refresh token for `user`
    ///
    /// # Errors
    /// Returns [`GatewayError::Vault`] if sealing fails, or
    /// [`GatewayError::Store`] if the write fails
    pub async fn link_oauth_token(&self, user: UserId, refresh_token: &str) -> Result<(), GatewayError> {
        let secret = self.vault.encrypt_str(refresh_token)?;
        self.credentials.put_oauth_token(user, secret).await?;
        tracing::info!(%user, "linked OAuth token");
        Ok(())
    }
}

impl std::fmt::Debug for ProviderGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderGateway").finish_non_exhaustive()
    }
}

#[async_trait]
impl EvidenceGateway for ProviderGateway {
    async fn fetch_evidence(
        &self,
        key: &PairKey,
        request: &EvidenceRequest,
    ) -> Result<MembershipEvidence, GatewayError> {
        match request {
            EvidenceRequest::Screenshot { image, locale } => {
                let lines = self.ocr.recognize(image, *locale).await?;
                let date = parse_billing_date(&lines, *locale);
                tracing::debug!(pair = %key, %locale, lines = lines.len(), %date, "parsed screenshot");
                Ok(MembershipEvidence::ParsedDate(date))
            }
            EvidenceRequest::OAuth { channel_id } => {
                let secret = self
                    .credentials
                    .oauth_token(key.user)
                    .await?
                    .ok_or(GatewayError::MissingCredential(key.user))?;
                let token = self.vault.decrypt_string(&secret)?;
                let member = self.api.check_membership(&token, channel_id).await?;
                tracing::debug!(pair = %key, channel = %channel_id, member, "provider membership check");
                Ok(MembershipEvidence::ApiMembership(member))
            }
        }
    }
}
