//! Sealed secret representation

use crate::error::VaultError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// AES-GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// Ciphertext, nonce and tag of a sealed secret
///
/// The tag is carried at the end of `ciphertext`. Stored form is
/// `nonce || ciphertext || tag`, serialized as lowercase hex.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedSecret {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl EncryptedSecret {
    pub(crate) fn new(nonce: [u8; NONCE_LEN], ciphertext: Vec<u8>) -> Result<Self, VaultError> {
        if ciphertext.len() < TAG_LEN {
            return Err(VaultError::Truncated {
                len: NONCE_LEN + ciphertext.len(),
            });
        }
        Ok(Self { nonce, ciphertext })
    }

    /// Nonce used for this secret
    #[inline]
    #[must_use]
    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Ciphertext with the trailing tag
    #[inline]
    #[must_use]
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Storage encoding: `nonce || ciphertext || tag`
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the storage encoding
    ///
    /// # Errors
    /// Returns [`VaultError::Truncated`] if `bytes` cannot hold a nonce and a tag
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::Truncated { len: bytes.len() });
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce);
        Self::new(nonce_bytes, ciphertext.to_vec())
    }

    /// Hex form of [`EncryptedSecret::to_bytes`]
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse the hex storage form
    ///
    /// # Errors
    /// Returns [`VaultError::Encoding`] on bad hex, otherwise see
    /// [`EncryptedSecret::from_bytes`]
    pub fn from_hex(s: &str) -> Result<Self, VaultError> {
        let bytes = hex::decode(s.trim()).map_err(|e| VaultError::Encoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for EncryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedSecret")
            .field("nonce", &hex::encode(self.nonce))
            .field("len", &self.ciphertext.len())
            .finish()
    }
}

impl Serialize for EncryptedSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EncryptedSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_input_rejected() {
        assert_eq!(
            EncryptedSecret::from_bytes(&[0u8; NONCE_LEN + TAG_LEN - 1]),
            Err(VaultError::Truncated {
                len: NONCE_LEN + TAG_LEN - 1
            })
        );
        assert!(EncryptedSecret::from_bytes(&[]).is_err());
    }

    #[test]
    fn bad_hex_rejected() {
        assert!(matches!(
            EncryptedSecret::from_hex("not-hex"),
            Err(VaultError::Encoding(_))
        ));
    }

    #[test]
    fn serde_uses_hex_string() {
        let secret = EncryptedSecret::from_bytes(&[1u8; NONCE_LEN + TAG_LEN]).unwrap();
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(NONCE_LEN + TAG_LEN)));
        let back: EncryptedSecret = serde_json::from_str(&json).unwrap();
        assert_eq!(back, secret);
    }
}
