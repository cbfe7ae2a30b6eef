//! Credential vault
//!
//! Symmetric, authenticated encryption of opaque secrets (OAuth refresh
//! tokens) for storage at rest. AES-256-GCM with a fresh random 96-bit
//! nonce per call, so encrypting the same plaintext twice never yields
//! the same ciphertext.
//!
//! Decryption fails closed: a wrong key, a flipped bit or a truncated blob
//! all produce [`VaultError::Decryption`] or [`VaultError::Truncated`] and
//! never any plaintext.
//!
//! # Example
//!
//! ```rust
//! use memgate_vault::{CredentialVault, VaultKey};
//!
//! let vault = CredentialVault::new(&VaultKey::generate());
//! let secret = vault.encrypt(b"refresh-token").unwrap();
//! assert_eq!(vault.decrypt(&secret).unwrap(), b"refresh-token");
//! ```

#![warn(unreachable_pub)]

mod error;
mod secret;

pub use error::VaultError;
pub use secret::{EncryptedSecret, NONCE_LEN, TAG_LEN};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use std::fmt;

/// Key length in bytes
pub const KEY_LEN: usize = 32;

/// A 256-bit vault key
///
/// Loaded once at startup from configuration. `Debug` never prints the
/// key material.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultKey([u8; KEY_LEN]);

impl VaultKey {
    /// Wrap raw key bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate a key from the OS random source
    #[must_use]
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(key.as_slice());
        Self(bytes)
    }

    /// Parse a 64-character hex key
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidKey`] on bad hex or wrong length
    pub fn from_hex(s: &str) -> Result<Self, VaultError> {
        let raw = hex::decode(s.trim()).map_err(|e| VaultError::InvalidKey(e.to_string()))?;
        let bytes: [u8; KEY_LEN] = raw.try_into().map_err(|v: Vec<u8>| {
            VaultError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Hex encoding of the key
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(..)")
    }
}

/// Encrypts and decrypts secrets under a single active key
#[derive(Clone)]
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl CredentialVault {
    /// Create a vault for `key`
    #[must_use]
    pub fn new(key: &VaultKey) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0)),
        }
    }

    /// Encrypt `plaintext` under a fresh random nonce
    ///
    /// # Errors
    /// Returns [`VaultError::Encryption`] if the cipher rejects the input
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedSecret, VaultError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| VaultError::Encryption)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce.as_slice());
        EncryptedSecret::new(nonce_bytes, ciphertext)
    }

    /// Decrypt and authenticate a secret
    ///
    /// # Errors
    /// Returns [`VaultError::Decryption`] on tag mismatch or wrong key
    pub fn decrypt(&self, secret: &EncryptedSecret) -> Result<Vec<u8>, VaultError> {
        self.cipher
            .decrypt(Nonce::from_slice(secret.nonce()), secret.ciphertext())
            .map_err(|_| VaultError::Decryption)
    }

    /// Encrypt a UTF-8 token
    ///
    /// # Errors
    /// See [`CredentialVault::encrypt`]
    pub fn encrypt_str(&self, plaintext: &str) -> Result<EncryptedSecret, VaultError> {
        self.encrypt(plaintext.as_bytes())
    }

    /// Decrypt a secret that must hold a UTF-8 token
    ///
    /// # Errors
    /// Returns [`VaultError::NotUtf8`] if the authenticated plaintext is
    /// not valid UTF-8, otherwise see [`CredentialVault::decrypt`]
    pub fn decrypt_string(&self, secret: &EncryptedSecret) -> Result<String, VaultError> {
        String::from_utf8(self.decrypt(secret)?).map_err(|_| VaultError::NotUtf8)
    }
}

impl fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}
