//! Vault error types

/// Credential vault errors
///
/// None of these variants carry plaintext or key material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    /// Key is not valid hex or not 32 bytes
    #[error("invalid vault key: {0}")]
    InvalidKey(String),

    /// Encrypted blob is shorter than nonce plus tag
    #[error("encrypted secret truncated: {len} bytes")]
    Truncated {
        /// Length of the rejected input
        len: usize,
    },

    /// Encoded secret is not valid hex
    #[error("invalid secret encoding: {0}")]
    Encoding(String),

    /// Cipher refused to encrypt
    #[error("encryption failed")]
    Encryption,

    /// Authentication failed: wrong key or tampered ciphertext
    #[error("decryption failed: secret is tampered or was sealed with another key")]
    Decryption,

    /// Plaintext authenticated but is not UTF-8
    #[error("decrypted secret is not valid UTF-8")]
    NotUtf8,
}
