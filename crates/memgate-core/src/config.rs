//! Engine configuration
//!
//! Loaded once at startup from TOML and passed explicitly to the engine.
//!
//! ```toml
//! sweep_concurrency = 16
//! log_filter = "memgate=debug,info"
//!
//! [retry]
//! max_attempts = 5
//! base_delay_ms = 200
//! ```

use crate::error::ConfigError;
use memgate_vault::VaultKey;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable consulted when `vault_key_hex` is unset
pub const VAULT_KEY_ENV: &str = "MEMGATE_VAULT_KEY";

/// Retry and timeout settings for external calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per call, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay_ms: u64,
    /// Backoff ceiling
    pub max_delay_ms: u64,
    /// Timeout for a single call
    pub call_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
            call_timeout_ms: 15_000,
        }
    }
}

impl RetryConfig {
    /// Timeout for a single call
    #[inline]
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// memgate configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Retry policy for OCR, provider, role and store calls
    pub retry: RetryConfig,
    /// Concurrent pairs during a recheck sweep
    pub sweep_concurrency: usize,
    /// Max cached role projections
    pub role_cache_capacity: u64,
    /// Hex vault key; falls back to `MEMGATE_VAULT_KEY`
    pub vault_key_hex: Option<String>,
    /// Default tracing filter
    pub log_filter: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            sweep_concurrency: 8,
            role_cache_capacity: 10_000,
            vault_key_hex: None,
            log_filter: "info".to_string(),
            log_json: false,
        }
    }
}

impl GateConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With retry settings
    #[inline]
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// With sweep concurrency
    #[inline]
    #[must_use]
    pub fn with_sweep_concurrency(mut self, n: usize) -> Self {
        self.sweep_concurrency = n;
        self
    }

    /// With an explicit vault key
    #[inline]
    #[must_use]
    pub fn with_vault_key(mut self, key: &VaultKey) -> Self {
        self.vault_key_hex = Some(key.to_hex());
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise
    /// see [`GateConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject settings that would stall or disable the engine
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("retry.call_timeout_ms must be positive".into()));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms must not be below retry.base_delay_ms".into(),
            ));
        }
        if self.sweep_concurrency == 0 {
            return Err(ConfigError::Invalid("sweep_concurrency must be at least 1".into()));
        }
        if self.role_cache_capacity == 0 {
            return Err(ConfigError::Invalid("role_cache_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// The vault key from config, or from `MEMGATE_VAULT_KEY`
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingVaultKey`] if neither is set, or
    /// [`ConfigError::VaultKey`] if the key is malformed
    pub fn vault_key(&self) -> Result<VaultKey, ConfigError> {
        let hex = match &self.vault_key_hex {
            Some(hex) => hex.clone(),
            None => std::env::var(VAULT_KEY_ENV).map_err(|_| ConfigError::MissingVaultKey)?,
        };
        Ok(VaultKey::from_hex(&hex)?)
    }
}
