//! Configuration for mek-verify.

use crate::indexer::{
    BlockfrostConfig, KoiosConfig, DEFAULT_BLOCKFROST_URL, DEFAULT_KOIOS_URL,
    DEFAULT_PROVIDER_TIMEOUT, MEK_POLICY_ID,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the Blockfrost key.
pub const BLOCKFROST_API_KEY_ENV: &str = "BLOCKFROST_API_KEY";

/// Verifier configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Collection policy id.
    pub policy_id: String,

    /// Log level.
    pub log_level: String,

    /// Hold a per-identity lock for the whole verification call.
    pub serialize_per_identity: bool,

    /// Rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Result cache.
    pub cache: CacheConfig,

    /// Batch driver.
    pub batch: BatchConfig,

    /// Primary indexer (Blockfrost).
    pub primary: PrimaryConfig,

    /// Secondary indexer (Koios).
    pub secondary: SecondaryConfig,
}

/// Fixed-window rate limit configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub limit: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Freshness window in milliseconds.
    pub ttl_ms: u64,
    /// Maximum identities held.
    pub capacity: usize,
}

/// Batch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pause between identities in milliseconds.
    pub delay_ms: u64,
}

/// Blockfrost provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimaryConfig {
    /// Query Blockfrost at all.
    pub enabled: bool,
    /// API root.
    pub base_url: String,
    /// API key. `BLOCKFROST_API_KEY` is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Query deadline in milliseconds.
    pub timeout_ms: u64,
    /// Use the payment address hint when the stake account is empty.
    pub use_address_hint: bool,
    /// Page limit per address.
    pub max_pages: usize,
}

/// Koios provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecondaryConfig {
    /// Query Koios at all.
    pub enabled: bool,
    /// API root.
    pub base_url: String,
    /// Query deadline in milliseconds.
    pub timeout_ms: u64,
    /// Use the payment address hint when the stake account is empty.
    pub use_address_hint: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            policy_id: MEK_POLICY_ID.to_string(),
            log_level: default_log_level(),
            serialize_per_identity: false,
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            batch: BatchConfig::default(),
            primary: PrimaryConfig::default(),
            secondary: SecondaryConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            window_ms: 60_000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 300_000,
            capacity: 100_000,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { delay_ms: 100 }
    }
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_BLOCKFROST_URL.to_string(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            use_address_hint: true,
            max_pages: 50,
        }
    }
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_KOIOS_URL.to_string(),
            timeout_ms: default_timeout_ms(),
            use_address_hint: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_PROVIDER_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

/// Default location of the config file.
#[must_use]
pub fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "mek-verify")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("mek-verify.toml"))
}

impl VerifierConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Fill the Blockfrost key from `BLOCKFROST_API_KEY` if the file left it unset.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if self.primary.api_key.is_none() {
            self.primary.api_key = std::env::var(BLOCKFROST_API_KEY_ENV)
                .ok()
                .filter(|key| !key.is_empty());
        }
        self
    }

    /// Check values that would make the verifier unusable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first bad value.
    pub fn validate(&self) -> crate::Result<()> {
        if self.policy_id.len() != 56 || hex::decode(&self.policy_id).is_err() {
            return Err(crate::Error::Config(format!(
                "policy_id must be 56 hex characters, got {:?}",
                self.policy_id
            )));
        }
        if self.rate_limit.limit == 0 || self.rate_limit.window_ms == 0 {
            return Err(crate::Error::Config(
                "rate_limit.limit and rate_limit.window_ms must be positive".to_string(),
            ));
        }
        if self.cache.capacity == 0 {
            return Err(crate::Error::Config(
                "cache.capacity must be positive".to_string(),
            ));
        }
        if self.primary.enabled && self.primary.max_pages == 0 {
            return Err(crate::Error::Config(
                "primary.max_pages must be positive".to_string(),
            ));
        }
        if !self.primary.enabled && !self.secondary.enabled {
            return Err(crate::Error::Config(
                "at least one indexer provider must be enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Rate limit window.
    #[must_use]
    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit.window_ms)
    }

    /// Cache freshness window.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }

    /// Delay between batch entries.
    #[must_use]
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch.delay_ms)
    }

    /// Settings for the Blockfrost provider.
    #[must_use]
    pub fn blockfrost(&self) -> BlockfrostConfig {
        BlockfrostConfig {
            base_url: self.primary.base_url.clone(),
            api_key: self.primary.api_key.clone(),
            timeout: Duration::from_millis(self.primary.timeout_ms),
            use_address_hint: self.primary.use_address_hint,
            max_pages: self.primary.max_pages,
            policy_id: self.policy_id.clone(),
        }
    }

    /// Settings for the Koios provider.
    #[must_use]
    pub fn koios(&self) -> KoiosConfig {
        KoiosConfig {
            base_url: self.secondary.base_url.clone(),
            timeout: Duration::from_millis(self.secondary.timeout_ms),
            use_address_hint: self.secondary.use_address_hint,
            policy_id: self.policy_id.clone(),
        }
    }
}
