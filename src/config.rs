//! Keygate configuration.

use crate::KeygateError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// How the HWID is established at validation time.
///
/// The two deployments of the original system disagreed on this, so the
/// policy is an explicit configuration choice rather than an implicit one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HwidPolicy {
    /// The caller supplies the HWID alongside the key; no prior key request
    /// is required. This matches the original deployment.
    #[default]
    Permissive,

    /// The HWID bound at request time is authoritative. Validation fails if
    /// the user never requested a key, or if a supplied HWID disagrees with
    /// the bound one.
    StrictBinding,
}

/// Configuration for a keygate deployment.
///
/// Deserializable from a JSON config document; every knob except the provider
/// endpoints and credential has a sensible default.
#[derive(Debug, Clone, Deserialize)]
pub struct KeygateConfig {
    /// Checkpoint endpoint users are sent to in order to obtain a key.
    pub checkpoint_url: String,

    /// Remote key validation endpoint.
    pub validation_url: String,

    /// Credential for the validation endpoint. Sent as a bearer header on
    /// the primary transport and inline in the body on the fallback.
    pub api_key: String,

    /// Timezone label attached to generated checkpoint links, if any.
    #[serde(default)]
    pub zone: Option<String>,

    /// User-Agent for provider requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Shared timeout budget across both validation transports, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long a validated key remains active, in hours.
    #[serde(default = "default_validity_hours")]
    pub key_validity_hours: i64,

    /// Minimum accepted HWID length.
    #[serde(default = "default_min_hwid_len")]
    pub min_hwid_len: usize,

    /// HWID policy at validation time.
    #[serde(default)]
    pub hwid_policy: HwidPolicy,

    /// Path of the persisted key store. Defaults to
    /// `<data_dir>/keygate/store.json` when unset.
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

fn default_user_agent() -> String {
    format!("keygate/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_validity_hours() -> i64 {
    24
}

fn default_min_hwid_len() -> usize {
    5
}

impl KeygateConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, KeygateError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| KeygateError::ConfigError(format!("Failed to read config: {}", e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| KeygateError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for obvious errors.
    ///
    /// Malformed endpoints are a fatal startup error, never a runtime one.
    pub fn validate(&self) -> Result<(), KeygateError> {
        Url::parse(&self.checkpoint_url)
            .map_err(|e| KeygateError::ConfigError(format!("Bad checkpoint_url: {}", e)))?;
        Url::parse(&self.validation_url)
            .map_err(|e| KeygateError::ConfigError(format!("Bad validation_url: {}", e)))?;
        if self.api_key.is_empty() {
            return Err(KeygateError::ConfigError(
                "api_key cannot be empty".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(KeygateError::ConfigError(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.key_validity_hours <= 0 {
            return Err(KeygateError::ConfigError(
                "key_validity_hours must be positive".to_string(),
            ));
        }
        if self.min_hwid_len == 0 {
            return Err(KeygateError::ConfigError(
                "min_hwid_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the key store path, defaulting under the platform data dir.
    pub fn resolved_store_path(&self) -> Result<PathBuf, KeygateError> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        let base = dirs::data_dir()
            .ok_or_else(|| KeygateError::ConfigError("Could not find data directory".to_string()))?;
        Ok(base.join("keygate").join("store.json"))
    }

    /// Key validity window as a chrono duration.
    pub fn validity_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.key_validity_hours)
    }
}
