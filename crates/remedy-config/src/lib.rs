//! Configuration for the remedy pipeline
//!
//! Loaded from `<home>/config.toml` when present; every field has a
//! hard default so a missing file is never an error. The home directory
//! itself comes from `remedy_utils::paths`.

use remedy_utils::error::ConfigError;
use remedy_utils::paths;
use serde::{Deserialize, Serialize};

/// Tunable knobs for the fix loop, patching, and locking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemedyConfig {
    /// Maximum fix attempts per ticket before escalating
    pub max_retries: u32,
    /// Confidence gate; proposals scoring below this escalate immediately
    pub confidence_threshold: u8,
    /// Confidence assumed when a proposal reports none
    pub default_confidence: u8,
    /// Age after which an orphaned lock is considered stale
    pub lock_ttl_secs: u64,
    /// Wall-clock budget for one external test run
    pub test_timeout_secs: u64,
    /// Wall-clock budget for one external apply-tool invocation
    pub apply_tool_timeout_secs: u64,
    /// Prefix length used when fingerprinting failure output
    pub failure_fingerprint_len: usize,
}

impl Default for RemedyConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            confidence_threshold: 60,
            default_confidence: 75,
            lock_ttl_secs: 3600,
            test_timeout_secs: 300,
            apply_tool_timeout_secs: 30,
            failure_fingerprint_len: 50,
        }
    }
}

impl RemedyConfig {
    /// Load configuration from `<home>/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = paths::remedy_home().join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| ConfigError::InvalidFile {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break loop invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_retries".to_string(),
                value: "0".to_string(),
            });
        }
        if self.confidence_threshold > 100 {
            return Err(ConfigError::InvalidValue {
                key: "confidence_threshold".to_string(),
                value: self.confidence_threshold.to_string(),
            });
        }
        if self.failure_fingerprint_len == 0 {
            return Err(ConfigError::InvalidValue {
                key: "failure_fingerprint_len".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
