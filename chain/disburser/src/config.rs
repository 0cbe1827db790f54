//! Engine configuration
//!
//! Loaded from JSON; missing fields take their defaults.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::ConfigError;
use crate::leaf::LeafFormat;

/// What happens to a claim's nonce when the transfer after it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoncePolicy {
    /// Nonce stays consumed only if the transfer succeeds; a failed claim
    /// leaves the engine unchanged and can be retried.
    #[default]
    ConsumeOnSuccess,
    /// Nonce is consumed before the transfer and never released, so a
    /// failed transfer strands the payout.
    ConsumeBeforeTransfer,
}

/// Configuration for the disbursement engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisburserConfig {
    pub nonce_policy: NoncePolicy,
    /// Must match the format the batch authority built the tree with
    pub leaf_format: LeafFormat,
}

impl DisburserConfig {
    /// Single-vault compact leaves with irrevocable nonce consumption.
    pub fn observed() -> Self {
        Self {
            nonce_policy: NoncePolicy::ConsumeBeforeTransfer,
            leaf_format: LeafFormat::Compact,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        info!(
            nonce_policy = ?config.nonce_policy,
            leaf_format = ?config.leaf_format,
            "Disburser configuration loaded"
        );
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
