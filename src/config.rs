//! Wallet model configuration.

use crate::engine::{Amount, COIN};
use crate::model::WalletModelError;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables of the wallet model. Every field has a default, so partial JSON files are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
	/// Interval of the periodic balance poll
	pub poll_interval_ms: u64,
	/// Flat fee estimate used by the pre-build balance check
	pub transaction_fee: Amount,
	/// Upper bound on waiting for the staker to acknowledge a stop
	pub staking_settle_ms: u64,
	/// Upper bound on steps when walking a change chain back to its funding output
	pub max_change_walk: usize,
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self {
			poll_interval_ms: 250,
			transaction_fee: COIN / 100,
			staking_settle_ms: 1000,
			max_change_walk: 1024,
		}
	}
}

impl ModelConfig {
	pub fn from_json_file(path: &Path) -> Result<Self, WalletModelError> {
		let content = std::fs::read_to_string(path)?;
		let config: ModelConfig = serde_json::from_str(&content).map_err(|e| {
			WalletModelError::ConfigError(format!("Failed to parse {:?}: {}", path, e))
		})?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), WalletModelError> {
		if self.poll_interval_ms == 0 {
			return Err(WalletModelError::ConfigError(
				"poll_interval_ms must be positive".to_string(),
			));
		}
		if self.transaction_fee < 0 {
			return Err(WalletModelError::ConfigError(
				"transaction_fee must not be negative".to_string(),
			));
		}
		if self.max_change_walk == 0 {
			return Err(WalletModelError::ConfigError(
				"max_change_walk must be positive".to_string(),
			));
		}
		Ok(())
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn staking_settle(&self) -> Duration {
		Duration::from_millis(self.staking_settle_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_partial_file_uses_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.json");
		std::fs::write(&path, r#"{ "poll_interval_ms": 500 }"#).unwrap();

		let config = ModelConfig::from_json_file(&path).unwrap();
		assert_eq!(config.poll_interval(), Duration::from_millis(500));
		assert_eq!(config.transaction_fee, ModelConfig::default().transaction_fee);
	}

	#[test]
	fn test_rejects_zero_interval() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("model.json");
		std::fs::write(&path, r#"{ "poll_interval_ms": 0 }"#).unwrap();

		assert!(matches!(
			ModelConfig::from_json_file(&path),
			Err(WalletModelError::ConfigError(_))
		));
	}
}
