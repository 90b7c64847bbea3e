use crate::engine::{Amount, EngineError};

use serde::{Deserialize, Serialize};

/// Last observed aggregate wallet figures.
///
/// Replaced as a whole on every detected change; readers never see a partial update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
	pub spendable: Amount,
	pub stake: Amount,
	pub unconfirmed: Amount,
	pub immature: Amount,
	pub transaction_count: usize,
	pub chain_height: u64,
}

impl BalanceSnapshot {
	pub fn same_amounts(&self, other: &BalanceSnapshot) -> bool {
		self.spendable == other.spendable
			&& self.stake == other.stake
			&& self.unconfirmed == other.unconfirmed
			&& self.immature == other.immature
	}
}

/// What a cache refresh found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
	pub snapshot: BalanceSnapshot,
	pub amounts_changed: bool,
	pub transaction_count_changed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum WalletModelError {
	#[error("Engine error: {0}")]
	Engine(#[from] EngineError),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Configuration error: {0}")]
	ConfigError(String),

	#[error("Missing component: {0}")]
	MissingComponent(&'static str),

	#[error("Some wallets failed to back up: {0:?}")]
	BackupFailed(Vec<String>),

	#[error("Wallet unlock was declined")]
	UnlockDeclined,
}
