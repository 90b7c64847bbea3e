//! Wallet engine boundary.
//!
//! The wallet engine owns keys, the transaction record and coin selection. This subsystem only
//! talks to it through the [`WalletEngine`] trait and to the set of loaded wallets through
//! [`WalletManager`]. Engines are internally synchronized; the coarse per-wallet lock returned by
//! [`WalletEngine::state_lock`] is a coordination lock taken after the global chain lock whenever
//! several reads or writes must be consistent with each other.

/// Bech32m address codec
pub mod address;
/// In-memory engine used by the demo binary and the tests
pub mod memory;
/// Staking start/stop coordination
pub mod staking;
/// Engine data types
pub mod types;

pub use address::{AddressError, WalletAddress};
pub use memory::{MemorySettingsStore, MemoryWallet, MemoryWalletManager, MemoryWalletPolicy};
pub use staking::StakingControl;
pub use types::*;

use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc::UnboundedSender};

/// The global chain-state lock. Always acquired before any wallet lock.
pub type ChainLock = Arc<Mutex<ChainState>>;

/// Key/value store backing a wallet file.
pub trait SettingsStore: Send + Sync {
	fn write_entry(&self, key: &str, value: serde_json::Value) -> Result<(), EngineError>;
	fn erase_entry(&self, key: &str) -> Result<(), EngineError>;
}

/// Operations consumed from the wallet engine.
pub trait WalletEngine: Send + Sync {
	/// Wallet file name, unique among loaded wallets
	fn name(&self) -> &str;

	/// The per-wallet coordination lock.
	fn state_lock(&self) -> &Mutex<()>;

	fn balance(&self) -> Amount;
	fn unconfirmed_balance(&self) -> Amount;
	fn stake_amount(&self) -> Amount;
	fn immature_balance(&self) -> Amount;
	fn reserve_balance(&self) -> Amount;
	fn transaction_count(&self) -> usize;
	fn version(&self) -> i32;

	fn is_encrypted(&self) -> bool;
	fn is_locked(&self) -> bool;
	/// Decrypted for staking only; spending still requires a full unlock.
	fn is_unlocked_for_staking_only(&self) -> bool;
	fn lock(&self) -> bool;
	fn unlock(&self, passphrase: &Passphrase, staking_only: bool) -> bool;
	fn change_passphrase(&self, old: &Passphrase, new: &Passphrase) -> bool;
	fn encrypt(&self, passphrase: &Passphrase) -> bool;

	fn validate_address(&self, address: &str) -> bool;
	fn is_mine(&self, address: &str) -> bool;

	/// Unspent outputs that are confirmed enough to spend, restricted by `filter` when given.
	fn available_outputs(&self, filter: Option<&CoinFilter>) -> Vec<WalletOutput>;
	fn transaction(&self, txid: &TxId) -> Option<Arc<WalletTx>>;
	fn is_change_output(&self, output: &TxOut) -> bool;
	fn is_owned_input(&self, input: &TxIn) -> bool;

	fn create_transaction(
		&self,
		recipients: &[(String, Amount)],
		filter: Option<&CoinFilter>,
	) -> Result<PendingTransaction, BuildFailure>;
	fn commit_transaction(&self, pending: PendingTransaction) -> bool;

	fn address_book_entry(&self, address: &str) -> Option<String>;
	fn set_address_book_entry(&self, address: &str, label: &str) -> bool;

	fn backup(&self, destination: &Path) -> Result<(), EngineError>;
	fn dump_to_file(&self, path: &Path) -> Result<(), EngineError>;
	fn import_from_file(&self, path: &Path) -> Result<(), EngineError>;

	fn stake_weight(&self) -> StakeWeight;
	fn stake_weight_from_value(&self, time: i64, value: Amount) -> u64;
	fn fix_spent_coins(&self, report_only: bool) -> SpentCoinReport;

	fn stake_for_charity(&self) -> StakeForCharity;
	fn set_stake_for_charity(&self, settings: StakeForCharity);
	/// Backing store, absent for wallets that are not file backed.
	fn settings_store(&self) -> Option<&dyn SettingsStore>;

	fn subscribe(&self, sink: UnboundedSender<EngineNotification>) -> SubscriptionId;
	fn unsubscribe(&self, id: SubscriptionId);
}

/// Collaborator managing every loaded wallet.
pub trait WalletManager: Send + Sync {
	fn wallets(&self) -> Vec<Arc<dyn WalletEngine>>;

	fn staking(&self) -> &StakingControl;

	/// Sum of `balance()` across every loaded wallet.
	fn total_balance(&self) -> Amount {
		self.wallets().iter().map(|w| w.balance()).sum()
	}

	/// Sum of current stake weight across every loaded wallet.
	fn total_stake_weight(&self) -> u64 {
		self.wallets().iter().map(|w| w.stake_weight().current).sum()
	}
}
