//! The wallet model facade.
//!
//! `WalletModel` is what the presentation layer talks to. Reads that only need one engine value go
//! straight to the engine, which is internally synchronized. Anything that needs a consistent view
//! across several reads or writes takes the chain lock and then the wallet lock. Periodic change
//! detection lives in the [`SyncDriver`] obtained from [`WalletModel::sync_driver`].

use crate::config::ModelConfig;
use crate::engine::{
	Amount, ChainLock, CoinFilter, EncryptionState, EngineError, OutPoint, Passphrase,
	SpentCoinReport, StakeForCharity, StakeWeight, WalletEngine, WalletManager, WalletOutput,
};
use crate::model::driver::SyncDriver;
use crate::model::events::EventSink;
use crate::model::grouping::OutputGrouper;
use crate::model::types::WalletModelError;
use crate::model::unlock::{self, UnlockContext, UnlockRequester, cycle_staking};
use crate::transaction::{FeeConfirmer, PaymentRequest, SendOutcome, SendPipeline, available_balance};

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Settings store key for a charity destination.
fn charity_key(address: &str) -> String {
	format!("stakeforcharity/{}", address)
}

pub struct WalletModel {
	pub(crate) engine: Arc<dyn WalletEngine>,
	pub(crate) manager: Arc<dyn WalletManager>,
	pub(crate) chain: ChainLock,
	pub(crate) config: ModelConfig,
	pub(crate) pipeline: SendPipeline,
	pub(crate) unlock_requester: Arc<dyn UnlockRequester>,
	pub(crate) fee_confirmer: Arc<dyn FeeConfirmer>,
	pub(crate) events: EventSink,
	pub(crate) locked_outputs: Mutex<BTreeSet<OutPoint>>,
}

impl WalletModel {
	pub fn engine(&self) -> &Arc<dyn WalletEngine> {
		&self.engine
	}

	pub fn config(&self) -> &ModelConfig {
		&self.config
	}

	/// A new driver wired to this model's engine, chain lock and event sink.
	pub fn sync_driver(&self) -> SyncDriver {
		SyncDriver::new(
			self.engine.clone(),
			self.manager.clone(),
			self.chain.clone(),
			self.events.clone(),
			&self.config,
		)
	}

	// Balances

	/// Spendable balance, or the value of the outputs `filter` admits.
	pub fn balance(&self, filter: Option<&CoinFilter>) -> Amount {
		available_balance(self.engine.as_ref(), filter)
	}

	pub fn total_balance(&self) -> Amount {
		self.manager.total_balance()
	}

	pub fn unconfirmed_balance(&self) -> Amount {
		self.engine.unconfirmed_balance()
	}

	pub fn stake(&self) -> Amount {
		self.engine.stake_amount()
	}

	pub fn immature_balance(&self) -> Amount {
		self.engine.immature_balance()
	}

	pub fn reserve_balance(&self) -> Amount {
		self.engine.reserve_balance()
	}

	pub fn transaction_count(&self) -> usize {
		self.engine.transaction_count()
	}

	pub fn wallet_version(&self) -> i32 {
		self.engine.version()
	}

	pub fn validate_address(&self, address: &str) -> bool {
		self.engine.validate_address(address)
	}

	pub fn is_mine(&self, address: &str) -> bool {
		self.engine.is_mine(address)
	}

	// Sending

	pub fn transaction_fee(&self) -> Amount {
		self.pipeline.fee_estimate()
	}

	pub fn set_transaction_fee(&mut self, fee: Amount) {
		self.config.transaction_fee = fee;
		self.pipeline.set_fee_estimate(fee);
	}

	/// Pay every request in one transaction. Locked outputs are never spent.
	///
	/// An encrypted wallet must be unlocked for the whole call: hold the context returned by
	/// [`WalletModel::request_unlock`] across it, or use [`WalletModel::send_coins_unlocked`].
	/// Against a locked wallet the build fails with [`crate::transaction::SendError::TransactionCreationFailed`].
	pub async fn send_coins(
		&self,
		requests: &[PaymentRequest],
		filter: Option<&CoinFilter>,
	) -> SendOutcome {
		let locked = self.list_locked_coins();
		let merged = if locked.is_empty() {
			filter.cloned()
		} else {
			Some(filter.cloned().unwrap_or_default().with_excluded(locked))
		};
		self.pipeline
			.send(requests, merged.as_ref(), self.fee_confirmer.as_ref())
			.await
	}

	/// Request an unlock, then send while the scope is held. A declined unlock sends nothing.
	pub async fn send_coins_unlocked(
		&self,
		requests: &[PaymentRequest],
		filter: Option<&CoinFilter>,
	) -> Result<SendOutcome, WalletModelError> {
		let context = self.request_unlock().await;
		if !context.is_valid() {
			info!("Unlock declined, payment not sent");
			return Err(WalletModelError::UnlockDeclined);
		}
		let outcome = self.send_coins(requests, filter).await;
		drop(context);
		Ok(outcome)
	}

	// Encryption

	pub fn encryption_state(&self) -> EncryptionState {
		unlock::encryption_state(self.engine.as_ref())
	}

	/// Encrypt the wallet. Decryption is not supported.
	pub fn set_wallet_encrypted(&self, encrypted: bool, passphrase: &Passphrase) -> bool {
		if !encrypted {
			warn!("Wallet decryption is not supported");
			return false;
		}
		self.engine.encrypt(passphrase)
	}

	/// Lock or unlock the wallet.
	///
	/// `for_staking` on lock stops the staker before it may run again; on unlock it leaves the
	/// wallet decrypted for staking only and lets the staker start.
	pub async fn set_wallet_locked(
		&self,
		locked: bool,
		passphrase: Option<&Passphrase>,
		for_staking: bool,
	) -> bool {
		if locked {
			let locked = self.engine.lock();
			if for_staking {
				cycle_staking(self.manager.as_ref(), self.config.staking_settle()).await;
			}
			return locked;
		}

		let Some(passphrase) = passphrase else {
			warn!("Unlock requested without a passphrase");
			return false;
		};
		let unlocked = self.engine.unlock(passphrase, for_staking);
		if unlocked && for_staking {
			info!("Wallet {} unlocked for staking", self.engine.name());
			self.manager.staking().restart();
		}
		unlocked
	}

	pub async fn change_passphrase(&self, old: &Passphrase, new: &Passphrase) -> bool {
		let _wallet = self.engine.state_lock().lock().await;
		self.engine.lock();
		self.engine.change_passphrase(old, new)
	}

	/// Make sure the wallet is unlocked for one operation; see [`unlock::request_unlock`].
	pub async fn request_unlock(&self) -> UnlockContext {
		unlock::request_unlock(
			&self.engine,
			self.manager.as_ref(),
			self.unlock_requester.as_ref(),
			&self.events,
			self.config.staking_settle(),
		)
		.await
	}

	// Backups

	pub fn backup_wallet(&self, destination: &Path) -> Result<(), WalletModelError> {
		self.engine.backup(destination)?;
		Ok(())
	}

	/// Back up every loaded wallet into `directory`, one file per wallet name.
	///
	/// Every wallet is attempted; the error lists the ones that failed.
	pub fn backup_all_wallets(&self, directory: &Path) -> Result<(), WalletModelError> {
		let mut failed = Vec::new();
		for wallet in self.manager.wallets() {
			let destination = directory.join(wallet.name());
			if let Err(e) = wallet.backup(&destination) {
				error!("Backup of wallet {} failed: {}", wallet.name(), e);
				failed.push(wallet.name().to_string());
			}
		}
		if failed.is_empty() {
			Ok(())
		} else {
			Err(WalletModelError::BackupFailed(failed))
		}
	}

	pub fn dump_wallet(&self, path: &Path) -> Result<(), WalletModelError> {
		self.engine.dump_to_file(path)?;
		Ok(())
	}

	pub fn import_wallet(&self, path: &Path) -> Result<(), WalletModelError> {
		self.engine.import_from_file(path)?;
		Ok(())
	}

	// Staking

	pub fn stake_for_charity(&self) -> StakeForCharity {
		self.engine.stake_for_charity()
	}

	pub async fn set_stake_for_charity(
		&self,
		settings: StakeForCharity,
	) -> Result<(), WalletModelError> {
		if let Some(store) = self.engine.settings_store() {
			// New entry before erasing the old one.
			if let Some(address) = settings.address.as_deref() {
				if settings.enabled {
					let value = serde_json::to_value(&settings)
						.map_err(|e| EngineError::Serialization(e.to_string()))?;
					store.write_entry(&charity_key(address), value)?;
				} else {
					store.erase_entry(&charity_key(address))?;
				}
			}
			let previous = self.engine.stake_for_charity();
			match previous.address.as_deref() {
				Some(address) if previous.address != settings.address => {
					store.erase_entry(&charity_key(address))?;
				}
				_ => {}
			}
		} else {
			debug!("Wallet {} has no settings store", self.engine.name());
		}

		let _wallet = self.engine.state_lock().lock().await;
		self.engine.set_stake_for_charity(settings);
		Ok(())
	}

	/// Stake weight, or `None` if either lock is busy.
	pub fn stake_weight(&self) -> Option<StakeWeight> {
		let _chain = self.chain.try_lock().ok()?;
		let _wallet = self.engine.state_lock().try_lock().ok()?;
		Some(self.engine.stake_weight())
	}

	pub fn total_stake_weight(&self) -> u64 {
		self.manager.total_stake_weight()
	}

	pub fn stake_weight_from_value(&self, time: i64, value: Amount) -> u64 {
		self.engine.stake_weight_from_value(time, value)
	}

	// Maintenance

	pub fn check_wallet(&self) -> SpentCoinReport {
		self.engine.fix_spent_coins(true)
	}

	pub fn repair_wallet(&self) -> SpentCoinReport {
		self.engine.fix_spent_coins(false)
	}

	// Outputs

	/// Resolve outpoints against the wallet's own record. Unknown and conflicted ones are skipped.
	pub async fn outputs(&self, outpoints: &[OutPoint]) -> Vec<WalletOutput> {
		let _chain = self.chain.lock().await;
		let _wallet = self.engine.state_lock().lock().await;
		outpoints
			.iter()
			.filter_map(|outpoint| {
				let tx = self.engine.transaction(&outpoint.txid)?;
				if tx.depth < 0 {
					return None;
				}
				let depth = tx.depth;
				Some(WalletOutput::new(tx, outpoint.vout, depth))
			})
			.collect()
	}

	/// Spendable and locked outputs grouped by the address that funded them.
	pub async fn list_coins(&self) -> BTreeMap<String, Vec<WalletOutput>> {
		let locked = self.locked_outputs().clone();
		let _chain = self.chain.lock().await;
		let _wallet = self.engine.state_lock().lock().await;
		OutputGrouper::new(self.engine.as_ref(), self.config.max_change_walk).group_by_address(&locked)
	}

	fn locked_outputs(&self) -> MutexGuard<'_, BTreeSet<OutPoint>> {
		self.locked_outputs
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}

	/// Exclude an output from sends until it is unlocked. Returns false if it was already locked.
	pub fn lock_coin(&self, outpoint: OutPoint) -> bool {
		self.locked_outputs().insert(outpoint)
	}

	pub fn unlock_coin(&self, outpoint: &OutPoint) -> bool {
		self.locked_outputs().remove(outpoint)
	}

	pub fn is_locked_coin(&self, outpoint: &OutPoint) -> bool {
		self.locked_outputs().contains(outpoint)
	}

	pub fn list_locked_coins(&self) -> Vec<OutPoint> {
		self.locked_outputs().iter().copied().collect()
	}
}
