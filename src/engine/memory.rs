//! In-memory wallet engine.
//!
//! `MemoryWallet` keeps its whole transaction record in memory and implements just enough
//! wallet semantics (trusted balances, maturity, greedy coin selection with a per-kilobyte fee,
//! reserved change keys, encryption flags) to drive the wallet model end to end. It is used by the
//! demo binary and by the test suite.

use crate::engine::address::WalletAddress;
use crate::engine::staking::StakingControl;
use crate::engine::types::*;
use crate::engine::{SettingsStore, WalletEngine, WalletManager};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::{Mutex, mpsc::UnboundedSender};
use tracing::{debug, info, warn};

/// Fee, maturity and staking parameters of a [`MemoryWallet`].
#[derive(Debug, Clone)]
pub struct MemoryWalletPolicy {
	pub fee_per_kb: Amount,
	/// Confirmations before generated outputs can be spent.
	pub maturity: i32,
	/// Smallest output value the wallet will create.
	pub dust_threshold: Amount,
	pub min_stake_age_secs: i64,
	pub max_stake_age_secs: i64,
}

impl Default for MemoryWalletPolicy {
	fn default() -> Self {
		Self {
			fee_per_kb: COIN / 100,
			maturity: 10,
			dust_threshold: COIN / 1000,
			min_stake_age_secs: 8 * 60 * 60,
			max_stake_age_secs: 90 * 24 * 60 * 60,
		}
	}
}

/// Settings store kept in memory, standing in for the wallet file.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
	entries: StdMutex<BTreeMap<String, serde_json::Value>>,
	read_only: AtomicBool,
}

impl MemorySettingsStore {
	/// Reject every write until cleared, as for a wallet file on a read-only volume.
	pub fn set_read_only(&self, read_only: bool) {
		self.read_only.store(read_only, Ordering::SeqCst);
	}

	fn check_writable(&self) -> Result<(), EngineError> {
		if self.read_only.load(Ordering::SeqCst) {
			return Err(EngineError::Io(std::io::Error::new(
				std::io::ErrorKind::PermissionDenied,
				"settings store is read-only",
			)));
		}
		Ok(())
	}

	pub fn entries(&self) -> BTreeMap<String, serde_json::Value> {
		self.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}
}

impl SettingsStore for MemorySettingsStore {
	fn write_entry(&self, key: &str, value: serde_json::Value) -> Result<(), EngineError> {
		self.check_writable()?;
		self.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.insert(key.to_string(), value);
		Ok(())
	}

	fn erase_entry(&self, key: &str) -> Result<(), EngineError> {
		self.check_writable()?;
		self.entries
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(key);
		Ok(())
	}
}

/// Serialized form written by [`WalletEngine::backup`].
#[derive(Serialize, Deserialize)]
struct WalletImage {
	name: String,
	version: i32,
	keys: BTreeSet<String>,
	address_book: BTreeMap<String, String>,
	transactions: Vec<WalletTx>,
	spent: BTreeSet<OutPoint>,
}

/// Human readable key export written by [`WalletEngine::dump_to_file`].
#[derive(Serialize, Deserialize)]
struct KeyDump {
	created: String,
	keys: Vec<String>,
	address_book: BTreeMap<String, String>,
}

#[derive(Default)]
struct Inner {
	transactions: BTreeMap<TxId, Arc<WalletTx>>,
	spent: BTreeSet<OutPoint>,
	keys: BTreeSet<String>,
	address_book: BTreeMap<String, String>,
	passphrase: Option<Passphrase>,
	locked: bool,
	staking_only: bool,
	charity: StakeForCharity,
	reserve_balance: Amount,
	subscribers: Vec<(SubscriptionId, UnboundedSender<EngineNotification>)>,
	next_subscription: u64,
}

impl Inner {
	fn owns(&self, output: &TxOut) -> bool {
		output
			.script_pubkey
			.destination()
			.map(|address| self.keys.contains(address))
			.unwrap_or(false)
	}

	fn owns_input(&self, input: &TxIn) -> bool {
		self.transactions
			.get(&input.prevout.txid)
			.and_then(|tx| tx.outputs.get(input.prevout.vout as usize))
			.map(|output| self.owns(output))
			.unwrap_or(false)
	}

	/// Confirmed, or unconfirmed but funded entirely by our own outputs.
	fn is_trusted(&self, tx: &WalletTx) -> bool {
		if tx.depth >= 1 {
			return true;
		}
		tx.depth == 0
			&& tx.kind == TxKind::Normal
			&& !tx.inputs.is_empty()
			&& tx.inputs.iter().all(|input| self.owns_input(input))
	}

	fn is_mature(&self, tx: &WalletTx, maturity: i32) -> bool {
		tx.kind == TxKind::Normal || tx.depth >= maturity
	}

	fn unspent_owned(&self) -> impl Iterator<Item = (&Arc<WalletTx>, u32, &TxOut)> {
		self.transactions.values().flat_map(move |tx| {
			tx.outputs
				.iter()
				.enumerate()
				.filter(move |(vout, output)| {
					self.owns(output) && !self.spent.contains(&tx.outpoint(*vout as u32))
				})
				.map(move |(vout, output)| (tx, vout as u32, output))
		})
	}

	fn spendable(&self, maturity: i32) -> Vec<WalletOutput> {
		self.unspent_owned()
			.filter(|(tx, _, _)| {
				tx.depth >= 0 && self.is_trusted(tx) && self.is_mature(tx, maturity)
			})
			.map(|(tx, vout, _)| WalletOutput::new(tx.clone(), vout, tx.depth))
			.collect()
	}

	fn notify(&mut self, notification: EngineNotification) {
		self.subscribers
			.retain(|(_, sink)| sink.send(notification.clone()).is_ok());
	}
}

pub struct MemoryWallet {
	name: String,
	hrp: String,
	policy: MemoryWalletPolicy,
	state_lock: Mutex<()>,
	inner: StdMutex<Inner>,
	settings: Option<MemorySettingsStore>,
}

impl MemoryWallet {
	pub fn new(name: impl Into<String>, hrp: impl Into<String>, policy: MemoryWalletPolicy) -> Self {
		Self {
			name: name.into(),
			hrp: hrp.into(),
			policy,
			state_lock: Mutex::new(()),
			inner: StdMutex::new(Inner::default()),
			settings: Some(MemorySettingsStore::default()),
		}
	}

	/// Drop the settings store, as for a wallet that is not file backed.
	pub fn detached(mut self) -> Self {
		self.settings = None;
		self
	}

	pub fn policy(&self) -> &MemoryWalletPolicy {
		&self.policy
	}

	pub fn memory_settings(&self) -> Option<&MemorySettingsStore> {
		self.settings.as_ref()
	}

	fn inner(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn new_address_string(&self) -> String {
		// Encoding only fails for an invalid prefix, which `new` would have to be given.
		WalletAddress::random(&self.hrp)
			.encode()
			.unwrap_or_else(|_| format!("{}1invalid", self.hrp))
	}

	fn fee_for(&self, inputs: usize, outputs: usize) -> Amount {
		let size = 10 + 148 * inputs as i64 + 34 * outputs as i64;
		let kilobytes = (size + 999) / 1000;
		self.policy.fee_per_kb * kilobytes
	}

	/// New receiving address, recorded in the address book under `label`.
	pub fn new_receiving_address(&self, label: &str) -> String {
		let address = self.new_address_string();
		let mut inner = self.inner();
		inner.keys.insert(address.clone());
		inner.address_book.insert(address.clone(), label.to_string());
		address
	}

	/// New key that is ours but not in the address book, so outputs to it count as change.
	pub fn new_change_address(&self) -> String {
		let address = self.new_address_string();
		self.inner().keys.insert(address.clone());
		address
	}

	/// Address that belongs to nobody in this wallet.
	pub fn foreign_address(&self) -> String {
		self.new_address_string()
	}

	/// Record an incoming payment from outside the wallet.
	pub fn credit(&self, address: &str, value: Amount, depth: i32) -> OutPoint {
		let mut foreign = [0u8; 32];
		rand::rng().fill(&mut foreign);
		let tx = WalletTx {
			txid: random_txid(),
			kind: TxKind::Normal,
			inputs: vec![TxIn {
				prevout: OutPoint::new(TxId(foreign), 0),
			}],
			outputs: vec![TxOut {
				value,
				script_pubkey: ScriptPubKey::PayToAddress(address.to_string()),
			}],
			depth,
			time: chrono::Utc::now().timestamp(),
		};
		self.insert_transaction(tx).outpoint(0)
	}

	/// Record an arbitrary transaction, marking its inputs spent.
	pub fn insert_transaction(&self, tx: WalletTx) -> Arc<WalletTx> {
		let tx = Arc::new(tx);
		let mut inner = self.inner();
		for input in &tx.inputs {
			if inner.transactions.contains_key(&input.prevout.txid) {
				inner.spent.insert(input.prevout);
			}
		}
		inner.transactions.insert(tx.txid, tx.clone());
		inner.notify(EngineNotification::TransactionChanged {
			txid: tx.txid,
			status: ChangeType::New,
		});
		tx
	}

	/// Mark an output spent without a spending transaction.
	pub fn force_spent(&self, outpoint: OutPoint) {
		self.inner().spent.insert(outpoint);
	}

	/// Bury every non-conflicted transaction under `blocks` more blocks.
	pub fn advance(&self, blocks: i32) {
		let mut inner = self.inner();
		for tx in inner.transactions.values_mut() {
			if tx.depth >= 0 {
				Arc::make_mut(tx).depth += blocks;
			}
		}
	}

	pub fn set_reserve_balance(&self, amount: Amount) {
		self.inner().reserve_balance = amount;
	}

	pub fn subscriber_count(&self) -> usize {
		self.inner().subscribers.len()
	}

	/// Rebuild a wallet from a file written by [`WalletEngine::backup`].
	pub fn restore(
		path: &Path,
		hrp: impl Into<String>,
		policy: MemoryWalletPolicy,
	) -> Result<Self, EngineError> {
		let bytes = std::fs::read(path)?;
		let image: WalletImage = bincode::deserialize(&bytes)
			.map_err(|e| EngineError::Serialization(format!("Failed to read backup: {}", e)))?;
		let wallet = Self::new(image.name, hrp, policy);
		{
			let mut inner = wallet.inner();
			inner.keys = image.keys;
			inner.address_book = image.address_book;
			inner.spent = image.spent;
			inner.transactions = image
				.transactions
				.into_iter()
				.map(|tx| (tx.txid, Arc::new(tx)))
				.collect();
		}
		info!("Restored wallet {} from {:?}", wallet.name, path);
		Ok(wallet)
	}
}

fn random_txid() -> TxId {
	let mut bytes = [0u8; 32];
	rand::rng().fill(&mut bytes);
	TxId(bytes)
}

impl WalletEngine for MemoryWallet {
	fn name(&self) -> &str {
		&self.name
	}

	fn state_lock(&self) -> &Mutex<()> {
		&self.state_lock
	}

	fn balance(&self) -> Amount {
		self.inner()
			.spendable(self.policy.maturity)
			.iter()
			.map(WalletOutput::value)
			.sum()
	}

	fn unconfirmed_balance(&self) -> Amount {
		let inner = self.inner();
		inner
			.unspent_owned()
			.filter(|(tx, _, _)| tx.depth == 0 && !inner.is_trusted(tx))
			.map(|(_, _, output)| output.value)
			.sum()
	}

	fn stake_amount(&self) -> Amount {
		let inner = self.inner();
		inner
			.unspent_owned()
			.filter(|(tx, _, _)| {
				tx.kind == TxKind::Coinstake && tx.depth >= 0 && tx.depth < self.policy.maturity
			})
			.map(|(_, _, output)| output.value)
			.sum()
	}

	fn immature_balance(&self) -> Amount {
		let inner = self.inner();
		inner
			.unspent_owned()
			.filter(|(tx, _, _)| {
				tx.kind == TxKind::Coinbase && tx.depth >= 0 && tx.depth < self.policy.maturity
			})
			.map(|(_, _, output)| output.value)
			.sum()
	}

	fn reserve_balance(&self) -> Amount {
		self.inner().reserve_balance
	}

	fn transaction_count(&self) -> usize {
		self.inner().transactions.len()
	}

	fn version(&self) -> i32 {
		60000
	}

	fn is_encrypted(&self) -> bool {
		self.inner().passphrase.is_some()
	}

	fn is_locked(&self) -> bool {
		let inner = self.inner();
		inner.passphrase.is_some() && inner.locked
	}

	fn is_unlocked_for_staking_only(&self) -> bool {
		let inner = self.inner();
		inner.passphrase.is_some() && !inner.locked && inner.staking_only
	}

	fn lock(&self) -> bool {
		let mut inner = self.inner();
		if inner.passphrase.is_none() {
			return false;
		}
		inner.locked = true;
		inner.staking_only = false;
		inner.notify(EngineNotification::StatusChanged);
		debug!("Wallet {} locked", self.name);
		true
	}

	fn unlock(&self, passphrase: &Passphrase, staking_only: bool) -> bool {
		let mut inner = self.inner();
		if inner.passphrase.as_ref() != Some(passphrase) {
			warn!("Wallet {} rejected unlock attempt", self.name);
			return false;
		}
		inner.locked = false;
		inner.staking_only = staking_only;
		inner.notify(EngineNotification::StatusChanged);
		debug!(
			"Wallet {} unlocked{}",
			self.name,
			if staking_only { " for staking only" } else { "" }
		);
		true
	}

	fn change_passphrase(&self, old: &Passphrase, new: &Passphrase) -> bool {
		let mut inner = self.inner();
		if inner.passphrase.as_ref() != Some(old) {
			return false;
		}
		inner.passphrase = Some(new.clone());
		true
	}

	fn encrypt(&self, passphrase: &Passphrase) -> bool {
		let mut inner = self.inner();
		if inner.passphrase.is_some() {
			return false;
		}
		inner.passphrase = Some(passphrase.clone());
		inner.locked = true;
		inner.staking_only = false;
		inner.notify(EngineNotification::StatusChanged);
		info!("Wallet {} encrypted", self.name);
		true
	}

	fn validate_address(&self, address: &str) -> bool {
		WalletAddress::decode_for_network(address, &self.hrp).is_ok()
	}

	fn is_mine(&self, address: &str) -> bool {
		self.inner().keys.contains(address)
	}

	fn available_outputs(&self, filter: Option<&CoinFilter>) -> Vec<WalletOutput> {
		let mut outputs = self.inner().spendable(self.policy.maturity);
		if let Some(filter) = filter {
			outputs.retain(|output| filter.admits(&output.outpoint()));
		}
		outputs
	}

	fn transaction(&self, txid: &TxId) -> Option<Arc<WalletTx>> {
		self.inner().transactions.get(txid).cloned()
	}

	fn is_change_output(&self, output: &TxOut) -> bool {
		let inner = self.inner();
		inner.owns(output)
			&& output
				.script_pubkey
				.destination()
				.map(|address| !inner.address_book.contains_key(address))
				.unwrap_or(false)
	}

	fn is_owned_input(&self, input: &TxIn) -> bool {
		self.inner().owns_input(input)
	}

	fn create_transaction(
		&self,
		recipients: &[(String, Amount)],
		filter: Option<&CoinFilter>,
	) -> Result<PendingTransaction, BuildFailure> {
		let fail = |required_fee: Amount, reason: &str| BuildFailure {
			required_fee,
			reason: reason.to_string(),
		};

		{
			let inner = self.inner();
			if inner.passphrase.is_some() && (inner.locked || inner.staking_only) {
				return Err(fail(0, "wallet is locked"));
			}
		}
		if recipients.is_empty() {
			return Err(fail(0, "no recipients"));
		}
		if recipients
			.iter()
			.any(|(_, value)| *value < self.policy.dust_threshold)
		{
			return Err(fail(0, "output below dust threshold"));
		}

		let total: Amount = recipients.iter().map(|(_, value)| value).sum();
		let mut candidates = self.available_outputs(filter);
		candidates.sort_by(|a, b| b.value().cmp(&a.value()));

		let mut fee = self.fee_for(1, recipients.len() + 1);
		loop {
			let mut selected = Vec::new();
			let mut gathered: Amount = 0;
			for output in &candidates {
				if gathered >= total + fee {
					break;
				}
				gathered += output.value();
				selected.push(output.clone());
			}
			if gathered < total + fee {
				return Err(fail(fee, "insufficient funds"));
			}

			let mut change = gathered - total - fee;
			let mut effective_fee = fee;
			if change > 0 && change < self.policy.dust_threshold {
				effective_fee += change;
				change = 0;
			}
			let output_count = recipients.len() + usize::from(change > 0);
			let required = self.fee_for(selected.len(), output_count);
			if required > fee {
				fee = required;
				continue;
			}

			let mut outputs: Vec<TxOut> = recipients
				.iter()
				.map(|(address, value)| TxOut {
					value: *value,
					script_pubkey: ScriptPubKey::PayToAddress(address.clone()),
				})
				.collect();
			let change_address = (change > 0).then(|| self.new_address_string());
			if let Some(address) = &change_address {
				outputs.push(TxOut {
					value: change,
					script_pubkey: ScriptPubKey::PayToAddress(address.clone()),
				});
			}

			let tx = WalletTx {
				txid: random_txid(),
				kind: TxKind::Normal,
				inputs: selected
					.iter()
					.map(|output| TxIn {
						prevout: output.outpoint(),
					})
					.collect(),
				outputs,
				depth: 0,
				time: chrono::Utc::now().timestamp(),
			};
			debug!(
				"Built transaction {} with {} inputs, fee {}",
				tx.txid,
				tx.inputs.len(),
				effective_fee
			);
			return Ok(PendingTransaction {
				tx,
				fee: effective_fee,
				change_address,
			});
		}
	}

	fn commit_transaction(&self, pending: PendingTransaction) -> bool {
		let mut inner = self.inner();
		if pending
			.tx
			.inputs
			.iter()
			.any(|input| inner.spent.contains(&input.prevout))
		{
			warn!("Transaction {} spends an already spent output", pending.tx.txid);
			return false;
		}
		for input in &pending.tx.inputs {
			inner.spent.insert(input.prevout);
		}
		if let Some(address) = pending.change_address {
			inner.keys.insert(address);
		}
		let txid = pending.tx.txid;
		inner.transactions.insert(txid, Arc::new(pending.tx));
		inner.notify(EngineNotification::TransactionChanged {
			txid,
			status: ChangeType::New,
		});
		info!("Committed transaction {}", txid);
		true
	}

	fn address_book_entry(&self, address: &str) -> Option<String> {
		self.inner().address_book.get(address).cloned()
	}

	fn set_address_book_entry(&self, address: &str, label: &str) -> bool {
		let mut inner = self.inner();
		let status = match inner
			.address_book
			.insert(address.to_string(), label.to_string())
		{
			Some(_) => ChangeType::Updated,
			None => ChangeType::New,
		};
		let is_mine = inner.keys.contains(address);
		inner.notify(EngineNotification::AddressBookChanged {
			address: address.to_string(),
			label: label.to_string(),
			is_mine,
			status,
		});
		true
	}

	fn backup(&self, destination: &Path) -> Result<(), EngineError> {
		let image = {
			let inner = self.inner();
			WalletImage {
				name: self.name.clone(),
				version: self.version(),
				keys: inner.keys.clone(),
				address_book: inner.address_book.clone(),
				transactions: inner.transactions.values().map(|tx| (**tx).clone()).collect(),
				spent: inner.spent.clone(),
			}
		};
		let bytes = bincode::serialize(&image)
			.map_err(|e| EngineError::Serialization(format!("Failed to serialize wallet: {}", e)))?;
		std::fs::write(destination, bytes)?;
		info!("Backed up wallet {} to {:?}", self.name, destination);
		Ok(())
	}

	fn dump_to_file(&self, path: &Path) -> Result<(), EngineError> {
		let dump = {
			let inner = self.inner();
			if inner.passphrase.is_some() && inner.locked {
				return Err(EngineError::Locked);
			}
			KeyDump {
				created: chrono::Utc::now().to_rfc3339(),
				keys: inner.keys.iter().cloned().collect(),
				address_book: inner.address_book.clone(),
			}
		};
		let content = serde_json::to_string_pretty(&dump)
			.map_err(|e| EngineError::Serialization(format!("Failed to serialize key dump: {}", e)))?;
		std::fs::write(path, content)?;
		info!("Dumped {} keys to {:?}", dump.keys.len(), path);
		Ok(())
	}

	fn import_from_file(&self, path: &Path) -> Result<(), EngineError> {
		if self.is_locked() {
			return Err(EngineError::Locked);
		}
		let content = std::fs::read_to_string(path)?;
		let dump: KeyDump = serde_json::from_str(&content)
			.map_err(|e| EngineError::Serialization(format!("Failed to parse key dump: {}", e)))?;
		for key in &dump.keys {
			if !self.validate_address(key) {
				return Err(EngineError::Serialization(format!(
					"Key dump contains invalid address {}",
					key
				)));
			}
		}

		let mut inner = self.inner();
		let imported = dump.keys.len();
		inner.keys.extend(dump.keys);
		for (address, label) in dump.address_book {
			inner.address_book.entry(address).or_insert(label);
		}
		info!("Imported {} keys into wallet {}", imported, self.name);
		Ok(())
	}

	fn stake_weight(&self) -> StakeWeight {
		let weights: Vec<u64> = self
			.available_outputs(None)
			.iter()
			.filter(|output| output.depth >= 1)
			.map(|output| self.stake_weight_from_value(output.tx.time, output.value()))
			.filter(|weight| *weight > 0)
			.collect();

		StakeWeight {
			min: weights.iter().copied().min().unwrap_or(0),
			max: weights.iter().copied().max().unwrap_or(0),
			current: weights.iter().sum(),
		}
	}

	fn stake_weight_from_value(&self, time: i64, value: Amount) -> u64 {
		let age = chrono::Utc::now().timestamp() - time - self.policy.min_stake_age_secs;
		if age <= 0 || value <= 0 {
			return 0;
		}
		let age = age.min(self.policy.max_stake_age_secs) as i128;
		(value as i128 * age / (COIN as i128 * 86_400)) as u64
	}

	fn fix_spent_coins(&self, report_only: bool) -> SpentCoinReport {
		let mut inner = self.inner();
		let spending: BTreeSet<OutPoint> = inner
			.transactions
			.values()
			.filter(|tx| tx.depth >= 0)
			.flat_map(|tx| tx.inputs.iter().map(|input| input.prevout))
			.collect();

		let mismatched: Vec<(OutPoint, Amount)> = inner
			.spent
			.iter()
			.filter(|outpoint| !spending.contains(outpoint))
			.filter_map(|outpoint| {
				inner
					.transactions
					.get(&outpoint.txid)
					.and_then(|tx| tx.outputs.get(outpoint.vout as usize))
					.filter(|output| inner.owns(output))
					.map(|output| (*outpoint, output.value))
			})
			.collect();

		let orphans: Vec<TxId> = inner
			.transactions
			.values()
			.filter(|tx| tx.depth < 0 && tx.kind != TxKind::Normal)
			.map(|tx| tx.txid)
			.collect();

		let report = SpentCoinReport {
			mismatched: mismatched.len(),
			amount_in_question: mismatched.iter().map(|(_, value)| value).sum(),
			orphans: orphans.len(),
		};

		if !report_only {
			for (outpoint, _) in &mismatched {
				inner.spent.remove(outpoint);
			}
			for txid in &orphans {
				inner.transactions.remove(txid);
				inner.notify(EngineNotification::TransactionChanged {
					txid: *txid,
					status: ChangeType::Deleted,
				});
			}
			info!(
				"Repaired wallet {}: {} mismatched spends, {} orphans removed",
				self.name, report.mismatched, report.orphans
			);
		}

		report
	}

	fn stake_for_charity(&self) -> StakeForCharity {
		self.inner().charity.clone()
	}

	fn set_stake_for_charity(&self, settings: StakeForCharity) {
		self.inner().charity = settings;
	}

	fn settings_store(&self) -> Option<&dyn SettingsStore> {
		self.settings.as_ref().map(|s| s as &dyn SettingsStore)
	}

	fn subscribe(&self, sink: UnboundedSender<EngineNotification>) -> SubscriptionId {
		let mut inner = self.inner();
		inner.next_subscription += 1;
		let id = SubscriptionId(inner.next_subscription);
		inner.subscribers.push((id, sink));
		id
	}

	fn unsubscribe(&self, id: SubscriptionId) {
		self.inner()
			.subscribers
			.retain(|(subscriber, _)| *subscriber != id);
	}
}

/// Wallet manager over a fixed set of loaded wallets.
#[derive(Default)]
pub struct MemoryWalletManager {
	wallets: RwLock<Vec<Arc<dyn WalletEngine>>>,
	staking: StakingControl,
}

impl MemoryWalletManager {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_wallet(&self, wallet: Arc<dyn WalletEngine>) {
		self.wallets
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.push(wallet);
	}
}

impl WalletManager for MemoryWalletManager {
	fn wallets(&self) -> Vec<Arc<dyn WalletEngine>> {
		self.wallets
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	fn staking(&self) -> &StakingControl {
		&self.staking
	}
}
