use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::engine::address::AddressError;

/// Amounts are signed base units, as the engine reports them.
pub type Amount = i64;

/// Number of decimal places of one coin.
pub const COIN_DECIMALS: u32 = 6;
/// One coin in base units.
pub const COIN: Amount = 1_000_000;

/// Transaction identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(pub [u8; 32]);

impl TxId {
	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}

	pub fn from_hex(s: &str) -> Result<Self, EngineError> {
		let bytes = hex::decode(s)
			.map_err(|e| EngineError::Serialization(format!("Invalid transaction id: {}", e)))?;
		let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
			EngineError::Serialization("Transaction id must be 32 bytes".to_string())
		})?;
		Ok(Self(bytes))
	}
}

impl fmt::Display for TxId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

impl fmt::Debug for TxId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TxId({})", self.to_hex())
	}
}

/// Reference to a single output of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
	pub txid: TxId,
	pub vout: u32,
}

impl OutPoint {
	pub fn new(txid: TxId, vout: u32) -> Self {
		Self { txid, vout }
	}
}

impl fmt::Display for OutPoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.txid, self.vout)
	}
}

/// Locking script of an output.
///
/// Only pay-to-address scripts carry an extractable destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptPubKey {
	PayToAddress(String),
	NonStandard(Vec<u8>),
}

impl ScriptPubKey {
	/// Destination address paid by this script, if one can be extracted.
	pub fn destination(&self) -> Option<&str> {
		match self {
			ScriptPubKey::PayToAddress(address) => Some(address.as_str()),
			ScriptPubKey::NonStandard(_) => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
	pub value: Amount,
	pub script_pubkey: ScriptPubKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
	pub prevout: OutPoint,
}

/// How a transaction entered the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
	Normal,
	Coinbase,
	Coinstake,
}

/// A transaction as recorded by the wallet engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTx {
	pub txid: TxId,
	pub kind: TxKind,
	pub inputs: Vec<TxIn>,
	pub outputs: Vec<TxOut>,
	/// Confirmations in the main chain; 0 is unconfirmed, negative is conflicted.
	pub depth: i32,
	/// Unix timestamp the transaction was first seen.
	pub time: i64,
}

impl WalletTx {
	pub fn outpoint(&self, vout: u32) -> OutPoint {
		OutPoint::new(self.txid, vout)
	}
}

/// A single spendable output together with the transaction that created it.
#[derive(Debug, Clone)]
pub struct WalletOutput {
	pub tx: Arc<WalletTx>,
	pub index: u32,
	pub depth: i32,
}

impl WalletOutput {
	pub fn new(tx: Arc<WalletTx>, index: u32, depth: i32) -> Self {
		Self { tx, index, depth }
	}

	pub fn outpoint(&self) -> OutPoint {
		self.tx.outpoint(self.index)
	}

	pub fn txout(&self) -> Option<&TxOut> {
		self.tx.outputs.get(self.index as usize)
	}

	pub fn value(&self) -> Amount {
		self.txout().map(|o| o.value).unwrap_or(0)
	}
}

impl PartialEq for WalletOutput {
	fn eq(&self, other: &Self) -> bool {
		self.outpoint() == other.outpoint()
	}
}

impl Eq for WalletOutput {}

/// Caller-supplied restriction on which outputs may be spent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinFilter {
	/// When set, only these outputs may be spent.
	pub selected: Option<BTreeSet<OutPoint>>,
	/// Outputs that must never be spent.
	pub excluded: BTreeSet<OutPoint>,
}

impl CoinFilter {
	pub fn select<I: IntoIterator<Item = OutPoint>>(outpoints: I) -> Self {
		Self {
			selected: Some(outpoints.into_iter().collect()),
			excluded: BTreeSet::new(),
		}
	}

	pub fn with_excluded<I: IntoIterator<Item = OutPoint>>(mut self, outpoints: I) -> Self {
		self.excluded.extend(outpoints);
		self
	}

	pub fn admits(&self, outpoint: &OutPoint) -> bool {
		!self.excluded.contains(outpoint)
			&& self
				.selected
				.as_ref()
				.map(|selected| selected.contains(outpoint))
				.unwrap_or(true)
	}
}

/// A built but uncommitted transaction.
///
/// Dropping it discards the transaction and returns the reserved change key.
#[derive(Debug)]
pub struct PendingTransaction {
	pub tx: WalletTx,
	pub fee: Amount,
	pub change_address: Option<String>,
}

/// Returned when the engine cannot build a transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transaction build failed (required fee {required_fee}): {reason}")]
pub struct BuildFailure {
	/// Fee the engine computed before giving up.
	pub required_fee: Amount,
	pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeWeight {
	pub min: u64,
	pub max: u64,
	pub current: u64,
}

/// Outcome of a spent-coin consistency scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentCoinReport {
	pub mismatched: usize,
	pub amount_in_question: Amount,
	pub orphans: usize,
}

/// Stake-for-charity settings of a wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeForCharity {
	pub enabled: bool,
	pub percent: u8,
	pub address: Option<String>,
	pub change_address: Option<String>,
	pub min_amount: Amount,
	pub max_amount: Amount,
}

/// Wallet encryption state, derived on demand from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionState {
	Unencrypted,
	Locked,
	Unlocked,
}

/// Kind of change carried by an engine notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
	New,
	Updated,
	Deleted,
}

/// Push notifications raised by the wallet engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineNotification {
	/// Key store status changed (encrypted, locked or unlocked)
	StatusChanged,
	AddressBookChanged {
		address: String,
		label: String,
		is_mine: bool,
		status: ChangeType,
	},
	TransactionChanged {
		txid: TxId,
		status: ChangeType,
	},
}

/// Handle returned by an engine subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Global chain state guarded by the chain lock.
#[derive(Debug, Clone, Default)]
pub struct ChainState {
	pub best_height: u64,
}

/// Wallet passphrase; wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase(String);

impl Passphrase {
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	pub fn expose(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for Passphrase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Passphrase(***)")
	}
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	Serialization(String),

	#[error("Address error: {0}")]
	Address(#[from] AddressError),

	#[error("Wallet is locked")]
	Locked,

	#[error("Wallet is not file backed")]
	NotFileBacked,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_filter_admits() {
		let a = OutPoint::new(TxId([1; 32]), 0);
		let b = OutPoint::new(TxId([2; 32]), 1);

		let open = CoinFilter::default();
		assert!(open.admits(&a));

		let selected = CoinFilter::select([a]);
		assert!(selected.admits(&a));
		assert!(!selected.admits(&b));

		let excluded = CoinFilter::default().with_excluded([b]);
		assert!(excluded.admits(&a));
		assert!(!excluded.admits(&b));
	}

	#[test]
	fn test_txid_hex() {
		let txid = TxId([0xab; 32]);
		let parsed = TxId::from_hex(&txid.to_hex()).expect("valid hex");
		assert_eq!(parsed, txid);
		assert!(TxId::from_hex("abcd").is_err());
	}

	#[test]
	fn test_passphrase_debug_is_redacted() {
		let pass = Passphrase::new("hunter2");
		assert_eq!(format!("{:?}", pass), "Passphrase(***)");
	}
}
