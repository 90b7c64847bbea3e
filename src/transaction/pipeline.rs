//! Validate, build, confirm and commit a batch of payments.
//!
//! Validation runs without locks. Building, fee confirmation and commit run while holding the
//! chain lock and then the wallet lock, so the fee the user confirms is the fee of the transaction
//! that gets committed. Address book updates happen after the locks are released.

use crate::engine::{Amount, ChainLock, CoinFilter, TxId, WalletEngine};
use crate::utils::format_amount;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SendError {
	#[error("Invalid address: {0}")]
	InvalidAddress(String),

	#[error("Amount must be positive, got {0}")]
	InvalidAmount(Amount),

	#[error("Amount {requested} exceeds balance {available}")]
	AmountExceedsBalance { requested: Amount, available: Amount },

	#[error("Amount plus fee {fee} exceeds balance")]
	AmountWithFeeExceedsBalance { fee: Amount },

	#[error("Address appears more than once: {0}")]
	DuplicateAddress(String),

	#[error("Transaction creation failed: {0}")]
	TransactionCreationFailed(String),

	#[error("Transaction commit failed")]
	TransactionCommitFailed,

	#[error("Aborted at fee confirmation")]
	Aborted,
}

impl SendError {
	/// Fee associated with the failure, if one was computed.
	pub fn fee(&self) -> Option<Amount> {
		match self {
			SendError::AmountWithFeeExceedsBalance { fee } => Some(*fee),
			_ => None,
		}
	}
}

/// `Ok(None)` means the batch was empty and nothing was attempted.
pub type SendOutcome = Result<Option<TxId>, SendError>;

/// One payment in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
	pub address: String,
	pub amount: Amount,
	/// Label stored in the address book once the payment is committed
	#[serde(default)]
	pub label: String,
}

impl PaymentRequest {
	pub fn new(address: impl Into<String>, amount: Amount, label: impl Into<String>) -> Self {
		Self {
			address: address.into(),
			amount,
			label: label.into(),
		}
	}
}

/// Asks the user to accept the fee of a built transaction.
#[async_trait::async_trait]
pub trait FeeConfirmer: Send + Sync {
	async fn confirm_fee(&self, fee: Amount, total: Amount) -> bool;
}

/// Accepts every fee.
pub struct AcceptAnyFee;

#[async_trait::async_trait]
impl FeeConfirmer for AcceptAnyFee {
	async fn confirm_fee(&self, _fee: Amount, _total: Amount) -> bool {
		true
	}
}

/// Sum of the outputs the engine would let `filter` spend.
pub fn available_balance(engine: &dyn WalletEngine, filter: Option<&CoinFilter>) -> Amount {
	match filter {
		Some(filter) => engine
			.available_outputs(Some(filter))
			.iter()
			.map(|output| output.value())
			.sum(),
		None => engine.balance(),
	}
}

pub struct SendPipeline {
	engine: Arc<dyn WalletEngine>,
	chain: ChainLock,
	/// Flat fee used by the balance check before anything is built
	fee_estimate: Amount,
}

impl SendPipeline {
	pub fn new(engine: Arc<dyn WalletEngine>, chain: ChainLock, fee_estimate: Amount) -> Self {
		Self {
			engine,
			chain,
			fee_estimate,
		}
	}

	pub fn fee_estimate(&self) -> Amount {
		self.fee_estimate
	}

	pub fn set_fee_estimate(&mut self, fee: Amount) {
		self.fee_estimate = fee;
	}

	/// Check every request, then the batch as a whole. Returns the batch total.
	fn validate(&self, requests: &[PaymentRequest]) -> Result<Amount, SendError> {
		let mut total: Amount = 0;
		let mut addresses = HashSet::new();
		let mut duplicate = None;

		for request in requests {
			if !self.engine.validate_address(&request.address) {
				return Err(SendError::InvalidAddress(request.address.clone()));
			}
			if request.amount <= 0 {
				return Err(SendError::InvalidAmount(request.amount));
			}
			total = total
				.checked_add(request.amount)
				.ok_or(SendError::InvalidAmount(request.amount))?;
			if !addresses.insert(request.address.as_str()) && duplicate.is_none() {
				duplicate = Some(request.address.clone());
			}
		}

		match duplicate {
			Some(address) => Err(SendError::DuplicateAddress(address)),
			None => Ok(total),
		}
	}

	/// Send `requests` as one transaction.
	pub async fn send(
		&self,
		requests: &[PaymentRequest],
		filter: Option<&CoinFilter>,
		confirmer: &dyn FeeConfirmer,
	) -> SendOutcome {
		if requests.is_empty() {
			return Ok(None);
		}

		let total = self.validate(requests)?;
		let balance = available_balance(self.engine.as_ref(), filter);
		if total > balance {
			return Err(SendError::AmountExceedsBalance {
				requested: total,
				available: balance,
			});
		}
		if total.saturating_add(self.fee_estimate) > balance {
			return Err(SendError::AmountWithFeeExceedsBalance {
				fee: self.fee_estimate,
			});
		}

		let txid = {
			let _chain = self.chain.lock().await;
			let _wallet = self.engine.state_lock().lock().await;

			let recipients: Vec<(String, Amount)> = requests
				.iter()
				.map(|request| (request.address.clone(), request.amount))
				.collect();
			let pending = match self.engine.create_transaction(&recipients, filter) {
				Ok(pending) => pending,
				Err(failure) => {
					warn!("Engine could not build transaction: {}", failure);
					if total.saturating_add(failure.required_fee) > balance {
						return Err(SendError::AmountWithFeeExceedsBalance {
							fee: failure.required_fee,
						});
					}
					return Err(SendError::TransactionCreationFailed(failure.reason));
				}
			};

			if !confirmer.confirm_fee(pending.fee, total).await {
				info!("Fee {} declined, discarding transaction", format_amount(pending.fee));
				return Err(SendError::Aborted);
			}

			let txid = pending.tx.txid;
			if !self.engine.commit_transaction(pending) {
				error!("Engine refused to commit transaction {}", txid);
				return Err(SendError::TransactionCommitFailed);
			}
			txid
		};
		info!(
			"Sent {} to {} recipients in {}",
			format_amount(total),
			requests.len(),
			txid
		);

		self.update_address_book(requests).await;
		Ok(Some(txid))
	}

	/// Record each paid address, or relabel it if the label changed.
	async fn update_address_book(&self, requests: &[PaymentRequest]) {
		for request in requests {
			let _wallet = self.engine.state_lock().lock().await;
			match self.engine.address_book_entry(&request.address) {
				Some(label) if label == request.label => continue,
				_ => {
					debug!("Updating address book entry for {}", request.address);
					if !self
						.engine
						.set_address_book_entry(&request.address, &request.label)
					{
						warn!("Could not update address book entry for {}", request.address);
					}
				}
			}
		}
	}
}
