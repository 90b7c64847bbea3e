//! Scoped unlock/relock of the wallet's signing material.
//!
//! [`request_unlock`] makes sure the wallet is fully unlocked for the duration of one operation and
//! returns an [`UnlockContext`] guard. Dropping the guard re-locks the wallet if, and only if, it
//! was locked when the request was made. Waiting on the [`UnlockRequester`] is the only point in the
//! subsystem that may suspend for an unbounded time; no lock is held while waiting.

use crate::engine::{EncryptionState, Passphrase, WalletEngine, WalletManager};
use crate::model::events::{EventSink, WalletEvent};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Derive the encryption state from the engine flags.
pub fn encryption_state(engine: &dyn WalletEngine) -> EncryptionState {
	if !engine.is_encrypted() {
		EncryptionState::Unencrypted
	} else if engine.is_locked() {
		EncryptionState::Locked
	} else {
		EncryptionState::Unlocked
	}
}

/// Answers "unlock required" requests, by a human operator or by automated passphrase supply.
#[async_trait::async_trait]
pub trait UnlockRequester: Send + Sync {
	/// Returns once the request has been answered, whether or not the wallet got unlocked.
	async fn request_unlock(&self, engine: &dyn WalletEngine);
}

/// Unlocks with a passphrase known up front.
pub struct PassphraseUnlocker {
	passphrase: Passphrase,
}

impl PassphraseUnlocker {
	pub fn new(passphrase: Passphrase) -> Self {
		Self { passphrase }
	}
}

#[async_trait::async_trait]
impl UnlockRequester for PassphraseUnlocker {
	async fn request_unlock(&self, engine: &dyn WalletEngine) {
		if !engine.unlock(&self.passphrase, false) {
			warn!("Stored passphrase did not unlock wallet {}", engine.name());
		}
	}
}

/// Never unlocks; every request is treated as cancelled.
pub struct DeclineUnlock;

#[async_trait::async_trait]
impl UnlockRequester for DeclineUnlock {
	async fn request_unlock(&self, engine: &dyn WalletEngine) {
		debug!("Declining unlock request for wallet {}", engine.name());
	}
}

/// A pending unlock request handed to whichever task owns the operator prompt.
#[derive(Debug)]
pub struct UnlockRequest {
	pub wallet: String,
	respond: oneshot::Sender<Option<Passphrase>>,
}

impl UnlockRequest {
	/// Answer with a passphrase, or `None` to cancel.
	pub fn answer(self, passphrase: Option<Passphrase>) {
		if self.respond.send(passphrase).is_err() {
			debug!("Unlock request for {} was abandoned", self.wallet);
		}
	}
}

/// Forwards unlock requests over a channel and waits for the answer.
pub struct ChannelUnlockRequester {
	requests: mpsc::UnboundedSender<UnlockRequest>,
}

impl ChannelUnlockRequester {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<UnlockRequest>) {
		let (requests, receiver) = mpsc::unbounded_channel();
		(Self { requests }, receiver)
	}
}

#[async_trait::async_trait]
impl UnlockRequester for ChannelUnlockRequester {
	async fn request_unlock(&self, engine: &dyn WalletEngine) {
		let (respond, answer) = oneshot::channel();
		let request = UnlockRequest {
			wallet: engine.name().to_string(),
			respond,
		};
		if self.requests.send(request).is_err() {
			warn!("Nobody is listening for unlock requests");
			return;
		}

		match answer.await {
			Ok(Some(passphrase)) => {
				if !engine.unlock(&passphrase, false) {
					info!("Passphrase rejected for wallet {}", engine.name());
				}
			}
			Ok(None) => info!("Unlock cancelled for wallet {}", engine.name()),
			Err(_) => warn!("Unlock request dropped without an answer"),
		}
	}
}

/// Guard returned by [`request_unlock`].
#[must_use = "dropping the context immediately re-locks the wallet"]
pub struct UnlockContext {
	engine: Arc<dyn WalletEngine>,
	valid: bool,
	relock: bool,
}

impl UnlockContext {
	pub fn new(engine: Arc<dyn WalletEngine>, valid: bool, relock: bool) -> Self {
		Self {
			engine,
			valid,
			relock,
		}
	}

	/// Whether the wallet is usable for signing within this scope.
	pub fn is_valid(&self) -> bool {
		self.valid
	}

	pub fn will_relock(&self) -> bool {
		self.valid && self.relock
	}

	/// Hand the context to a new owner; this one no longer re-locks.
	pub fn transfer(&mut self) -> UnlockContext {
		UnlockContext {
			engine: self.engine.clone(),
			valid: self.valid,
			relock: std::mem::take(&mut self.relock),
		}
	}
}

impl Drop for UnlockContext {
	fn drop(&mut self) {
		if self.valid && self.relock {
			debug!("Unlock scope ended, re-locking wallet {}", self.engine.name());
			self.engine.lock();
		}
	}
}

/// Stop the staker, wait for it to settle and let it start again.
pub(crate) async fn cycle_staking(manager: &dyn WalletManager, settle: Duration) {
	let staking = manager.staking();
	staking.stop(settle).await;
	staking.restart();
}

/// Ensure the wallet is unlocked for one operation.
///
/// A wallet that is unlocked for staking only is locked first, so that the requester performs a
/// full unlock. The returned context re-locks on drop when the wallet was locked beforehand and
/// did not end up in staking-only mode.
pub async fn request_unlock(
	engine: &Arc<dyn WalletEngine>,
	manager: &dyn WalletManager,
	requester: &dyn UnlockRequester,
	events: &EventSink,
	staking_settle: Duration,
) -> UnlockContext {
	let staking_only = engine.is_unlocked_for_staking_only();
	if staking_only {
		info!("Wallet {} is unlocked for staking only, locking it first", engine.name());
		engine.lock();
		cycle_staking(manager, staking_settle).await;
	}

	let was_locked = encryption_state(engine.as_ref()) == EncryptionState::Locked;
	if was_locked {
		info!("Unlock required for wallet {}", engine.name());
		events.emit(WalletEvent::UnlockRequired);
		requester.request_unlock(engine.as_ref()).await;
	}

	let valid = encryption_state(engine.as_ref()) != EncryptionState::Locked;
	if !valid && staking_only {
		cycle_staking(manager, staking_settle).await;
	}

	let relock = was_locked && !engine.is_unlocked_for_staking_only();
	debug!(
		"Unlock context for {}: valid={}, relock={}",
		engine.name(),
		valid,
		relock
	);
	UnlockContext::new(engine.clone(), valid, relock)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::{MemoryWallet, MemoryWalletManager, MemoryWalletPolicy};

	const SETTLE: Duration = Duration::from_millis(10);

	fn encrypted_wallet(pass: &Passphrase) -> (Arc<dyn WalletEngine>, MemoryWalletManager) {
		let wallet = MemoryWallet::new("main.dat", "tpc", MemoryWalletPolicy::default());
		assert!(wallet.encrypt(pass));
		let engine: Arc<dyn WalletEngine> = Arc::new(wallet);
		let manager = MemoryWalletManager::new();
		manager.add_wallet(engine.clone());
		(engine, manager)
	}

	#[test]
	fn test_context_relocks_on_drop() {
		let pass = Passphrase::new("pw");
		let (engine, _) = encrypted_wallet(&pass);
		assert!(engine.unlock(&pass, false));

		let context = UnlockContext::new(engine.clone(), true, true);
		drop(context);
		assert_eq!(encryption_state(engine.as_ref()), EncryptionState::Locked);
	}

	#[test]
	fn test_context_without_relock_leaves_state() {
		let pass = Passphrase::new("pw");
		let (engine, _) = encrypted_wallet(&pass);
		assert!(engine.unlock(&pass, false));

		drop(UnlockContext::new(engine.clone(), true, false));
		assert_eq!(encryption_state(engine.as_ref()), EncryptionState::Unlocked);

		drop(UnlockContext::new(engine.clone(), false, true));
		assert_eq!(encryption_state(engine.as_ref()), EncryptionState::Unlocked);
	}

	#[test]
	fn test_transfer_moves_relock_obligation() {
		let pass = Passphrase::new("pw");
		let (engine, _) = encrypted_wallet(&pass);
		assert!(engine.unlock(&pass, false));

		let mut original = UnlockContext::new(engine.clone(), true, true);
		let taken = original.transfer();
		assert!(!original.will_relock());
		assert!(taken.will_relock());

		drop(original);
		assert_eq!(encryption_state(engine.as_ref()), EncryptionState::Unlocked);
		drop(taken);
		assert_eq!(encryption_state(engine.as_ref()), EncryptionState::Locked);
	}

	#[tokio::test]
	async fn test_locked_wallet_is_unlocked_then_relocked() {
		let pass = Passphrase::new("pw");
		let (engine, manager) = encrypted_wallet(&pass);
		let (events, mut receiver) = EventSink::channel();
		let unlocker = PassphraseUnlocker::new(pass.clone());

		let context = request_unlock(&engine, &manager, &unlocker, &events, SETTLE).await;
		assert!(context.is_valid());
		assert!(context.will_relock());
		assert_eq!(encryption_state(engine.as_ref()), EncryptionState::Unlocked);
		assert_eq!(receiver.try_recv().unwrap(), WalletEvent::UnlockRequired);

		drop(context);
		assert_eq!(encryption_state(engine.as_ref()), EncryptionState::Locked);
	}

	#[tokio::test]
	async fn test_declined_unlock_is_invalid() {
		let pass = Passphrase::new("pw");
		let (engine, manager) = encrypted_wallet(&pass);
		let (events, _receiver) = EventSink::channel();

		let context = request_unlock(&engine, &manager, &DeclineUnlock, &events, SETTLE).await;
		assert!(!context.is_valid());
		drop(context);
		assert_eq!(encryption_state(engine.as_ref()), EncryptionState::Locked);
	}

	#[tokio::test]
	async fn test_already_unlocked_wallet_is_left_unlocked() {
		let pass = Passphrase::new("pw");
		let (engine, manager) = encrypted_wallet(&pass);
		assert!(engine.unlock(&pass, false));
		let (events, mut receiver) = EventSink::channel();

		let context = request_unlock(&engine, &manager, &DeclineUnlock, &events, SETTLE).await;
		assert!(context.is_valid());
		assert!(!context.will_relock());
		assert!(receiver.try_recv().is_err());
		drop(context);
		assert_eq!(encryption_state(engine.as_ref()), EncryptionState::Unlocked);
	}

	#[tokio::test]
	async fn test_staking_only_wallet_is_relocked_and_staker_restarted() {
		let pass = Passphrase::new("pw");
		let (engine, manager) = encrypted_wallet(&pass);
		assert!(engine.unlock(&pass, true));
		let (events, _receiver) = EventSink::channel();

		let context = request_unlock(
			&engine,
			&manager,
			&PassphraseUnlocker::new(pass.clone()),
			&events,
			SETTLE,
		)
		.await;
		assert!(context.is_valid());
		assert!(context.will_relock());
		assert_eq!(manager.staking().restart_count(), 1);
	}

	#[tokio::test]
	async fn test_channel_requester_uses_operator_answer() {
		let pass = Passphrase::new("pw");
		let (engine, manager) = encrypted_wallet(&pass);
		let (events, _receiver) = EventSink::channel();
		let (requester, mut requests) = ChannelUnlockRequester::new();

		let operator = {
			let pass = pass.clone();
			tokio::spawn(async move {
				let request = requests.recv().await.expect("request");
				assert_eq!(request.wallet, "main.dat");
				request.answer(Some(pass));
			})
		};

		let context = request_unlock(&engine, &manager, &requester, &events, SETTLE).await;
		assert!(context.is_valid());
		operator.await.unwrap();
	}
}
