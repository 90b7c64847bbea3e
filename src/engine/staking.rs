//! Staking start/stop coordination.
//!
//! The staker task observes a stop signal obtained from [`StakingControl::begin`] and calls
//! [`StakingControl::acknowledge_stopped`] once it has actually stopped. Callers that need the
//! staker out of the way (locking the wallet, failed unlocks) call [`StakingControl::stop`], which
//! waits for that acknowledgment instead of sleeping for a fixed time, and then
//! [`StakingControl::restart`].
//!
//! Every `begin` starts a new generation. An acknowledgment only satisfies a `stop` issued for the
//! same or an earlier generation, so a late acknowledgment from a previous staker never stands in
//! for the current one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct StakingControl {
	stop_signal: watch::Sender<bool>,
	/// Generation of the most recently started staker
	generation: AtomicU64,
	/// Generation of the most recent acknowledgment
	acknowledged: watch::Sender<u64>,
	active: AtomicBool,
	restarts: AtomicU64,
}

impl StakingControl {
	pub fn new() -> Self {
		let (stop_signal, _) = watch::channel(false);
		let (acknowledged, _) = watch::channel(0);
		Self {
			stop_signal,
			generation: AtomicU64::new(0),
			acknowledged,
			active: AtomicBool::new(false),
			restarts: AtomicU64::new(0),
		}
	}

	/// Register a running staker. The returned receiver flips to `true` when it must stop.
	pub fn begin(&self) -> watch::Receiver<bool> {
		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		debug!("Staker generation {} started", generation);
		self.active.store(true, Ordering::SeqCst);
		self.stop_signal.subscribe()
	}

	/// Called by the staker once it has observed the stop signal and wound down.
	pub fn acknowledge_stopped(&self) {
		self.active.store(false, Ordering::SeqCst);
		self.acknowledged
			.send_replace(self.generation.load(Ordering::SeqCst));
	}

	pub fn is_active(&self) -> bool {
		self.active.load(Ordering::SeqCst)
	}

	pub fn stop_requested(&self) -> bool {
		*self.stop_signal.borrow()
	}

	/// Signal the staker to stop and wait up to `settle` for its acknowledgment.
	///
	/// Returns `false` if the staker did not acknowledge in time.
	pub async fn stop(&self, settle: Duration) -> bool {
		let target = self.generation.load(Ordering::SeqCst);
		let mut acknowledged = self.acknowledged.subscribe();
		self.stop_signal.send_replace(true);

		if !self.is_active() {
			debug!("No active staker, stop is immediate");
			return true;
		}

		let wait = acknowledged.wait_for(|generation| *generation >= target);
		match tokio::time::timeout(settle, wait).await {
			Ok(Ok(_)) => {
				info!("Staker acknowledged stop");
				true
			}
			Ok(Err(_)) | Err(_) => {
				warn!(
					"Staker did not acknowledge stop within {} ms",
					settle.as_millis()
				);
				false
			}
		}
	}

	/// Clear the stop signal so a staker may run again.
	pub fn restart(&self) {
		self.stop_signal.send_replace(false);
		let count = self.restarts.fetch_add(1, Ordering::SeqCst) + 1;
		info!("Staking restart requested (restart #{})", count);
	}

	pub fn restart_count(&self) -> u64 {
		self.restarts.load(Ordering::SeqCst)
	}
}

impl Default for StakingControl {
	fn default() -> Self {
		Self::new()
	}
}
