//! Builder for [`WalletModel`].

use crate::config::ModelConfig;
use crate::engine::{ChainLock, WalletEngine, WalletManager};
use crate::model::events::EventSink;
use crate::model::types::WalletModelError;
use crate::model::unlock::{DeclineUnlock, UnlockRequester};
use crate::model::wallet_model::WalletModel;
use crate::transaction::{AcceptAnyFee, FeeConfirmer, SendPipeline};

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Builder for constructing a [`WalletModel`].
///
/// The engine, the wallet manager and the chain lock are required. Without an unlock requester
/// every unlock request is declined; without a fee confirmer every fee is accepted; without an
/// event sink events are discarded.
#[derive(Default)]
pub struct WalletModelBuilder {
	engine: Option<Arc<dyn WalletEngine>>,
	manager: Option<Arc<dyn WalletManager>>,
	chain: Option<ChainLock>,
	config: Option<ModelConfig>,
	unlock_requester: Option<Arc<dyn UnlockRequester>>,
	fee_confirmer: Option<Arc<dyn FeeConfirmer>>,
	events: Option<EventSink>,
}

impl WalletModelBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the wallet the model is bound to
	pub fn with_engine(mut self, engine: Arc<dyn WalletEngine>) -> Self {
		self.engine = Some(engine);
		self
	}

	/// Sets the collaborator managing every loaded wallet
	pub fn with_manager(mut self, manager: Arc<dyn WalletManager>) -> Self {
		self.manager = Some(manager);
		self
	}

	/// Sets the global chain-state lock
	pub fn with_chain(mut self, chain: ChainLock) -> Self {
		self.chain = Some(chain);
		self
	}

	pub fn with_config(mut self, config: ModelConfig) -> Self {
		self.config = Some(config);
		self
	}

	pub fn with_unlock_requester(mut self, requester: Arc<dyn UnlockRequester>) -> Self {
		self.unlock_requester = Some(requester);
		self
	}

	pub fn with_fee_confirmer(mut self, confirmer: Arc<dyn FeeConfirmer>) -> Self {
		self.fee_confirmer = Some(confirmer);
		self
	}

	pub fn with_events(mut self, events: EventSink) -> Self {
		self.events = Some(events);
		self
	}

	pub fn build(self) -> Result<WalletModel, WalletModelError> {
		let engine = self
			.engine
			.ok_or(WalletModelError::MissingComponent("engine"))?;
		let manager = self
			.manager
			.ok_or(WalletModelError::MissingComponent("manager"))?;
		let chain = self
			.chain
			.ok_or(WalletModelError::MissingComponent("chain lock"))?;
		let config = self.config.unwrap_or_default();
		config.validate()?;

		let events = self.events.unwrap_or_else(|| {
			debug!("No event sink configured, wallet events will be discarded");
			EventSink::channel().0
		});

		debug!("Building wallet model for {}", engine.name());
		Ok(WalletModel {
			pipeline: SendPipeline::new(engine.clone(), chain.clone(), config.transaction_fee),
			engine,
			manager,
			chain,
			config,
			unlock_requester: self
				.unlock_requester
				.unwrap_or_else(|| Arc::new(DeclineUnlock)),
			fee_confirmer: self.fee_confirmer.unwrap_or_else(|| Arc::new(AcceptAnyFee)),
			events,
			locked_outputs: Mutex::new(BTreeSet::new()),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::engine::{ChainState, MemoryWallet, MemoryWalletManager, MemoryWalletPolicy};

	#[test]
	fn test_missing_components_are_reported() {
		let result = WalletModelBuilder::new().build();
		assert!(matches!(
			result,
			Err(WalletModelError::MissingComponent("engine"))
		));

		let engine = Arc::new(MemoryWallet::new("a.dat", "tpc", MemoryWalletPolicy::default()));
		let result = WalletModelBuilder::new()
			.with_engine(engine)
			.with_manager(Arc::new(MemoryWalletManager::new()))
			.build();
		assert!(matches!(
			result,
			Err(WalletModelError::MissingComponent("chain lock"))
		));
	}

	#[test]
	fn test_invalid_config_is_rejected() {
		let engine = Arc::new(MemoryWallet::new("a.dat", "tpc", MemoryWalletPolicy::default()));
		let result = WalletModelBuilder::new()
			.with_engine(engine)
			.with_manager(Arc::new(MemoryWalletManager::new()))
			.with_chain(Arc::new(tokio::sync::Mutex::new(ChainState::default())))
			.with_config(ModelConfig {
				max_change_walk: 0,
				..Default::default()
			})
			.build();
		assert!(matches!(result, Err(WalletModelError::ConfigError(_))));
	}
}
