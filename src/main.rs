use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{error, info};

use wallet_model_sync::config::ModelConfig;
use wallet_model_sync::engine::{
	COIN, ChainLock, ChainState, MemoryWallet, MemoryWalletManager, MemoryWalletPolicy,
	WalletEngine,
};
use wallet_model_sync::model::{
	EventDispatcher, EventSink, WalletEvent, WalletEventHandler, WalletModelBuilder,
	WalletModelError,
};
use wallet_model_sync::transaction::PaymentRequest;
use wallet_model_sync::utils::format_amount;

/// Logs every wallet event.
struct LogHandler;

#[async_trait::async_trait]
impl WalletEventHandler for LogHandler {
	async fn handle(&mut self, event: &WalletEvent) -> Result<(), WalletModelError> {
		match event {
			WalletEvent::BalanceChanged {
				spendable,
				stake,
				unconfirmed,
				immature,
			} => info!(
				"Balance: {} spendable, {} stake, {} unconfirmed, {} immature",
				format_amount(*spendable),
				format_amount(*stake),
				format_amount(*unconfirmed),
				format_amount(*immature)
			),
			WalletEvent::TotalBalanceChanged(total) => {
				info!("Total across wallets: {}", format_amount(*total))
			}
			other => info!("Event: {:?}", other),
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"LogHandler"
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), WalletModelError> {
	let crate_directive = "wallet_model_sync=debug"
		.parse()
		.map_err(|e| WalletModelError::ConfigError(format!("Bad log directive: {}", e)))?;
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(crate_directive)
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let config = match std::env::args().nth(1) {
		Some(path) => ModelConfig::from_json_file(Path::new(&path))?,
		None => ModelConfig::default(),
	};
	info!("Starting wallet model with {:?}", config);

	let wallet = Arc::new(MemoryWallet::new(
		"wallet.dat",
		"tpc",
		MemoryWalletPolicy::default(),
	));
	let receiving = wallet.new_receiving_address("demo");
	wallet.credit(&receiving, 25 * COIN, 3);
	wallet.credit(&receiving, 5 * COIN, 0);

	let manager = Arc::new(MemoryWalletManager::new());
	manager.add_wallet(wallet.clone());
	let chain: ChainLock = Arc::new(Mutex::new(ChainState { best_height: 1 }));

	let (sink, receiver) = EventSink::channel();
	let mut dispatcher = EventDispatcher::new();
	dispatcher.register_handler(Box::new(LogHandler));
	let dispatcher = tokio::spawn(dispatcher.run(receiver));

	let model = WalletModelBuilder::new()
		.with_engine(wallet.clone())
		.with_manager(manager)
		.with_chain(chain.clone())
		.with_config(config.clone())
		.with_events(sink)
		.build()?;

	let (stop, shutdown) = watch::channel(false);
	let driver = model.sync_driver().spawn(shutdown);

	chain.lock().await.best_height = 2;
	wallet.advance(1);
	tokio::time::sleep(config.poll_interval() * 2).await;

	let requests = vec![PaymentRequest::new(wallet.foreign_address(), 12 * COIN, "coffee")];
	match model.send_coins(&requests, None).await {
		Ok(Some(txid)) => info!("Sent payment in {}", txid),
		Ok(None) => info!("Nothing to send"),
		Err(e) => error!("Payment failed: {}", e),
	}

	for (address, outputs) in model.list_coins().await {
		let total: i64 = outputs.iter().map(|o| o.value()).sum();
		info!("{}: {} in {} outputs", address, format_amount(total), outputs.len());
	}

	tokio::time::sleep(Duration::from_millis(50)).await;
	let _ = stop.send(true);
	if let Err(e) = driver.await {
		error!("Sync driver task failed: {}", e);
	}
	drop(model);
	if let Err(e) = dispatcher.await {
		error!("Event dispatcher task failed: {}", e);
	}
	info!("Final balance {}", format_amount(wallet.balance()));
	Ok(())
}
