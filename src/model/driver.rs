//! Periodic poll and engine notification handling.
//!
//! The driver is the single writer of the [`AggregateCache`]. It runs on one task and reacts to
//! three inputs: a fixed interval tick, notifications pushed by the wallet engine, and a shutdown
//! signal. The tick never blocks: if either the chain lock or the wallet lock is busy the tick is
//! skipped and the next one tries again. A transaction notification that arrives while the wallet
//! lock is held leaves the balance refresh to the next tick.

use crate::config::ModelConfig;
use crate::engine::{
    ChainLock, ChangeType, EncryptionState, EngineNotification, SubscriptionId, TxId,
    WalletEngine, WalletManager,
};
use crate::model::cache::AggregateCache;
use crate::model::events::{EventSink, WalletEvent};
use crate::model::types::{BalanceDelta, BalanceSnapshot};
use crate::model::unlock::encryption_state;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

/// Transaction list kept by the presentation layer.
pub trait TransactionView: Send {
    fn update_transaction(&mut self, txid: &TxId, status: ChangeType);
    /// Chain height moved; confirmation counts must be recomputed.
    fn update_confirmations(&mut self);
}

/// Address book kept by the presentation layer.
pub trait AddressView: Send {
    fn update_entry(&mut self, address: &str, label: &str, is_mine: bool, status: ChangeType);
}

/// Result of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A lock was busy; nothing was read.
    Skipped,
    Unchanged,
    HeightChanged {
        height: u64,
        delta: Option<BalanceDelta>,
    },
    /// Height unchanged, but a refresh deferred by a notification ran.
    Refreshed { delta: Option<BalanceDelta> },
}

pub struct SyncDriver {
    engine: Arc<dyn WalletEngine>,
    chain: ChainLock,
    cache: AggregateCache,
    events: EventSink,
    transactions: Option<Box<dyn TransactionView>>,
    addresses: Option<Box<dyn AddressView>>,
    notifications: UnboundedReceiver<EngineNotification>,
    subscription: SubscriptionId,
    encryption: EncryptionState,
    /// A transaction notification found the wallet lock busy
    refresh_deferred: bool,
    poll_interval: Duration,
}

impl SyncDriver {
    /// Create a driver and subscribe it to the engine's notifications.
    pub fn new(
        engine: Arc<dyn WalletEngine>,
        manager: Arc<dyn WalletManager>,
        chain: ChainLock,
        events: EventSink,
        config: &ModelConfig,
    ) -> Self {
        let (sender, notifications) = mpsc::unbounded_channel();
        let subscription = engine.subscribe(sender);
        let encryption = encryption_state(engine.as_ref());
        debug!(
            "Sync driver subscribed to wallet {} as {:?}",
            engine.name(),
            subscription
        );

        Self {
            cache: AggregateCache::new(manager, events.clone()),
            engine,
            chain,
            events,
            transactions: None,
            addresses: None,
            notifications,
            subscription,
            encryption,
            refresh_deferred: false,
            poll_interval: config.poll_interval(),
        }
    }

    pub fn with_transaction_view(mut self, view: Box<dyn TransactionView>) -> Self {
        self.transactions = Some(view);
        self
    }

    pub fn with_address_view(mut self, view: Box<dyn AddressView>) -> Self {
        self.addresses = Some(view);
        self
    }

    /// Receiver that always holds the latest cached snapshot.
    pub fn balances(&self) -> watch::Receiver<BalanceSnapshot> {
        self.cache.subscribe()
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        self.cache.snapshot()
    }

    pub fn encryption_state(&self) -> EncryptionState {
        self.encryption
    }

    /// Read everything once, waiting for the locks. Used before the first tick.
    pub async fn prime(&mut self) -> Option<BalanceDelta> {
        let chain = self.chain.lock().await;
        let _wallet = self.engine.state_lock().lock().await;
        let height = chain.best_height;
        self.encryption = encryption_state(self.engine.as_ref());
        match self.cache.note_chain_height(height, self.engine.as_ref()) {
            Some(delta) => Some(delta),
            None => self.cache.refresh_if_changed(self.engine.as_ref()),
        }
    }

    /// One periodic tick.
    ///
    /// Both locks are only tried, never waited on. A tick that finds the chain height unchanged
    /// reads nothing else from the engine.
    pub fn poll(&mut self) -> TickOutcome {
        let Ok(chain) = self.chain.try_lock() else {
            trace!("Chain lock busy, skipping tick");
            return TickOutcome::Skipped;
        };
        let Ok(_wallet) = self.engine.state_lock().try_lock() else {
            trace!("Wallet lock busy, skipping tick");
            return TickOutcome::Skipped;
        };

        let height = chain.best_height;
        if height == self.cache.snapshot().chain_height {
            if std::mem::take(&mut self.refresh_deferred) {
                let delta = self.cache.refresh_if_changed(self.engine.as_ref());
                return TickOutcome::Refreshed { delta };
            }
            return TickOutcome::Unchanged;
        }

        self.refresh_deferred = false;
        let delta = self.cache.note_chain_height(height, self.engine.as_ref());
        if let Some(view) = self.transactions.as_mut() {
            view.update_confirmations();
        }
        TickOutcome::HeightChanged { height, delta }
    }

    pub fn on_transaction_changed(&mut self, txid: TxId, status: ChangeType) -> Option<BalanceDelta> {
        debug!("Transaction {} changed: {:?}", txid, status);
        if let Some(view) = self.transactions.as_mut() {
            view.update_transaction(&txid, status);
        }
        self.events
            .emit(WalletEvent::TransactionStatusChanged { txid, status });

        let Ok(_wallet) = self.engine.state_lock().try_lock() else {
            debug!("Wallet lock busy, deferring balance refresh to the next tick");
            self.refresh_deferred = true;
            return None;
        };
        self.refresh_deferred = false;
        self.cache.refresh_if_changed(self.engine.as_ref())
    }

    pub fn on_address_book_changed(
        &mut self,
        address: String,
        label: String,
        is_mine: bool,
        status: ChangeType,
    ) {
        if let Some(view) = self.addresses.as_mut() {
            view.update_entry(&address, &label, is_mine, status);
        }
        self.events.emit(WalletEvent::AddressBookEntryChanged {
            address,
            label,
            is_mine,
            status,
        });
    }

    /// Re-derive the encryption state; emits and returns it only on a transition.
    pub fn on_status_changed(&mut self) -> Option<EncryptionState> {
        let state = encryption_state(self.engine.as_ref());
        if state == self.encryption {
            return None;
        }
        info!("Wallet {} is now {:?}", self.engine.name(), state);
        self.encryption = state;
        self.events.emit(WalletEvent::EncryptionStatusChanged(state));
        Some(state)
    }

    pub fn handle_notification(&mut self, notification: EngineNotification) {
        match notification {
            EngineNotification::StatusChanged => {
                self.on_status_changed();
            }
            EngineNotification::AddressBookChanged {
                address,
                label,
                is_mine,
                status,
            } => self.on_address_book_changed(address, label, is_mine, status),
            EngineNotification::TransactionChanged { txid, status } => {
                self.on_transaction_changed(txid, status);
            }
        }
    }

    /// Handle every notification already queued, without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(notification) = self.notifications.try_recv() {
            self.handle_notification(notification);
            count += 1;
        }
        count
    }

    /// Drive ticks and notifications until `shutdown` flips to true or its sender goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }
        self.prime().await;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "Sync driver for {} running every {:?}",
            self.engine.name(),
            self.poll_interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let TickOutcome::HeightChanged { height, .. } = self.poll() {
                        trace!("Processed chain height {}", height);
                    }
                }
                Some(notification) = self.notifications.recv() => {
                    self.handle_notification(notification);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Sync driver for {} stopped", self.engine.name());
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

impl Drop for SyncDriver {
    fn drop(&mut self) {
        self.engine.unsubscribe(self.subscription);
        debug!("Sync driver unsubscribed from wallet {}", self.engine.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        COIN, ChainState, MemoryWallet, MemoryWalletManager, MemoryWalletPolicy, Passphrase,
    };
    use std::sync::Mutex;
    use tokio::sync::Mutex as AsyncMutex;

    struct Fixture {
        wallet: Arc<MemoryWallet>,
        chain: ChainLock,
        driver: SyncDriver,
        events: UnboundedReceiver<WalletEvent>,
    }

    fn fixture() -> Fixture {
        let wallet = Arc::new(MemoryWallet::new(
            "main.dat",
            "tpc",
            MemoryWalletPolicy::default(),
        ));
        let manager = Arc::new(MemoryWalletManager::new());
        manager.add_wallet(wallet.clone());
        let chain: ChainLock = Arc::new(AsyncMutex::new(ChainState { best_height: 0 }));
        let (sink, events) = EventSink::channel();
        let driver = SyncDriver::new(
            wallet.clone(),
            manager,
            chain.clone(),
            sink,
            &ModelConfig::default(),
        );
        Fixture {
            wallet,
            chain,
            driver,
            events,
        }
    }

    fn drain(receiver: &mut UnboundedReceiver<WalletEvent>) -> Vec<WalletEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[derive(Default)]
    struct RecordingView {
        confirmations: Arc<Mutex<usize>>,
        updates: Arc<Mutex<Vec<(TxId, ChangeType)>>>,
    }

    impl TransactionView for RecordingView {
        fn update_transaction(&mut self, txid: &TxId, status: ChangeType) {
            self.updates.lock().unwrap().push((*txid, status));
        }

        fn update_confirmations(&mut self) {
            *self.confirmations.lock().unwrap() += 1;
        }
    }

    #[tokio::test]
    async fn test_tick_skipped_while_chain_lock_held() {
        let mut f = fixture();
        f.chain.lock().await.best_height = 5;

        let guard = f.chain.lock().await;
        assert_eq!(f.driver.poll(), TickOutcome::Skipped);
        drop(guard);

        let wallet_guard = f.wallet.state_lock().lock().await;
        assert_eq!(f.driver.poll(), TickOutcome::Skipped);
        drop(wallet_guard);

        assert!(matches!(
            f.driver.poll(),
            TickOutcome::HeightChanged { height: 5, .. }
        ));
        assert_eq!(f.driver.poll(), TickOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_height_change_refreshes_confirmations() {
        let mut f = fixture();
        let view = RecordingView::default();
        let confirmations = view.confirmations.clone();
        f.driver = f.driver.with_transaction_view(Box::new(view));

        let address = f.wallet.new_receiving_address("");
        f.wallet.credit(&address, 2 * COIN, 1);
        f.chain.lock().await.best_height = 1;

        match f.driver.poll() {
            TickOutcome::HeightChanged { delta: Some(delta), .. } => {
                assert_eq!(delta.snapshot.spendable, 2 * COIN);
            }
            other => panic!("unexpected tick outcome {:?}", other),
        }
        assert_eq!(*confirmations.lock().unwrap(), 1);
        assert_eq!(f.driver.balances().borrow().chain_height, 1);
    }

    #[tokio::test]
    async fn test_transaction_notification_updates_view_and_cache() {
        let mut f = fixture();
        let view = RecordingView::default();
        let updates = view.updates.clone();
        f.driver = f.driver.with_transaction_view(Box::new(view));

        let address = f.wallet.new_receiving_address("");
        let outpoint = f.wallet.credit(&address, 3 * COIN, 1);
        assert_eq!(f.driver.process_pending(), 1);

        assert_eq!(*updates.lock().unwrap(), vec![(outpoint.txid, ChangeType::New)]);
        assert_eq!(f.driver.snapshot().spendable, 3 * COIN);
        let events = drain(&mut f.events);
        assert_eq!(
            events[0],
            WalletEvent::TransactionStatusChanged {
                txid: outpoint.txid,
                status: ChangeType::New
            }
        );
        assert!(events.contains(&WalletEvent::TotalBalanceChanged(3 * COIN)));
    }

    #[tokio::test]
    async fn test_refresh_deferred_while_wallet_lock_held() {
        let mut f = fixture();
        let address = f.wallet.new_receiving_address("");

        let wallet_guard = f.wallet.state_lock().lock().await;
        let outpoint = f.wallet.credit(&address, 4 * COIN, 1);
        assert_eq!(f.driver.process_pending(), 1);
        assert_eq!(f.driver.snapshot().spendable, 0);
        assert_eq!(f.driver.poll(), TickOutcome::Skipped);
        drop(wallet_guard);

        let events = drain(&mut f.events);
        assert_eq!(
            events,
            vec![WalletEvent::TransactionStatusChanged {
                txid: outpoint.txid,
                status: ChangeType::New
            }]
        );

        match f.driver.poll() {
            TickOutcome::Refreshed { delta: Some(delta) } => {
                assert_eq!(delta.snapshot.spendable, 4 * COIN);
                assert_eq!(delta.snapshot.transaction_count, 1);
            }
            other => panic!("unexpected tick outcome {:?}", other),
        }
        assert_eq!(f.driver.poll(), TickOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_status_change_emitted_once_per_transition() {
        let mut f = fixture();
        let pass = Passphrase::new("pw");
        assert!(f.wallet.encrypt(&pass));
        f.driver.process_pending();
        assert_eq!(f.driver.encryption_state(), EncryptionState::Locked);

        // Locking an already locked wallet notifies but is no transition.
        f.wallet.lock();
        f.driver.process_pending();
        assert_eq!(
            drain(&mut f.events),
            vec![WalletEvent::EncryptionStatusChanged(EncryptionState::Locked)]
        );
    }

    #[tokio::test]
    async fn test_address_book_change_does_not_touch_cache() {
        let mut f = fixture();
        let address = f.wallet.new_change_address();
        f.wallet.set_address_book_entry(&address, "rent");
        f.driver.process_pending();

        assert_eq!(
            drain(&mut f.events),
            vec![WalletEvent::AddressBookEntryChanged {
                address,
                label: "rent".to_string(),
                is_mine: true,
                status: ChangeType::New,
            }]
        );
        assert_eq!(f.driver.snapshot(), BalanceSnapshot::default());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let f = fixture();
        assert_eq!(f.wallet.subscriber_count(), 1);
        drop(f.driver);
        assert_eq!(f.wallet.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let f = fixture();
        let address = f.wallet.new_receiving_address("");
        f.wallet.credit(&address, COIN, 1);

        let balances = f.driver.balances();
        let (stop, shutdown) = watch::channel(false);
        let handle = f.driver.spawn(shutdown);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(balances.borrow().spendable, COIN);
        stop.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(f.wallet.subscriber_count(), 0);
    }
}
