//! Cached aggregate wallet figures and change detection.
//!
//! The cache holds the last observed [`BalanceSnapshot`] in a `watch` channel: the single writer
//! replaces it as one unit, and any number of readers can borrow or await it without touching the
//! engine's locks.

use crate::engine::{WalletEngine, WalletManager};
use crate::model::events::{EventSink, WalletEvent};
use crate::model::types::{BalanceDelta, BalanceSnapshot};
use crate::utils::format_amount;

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

pub struct AggregateCache {
    snapshot: watch::Sender<BalanceSnapshot>,
    manager: Arc<dyn WalletManager>,
    events: EventSink,
}

impl AggregateCache {
    pub fn new(manager: Arc<dyn WalletManager>, events: EventSink) -> Self {
        let (snapshot, _) = watch::channel(BalanceSnapshot::default());
        Self {
            snapshot,
            manager,
            events,
        }
    }

    /// Receiver that always holds the latest complete snapshot.
    pub fn subscribe(&self) -> watch::Receiver<BalanceSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> BalanceSnapshot {
        *self.snapshot.borrow()
    }

    /// Re-read the engine and replace the snapshot if any amount or the transaction count moved.
    ///
    /// The caller decides which locks are held while the engine is read.
    pub fn refresh_if_changed(&mut self, engine: &dyn WalletEngine) -> Option<BalanceDelta> {
        let height = self.snapshot().chain_height;
        self.refresh(engine, height)
    }

    /// Record a new chain height; a different height always forces a refresh.
    pub fn note_chain_height(
        &mut self,
        height: u64,
        engine: &dyn WalletEngine,
    ) -> Option<BalanceDelta> {
        if self.snapshot().chain_height == height {
            return None;
        }
        debug!("Chain height moved to {}", height);
        self.refresh(engine, height)
    }

    fn refresh(&mut self, engine: &dyn WalletEngine, height: u64) -> Option<BalanceDelta> {
        let current = self.snapshot();
        let fresh = BalanceSnapshot {
            spendable: engine.balance(),
            stake: engine.stake_amount(),
            unconfirmed: engine.unconfirmed_balance(),
            immature: engine.immature_balance(),
            transaction_count: engine.transaction_count(),
            chain_height: height,
        };

        if fresh == current {
            return None;
        }
        self.snapshot.send_replace(fresh);

        let amounts_changed = !fresh.same_amounts(&current);
        let transaction_count_changed = fresh.transaction_count != current.transaction_count;
        if !amounts_changed && !transaction_count_changed {
            return None;
        }

        if amounts_changed {
            info!(
                "Balance changed: spendable {}, stake {}, unconfirmed {}, immature {}",
                format_amount(fresh.spendable),
                format_amount(fresh.stake),
                format_amount(fresh.unconfirmed),
                format_amount(fresh.immature)
            );
            self.events.emit(WalletEvent::BalanceChanged {
                spendable: fresh.spendable,
                stake: fresh.stake,
                unconfirmed: fresh.unconfirmed,
                immature: fresh.immature,
            });
            self.events
                .emit(WalletEvent::TotalBalanceChanged(self.manager.total_balance()));
        }
        if transaction_count_changed {
            self.events
                .emit(WalletEvent::TransactionCountChanged(fresh.transaction_count));
        }

        Some(BalanceDelta {
            snapshot: fresh,
            amounts_changed,
            transaction_count_changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{COIN, MemoryWallet, MemoryWalletManager, MemoryWalletPolicy};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn setup() -> (
        Arc<MemoryWallet>,
        AggregateCache,
        UnboundedReceiver<WalletEvent>,
    ) {
        let wallet = Arc::new(MemoryWallet::new(
            "main.dat",
            "tpc",
            MemoryWalletPolicy::default(),
        ));
        let other = Arc::new(MemoryWallet::new(
            "other.dat",
            "tpc",
            MemoryWalletPolicy::default(),
        ));
        let other_address = other.new_receiving_address("");
        other.credit(&other_address, 5 * COIN, 3);

        let manager = Arc::new(MemoryWalletManager::new());
        manager.add_wallet(wallet.clone());
        manager.add_wallet(other);

        let (sink, receiver) = EventSink::channel();
        (wallet, AggregateCache::new(manager, sink), receiver)
    }

    fn drain(receiver: &mut UnboundedReceiver<WalletEvent>) -> Vec<WalletEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let (wallet, mut cache, mut receiver) = setup();
        let address = wallet.new_receiving_address("");
        wallet.credit(&address, 10 * COIN, 1);

        let delta = cache.refresh_if_changed(wallet.as_ref()).expect("first refresh");
        assert!(delta.amounts_changed);
        assert_eq!(delta.snapshot.spendable, 10 * COIN);
        assert!(cache.refresh_if_changed(wallet.as_ref()).is_none());

        assert_eq!(
            drain(&mut receiver),
            vec![
                WalletEvent::BalanceChanged {
                    spendable: 10 * COIN,
                    stake: 0,
                    unconfirmed: 0,
                    immature: 0,
                },
                WalletEvent::TotalBalanceChanged(15 * COIN),
                WalletEvent::TransactionCountChanged(1),
            ]
        );
    }

    #[test]
    fn test_new_height_updates_snapshot_without_delta() {
        let (wallet, mut cache, mut receiver) = setup();
        let watcher = cache.subscribe();

        assert!(cache.note_chain_height(7, wallet.as_ref()).is_none());
        assert_eq!(watcher.borrow().chain_height, 7);
        assert!(drain(&mut receiver).is_empty());

        // Same height never re-reads the engine.
        let address = wallet.new_receiving_address("");
        wallet.credit(&address, COIN, 1);
        assert!(cache.note_chain_height(7, wallet.as_ref()).is_none());
        assert!(cache.note_chain_height(8, wallet.as_ref()).is_some());
    }

    #[test]
    fn test_transaction_count_change_alone_skips_balance_events() {
        let (wallet, mut cache, mut receiver) = setup();
        let address = wallet.new_receiving_address("");
        wallet.credit(&address, COIN, -1);

        let delta = cache.refresh_if_changed(wallet.as_ref()).expect("count moved");
        assert!(!delta.amounts_changed);
        assert!(delta.transaction_count_changed);
        assert_eq!(
            drain(&mut receiver),
            vec![WalletEvent::TransactionCountChanged(1)]
        );
    }
}
