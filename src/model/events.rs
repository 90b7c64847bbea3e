//! Outward event plumbing for the wallet model.
//!
//! The model never calls into the presentation layer directly. State changes are emitted as
//! [`WalletEvent`]s into an [`EventSink`], an unbounded queue with a single consumer. The consumer
//! side owns an [`EventDispatcher`] that fans each event out to the registered
//! [`WalletEventHandler`]s, so delivery always happens on the task that owns the handlers.

use crate::engine::{Amount, ChangeType, EncryptionState, TxId};
use crate::model::WalletModelError;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};

/// Events exposed to observers of the wallet model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    EncryptionStatusChanged(EncryptionState),
    BalanceChanged {
        spendable: Amount,
        stake: Amount,
        unconfirmed: Amount,
        immature: Amount,
    },
    /// Sum of balances across every loaded wallet
    TotalBalanceChanged(Amount),
    TransactionCountChanged(usize),
    /// An operation is waiting for the wallet to be unlocked
    UnlockRequired,
    AddressBookEntryChanged {
        address: String,
        label: String,
        is_mine: bool,
        status: ChangeType,
    },
    TransactionStatusChanged {
        txid: TxId,
        status: ChangeType,
    },
}

/// Producer side of the event queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: UnboundedSender<WalletEvent>,
}

impl EventSink {
    /// Create a sink and the receiver its events are delivered to.
    pub fn channel() -> (Self, UnboundedReceiver<WalletEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue an event. Events emitted after the consumer has gone away are dropped.
    pub fn emit(&self, event: WalletEvent) {
        debug!("Emitting {:?}", event);
        if self.sender.send(event).is_err() {
            debug!("Event consumer has gone away, dropping event");
        }
    }
}

/// Trait for handling wallet events.
#[async_trait::async_trait]
pub trait WalletEventHandler: Send + Sync {
    async fn handle(&mut self, event: &WalletEvent) -> Result<(), WalletModelError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in registration order. A failing handler is logged and does not stop
/// the others.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn WalletEventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register_handler(&mut self, handler: Box<dyn WalletEventHandler>) {
        self.handlers.push(handler);
    }

    pub async fn dispatch(&mut self, event: &WalletEvent) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }
    }

    /// Dispatch everything already queued, without waiting. Returns the number of events.
    pub async fn drain(&mut self, receiver: &mut UnboundedReceiver<WalletEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = receiver.try_recv() {
            self.dispatch(&event).await;
            count += 1;
        }
        count
    }

    /// Dispatch events until every sink has been dropped.
    pub async fn run(mut self, mut receiver: UnboundedReceiver<WalletEvent>) {
        while let Some(event) = receiver.recv().await {
            self.dispatch(&event).await;
        }
        debug!("Event queue closed, dispatcher stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        seen: Arc<Mutex<Vec<WalletEvent>>>,
    }

    #[async_trait::async_trait]
    impl WalletEventHandler for Recorder {
        async fn handle(&mut self, event: &WalletEvent) -> Result<(), WalletModelError> {
            self.seen.lock().unwrap().push(event.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Recorder"
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl WalletEventHandler for Failing {
        async fn handle(&mut self, _event: &WalletEvent) -> Result<(), WalletModelError> {
            Err(WalletModelError::ConfigError("boom".to_string()))
        }

        fn name(&self) -> &'static str {
            "Failing"
        }
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(Box::new(Failing));
        dispatcher.register_handler(Box::new(Recorder { seen: seen.clone() }));

        let (sink, mut receiver) = EventSink::channel();
        sink.emit(WalletEvent::UnlockRequired);
        sink.emit(WalletEvent::TransactionCountChanged(3));

        assert_eq!(dispatcher.drain(&mut receiver).await, 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                WalletEvent::UnlockRequired,
                WalletEvent::TransactionCountChanged(3)
            ]
        );
    }

    #[tokio::test]
    async fn test_run_stops_when_sinks_are_dropped() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(Box::new(Recorder { seen: seen.clone() }));

        let (sink, receiver) = EventSink::channel();
        sink.emit(WalletEvent::TotalBalanceChanged(5));
        drop(sink);

        dispatcher.run(receiver).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
