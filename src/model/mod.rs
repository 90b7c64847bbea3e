//! Wallet model
//!
//! The presentation-facing layer over a wallet engine:
//!
//! - `wallet_model`: the [`WalletModel`] facade with balance queries, sending, encryption,
//!   backups, staking settings and output locking.
//! - `driver`: the [`SyncDriver`] that polls chain height and reacts to engine notifications.
//! - `cache`: the aggregate balance snapshot and change detection.
//! - `grouping`: attribution of spendable outputs to the addresses that funded them.
//! - `unlock`: scoped unlock/relock of the wallet.
//! - `events`: outward events and their dispatcher.

/// Builder for the facade
pub mod builder;
/// Cached aggregate balances
pub mod cache;
/// Poll loop and notification handling
pub mod driver;
/// Outward events
pub mod events;
/// Output grouping by funding address
pub mod grouping;
pub mod types;
/// Unlock scope and unlock requesters
pub mod unlock;
pub mod wallet_model;


pub use builder::WalletModelBuilder;
pub use cache::AggregateCache;
pub use driver::{AddressView, SyncDriver, TickOutcome, TransactionView};
pub use events::{EventDispatcher, EventSink, WalletEvent, WalletEventHandler};
pub use grouping::OutputGrouper;
pub use types::*;
pub use unlock::{
	ChannelUnlockRequester, DeclineUnlock, PassphraseUnlocker, UnlockContext, UnlockRequest,
	UnlockRequester,
};
pub use wallet_model::WalletModel;
