//! Wallet model synchronization layer.
//!
//! Sits between a wallet engine and a presentation layer: caches aggregate balances and detects
//! changes, groups spendable outputs by funding address, scopes wallet unlocks and runs the
//! validate, build, confirm and commit pipeline for outgoing payments.

pub mod config;
pub mod engine;
pub mod model;
pub mod transaction;
pub mod utils;
