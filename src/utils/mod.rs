//!
//! Utility module for the wallet model.
//!
//! Re-exports formatting helpers used in log output throughout the codebase.
/// Utility functions for formatting and display
pub mod index;

pub use index::format_amount;
