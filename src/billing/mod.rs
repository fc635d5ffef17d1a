//! Billing operations: payments, wallets, reports and the orchestrator

pub mod association;
pub mod report;
pub mod transaction;
pub mod wallet;

pub use association::*;
pub use report::*;
pub use transaction::*;
pub use wallet::*;
