//! # CVConnect Core
//!
//! Billing and payment reconciliation for a homeowners' association.
//!
//! ## Features
//!
//! - **Payment submission**: Homeowners submit payments against monthly statements
//! - **Reconciliation**: Completed payments are allocated across water, HOA maintenance and garbage charges
//! - **Organization ledger**: Every collected payment is appended to the association's wallet history
//! - **Homeowner wallets**: Overpayments are credited to the payer's wallet
//! - **Notifications**: Completion and rejection emails are rendered and handed to a [`Notifier`]
//! - **Storage abstraction**: Database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use cvconnect_core::{Association, TransactionStatus};
//! use cvconnect_core::utils::{MemoryNotifier, MemoryStorage};
//!
//! // let association = Association::new(MemoryStorage::new(), Box::new(MemoryNotifier::new()));
//! // association.apply_transaction_status("CVT...", TransactionStatus::Completed, None).await?;
//! ```

pub mod billing;
pub mod config;
pub mod notification;
pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use billing::*;
pub use config::EngineConfig;
pub use notification::Notification;
pub use reconciliation::{ReconciliationEngine, StatusUpdateOutcome};
pub use traits::*;
pub use types::*;
