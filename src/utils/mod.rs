//! Utility modules

pub mod memory_notifier;
pub mod memory_storage;
pub mod validation;

pub use memory_notifier::*;
pub use memory_storage::*;
pub use validation::*;
