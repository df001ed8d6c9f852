//! Core data structures for the simulated ledger
//!
//! This crate provides the plain data shared by the execution engine and
//! the harnesses that drive it:
//! - Basic types (Address, TxHash, tri-state fields, big-endian helpers)
//! - Transaction descriptors and expected results
//! - The VM input/output contract

pub mod error;
pub mod input;
pub mod output;
pub mod transaction;
pub mod types;

// Re-export commonly used types
pub use error::*;
pub use input::*;
pub use output::*;
pub use transaction::*;
pub use types::*;
