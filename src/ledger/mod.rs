//! Ledger module for accounts, the bank that groups them, and batch processing.
mod account;
mod bank;
mod state;
mod transaction;
mod types;

pub use account::*;
pub use bank::*;
pub use state::*;
pub use transaction::*;
pub use types::*;
