//! An exact-decimal monetary ledger: accounts, a bank that groups them, and atomic transfers.
pub mod ledger;
