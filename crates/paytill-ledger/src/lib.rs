//! Paytill Ledger - atomic wallet accounting with a complete audit trail
//!
//! The ledger tracks one wallet row per (owner, owner kind, currency) and
//! linearizes all mutations of a row behind its lock. Four rules hold at all
//! times:
//!
//! 1. No sub-balance ever goes negative
//! 2. Every balance change is paired with exactly one transaction record
//! 3. Failed operations leave no partial effect
//! 4. Two-row operations (transfers) commit both sides or neither
//!
//! [`store::WalletStore`] owns the rows and the journal and provides the
//! unit-of-work primitive; [`engine::LedgerEngine`] implements the balance
//! protocols (credit, debit, holds, reversal, lock, transfer) on top of it.

pub mod engine;
pub mod store;

pub use engine::{LedgerEngine, TransferReceipt};
pub use store::{HistoryQuery, UnitOfWork, WalletStore, DEFAULT_HISTORY_LIMIT};
