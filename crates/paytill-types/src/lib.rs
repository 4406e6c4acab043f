//! Paytill Types - Canonical domain types for the wallet & settlement ledger
//!
//! This crate contains all foundational types for paytill with zero
//! dependencies on other paytill crates:
//!
//! - Identity types (WalletId, TransactionId, SettlementId, owner keys)
//! - Currency codes and decimal amounts
//! - Wallet records with the three accounting sub-balances
//! - Transaction audit records and their status machine
//! - Settlement batches, schedules, and summaries
//! - The error taxonomy shared by every engine
//!
//! # Accounting Invariants
//!
//! The types encode the core ledger invariants:
//!
//! 1. All three sub-balances (`balance`, `pending_balance`, `locked_balance`)
//!    are non-negative at all times
//! 2. Every value-changing mutation pairs with exactly one transaction record
//! 3. Transaction and settlement records are append-only; only status
//!    transitions mutate them
//! 4. Money is never created or destroyed by a state transition

pub mod currency;
pub mod error;
pub mod identity;
pub mod settlement;
pub mod transaction;
pub mod wallet;

pub use currency::*;
pub use error::*;
pub use identity::*;
pub use settlement::*;
pub use transaction::*;
pub use wallet::*;
