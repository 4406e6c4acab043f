//! Paytill Settlement - turning accumulated wallet balance into payouts
//!
//! Settlement rides on the ledger's pending-debit hold: creating a settlement
//! reserves the payout amount out of the wallet's spendable balance,
//! completion drains the hold off the platform, cancellation returns it. The
//! hold's transaction record and the settlement cross-link by id, so either
//! side of the books explains the other.
//!
//! Owners settle on a schedule (DAILY, WEEKLY at Monday midnight UTC, or
//! MANUAL on request). [`engine::SettlementEngine::run_due`] sweeps due
//! schedules once; [`driver::SettlementDriver`] repeats that sweep on an
//! interval.

pub mod driver;
pub mod engine;
pub mod planner;
pub mod store;

pub use driver::{DriverConfig, SettlementDriver, SETTLE_INTERVAL_ENV};
pub use engine::{RunReport, SettlementEngine};
pub use store::{SettlementStore, DEFAULT_SETTLEMENT_HISTORY_LIMIT};
