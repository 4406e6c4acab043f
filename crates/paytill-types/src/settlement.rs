//! Settlement batches and per-owner settlement schedules
//!
//! A settlement converts accumulated wallet balance into a payout obligation.
//! It is created `Pending` with a matching pending debit on the wallet, then
//! either `Completed` (funds paid out, gone from the wallet) or `Failed`
//! (cancelled, funds returned). Schedules drive when automatic settlements
//! are attempted for an owner.

use crate::error::PaytillError;
use crate::{Currency, OwnerId, OwnerKey, OwnerKind, SettlementId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How often automatic settlements are attempted for an owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    /// Every calendar day at midnight UTC
    Daily,
    /// Every Monday at midnight UTC
    Weekly,
    /// Never automatic; settlements only by explicit request
    Manual,
}

impl Frequency {
    /// Whether schedules with this frequency are picked up by the periodic driver
    pub fn is_automatic(&self) -> bool {
        !matches!(self, Self::Manual)
    }

    /// Stable uppercase name as stored and logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = PaytillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MANUAL" => Ok(Self::Manual),
            other => Err(PaytillError::InvalidFrequency {
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle state of a settlement batch
///
/// `Pending` settlements hold funds in the wallet's `pending_balance`;
/// `Completed` and `Failed` are terminal. `Failed` also represents
/// cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    /// Created, payout hold in place
    Pending,
    /// Payout executed, funds left the platform
    Completed,
    /// Cancelled or failed, hold returned to the wallet
    Failed,
}

impl SettlementStatus {
    /// Whether no further transitions are allowed from this state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Stable uppercase name as stored and logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-owner policy controlling automatic settlement timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementSchedule {
    pub owner: OwnerId,
    pub owner_kind: OwnerKind,
    pub frequency: Frequency,
    /// Balances below this are skipped by automatic settlement
    pub minimum_amount: Decimal,
    pub currency: Currency,
    /// When the next automatic settlement is due
    pub next_settlement: DateTime<Utc>,
    /// When this owner last settled successfully
    pub last_settlement: Option<DateTime<Utc>>,
    /// Inactive schedules are ignored by the periodic driver
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettlementSchedule {
    /// Create a schedule; a negative minimum is treated as zero
    pub fn new(
        key: OwnerKey,
        frequency: Frequency,
        minimum_amount: Decimal,
        currency: Currency,
        next_settlement: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            owner: key.owner,
            owner_kind: key.owner_kind,
            frequency,
            minimum_amount: minimum_amount.max(Decimal::ZERO),
            currency,
            next_settlement,
            last_settlement: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// The unique (owner, kind) key of this schedule
    pub fn key(&self) -> OwnerKey {
        OwnerKey {
            owner: self.owner.clone(),
            owner_kind: self.owner_kind,
        }
    }

    /// Whether the periodic driver should settle this schedule at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.frequency.is_automatic() && self.next_settlement <= now
    }
}

/// A batched payout obligation covering one accounting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub owner: OwnerId,
    pub owner_kind: OwnerKind,
    /// Always positive
    pub amount: Decimal,
    pub currency: Currency,
    /// Start of the accounting period this payout covers
    pub period_start: DateTime<Utc>,
    /// End of the accounting period this payout covers
    pub period_end: DateTime<Utc>,
    /// Payout method, e.g. `"BANK_TRANSFER"`
    pub method: Option<String>,
    pub description: String,
    pub status: SettlementStatus,
    /// The pending debit holding this settlement's funds
    pub transaction_id: TransactionId,
    /// External payout reference recorded on completion
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    /// When the settlement reached a terminal state
    pub processed_at: Option<DateTime<Utc>>,
}

impl Settlement {
    /// Whether this settlement is still awaiting payout
    pub fn is_pending(&self) -> bool {
        self.status == SettlementStatus::Pending
    }
}

/// Aggregates over settlements created within one accounting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_settlements: usize,
    pub completed_settlements: usize,
    pub pending_settlements: usize,
    pub failed_settlements: usize,
    /// Sum of completed settlement amounts in the period
    pub total_settled_amount: Decimal,
    /// Mean completed settlement amount, zero when none completed
    pub average_settlement_amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_frequency_parse() {
        assert_eq!(Frequency::from_str("daily").unwrap(), Frequency::Daily);
        assert_eq!(Frequency::from_str(" WEEKLY ").unwrap(), Frequency::Weekly);
        assert_eq!(Frequency::from_str("MANUAL").unwrap(), Frequency::Manual);

        let err = Frequency::from_str("FORTNIGHTLY").unwrap_err();
        assert!(matches!(err, PaytillError::InvalidFrequency { .. }));
    }

    #[test]
    fn test_negative_minimum_clamped() {
        let schedule = SettlementSchedule::new(
            OwnerKey::new("S1", OwnerKind::Store),
            Frequency::Daily,
            dec!(-10),
            Currency::usd(),
            Utc::now(),
        );
        assert_eq!(schedule.minimum_amount, Decimal::ZERO);
        assert!(schedule.active);
    }

    #[test]
    fn test_is_due_ignores_manual_and_inactive() {
        let now = Utc::now();
        let mut schedule = SettlementSchedule::new(
            OwnerKey::new("S1", OwnerKind::Store),
            Frequency::Daily,
            Decimal::ZERO,
            Currency::usd(),
            now - chrono::Duration::minutes(1),
        );
        assert!(schedule.is_due(now));

        schedule.frequency = Frequency::Manual;
        assert!(!schedule.is_due(now));

        schedule.frequency = Frequency::Weekly;
        schedule.active = false;
        assert!(!schedule.is_due(now));
    }

    #[test]
    fn test_settlement_terminal_states() {
        assert!(!SettlementStatus::Pending.is_terminal());
        assert!(SettlementStatus::Completed.is_terminal());
        assert!(SettlementStatus::Failed.is_terminal());
    }
}
