//! Wallet transaction audit records
//!
//! Every value-changing wallet mutation is paired with exactly one
//! [`WalletTransaction`]. Records are append-only: the ledger engine performs
//! status transitions but never rewrites amounts or deletes rows, so the
//! journal is the sole source of truth for "why did this balance change".

use crate::{Currency, OwnerId, OwnerKind, TransactionId, TransactionRef, WalletId, WalletKey};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a balance mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    /// Funds flowing into the wallet
    Credit,
    /// Funds flowing out of the wallet
    Debit,
}

impl EntryType {
    /// The opposite direction, used for compensating reversal entries
    pub fn opposite(&self) -> Self {
        match self {
            Self::Credit => Self::Debit,
            Self::Debit => Self::Credit,
        }
    }

    /// Stable uppercase name as stored and logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a wallet transaction
///
/// Allowed transitions: `Pending -> Completed` (a reservation finalized),
/// `Pending -> Reversed` (a reservation cancelled), `Completed -> Reversed`
/// (a compensating reversal). `Reversed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Reservation recorded, funds in `pending_balance`
    Pending,
    /// Mutation fully applied
    Completed,
    /// Undone by cancellation or a compensating reversal
    Reversed,
}

impl TransactionStatus {
    /// Whether no further transitions are allowed from this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reversed)
    }

    /// Stable uppercase name as stored and logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Reversed => "REVERSED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable audit record of one balance mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    pub owner: OwnerId,
    pub owner_kind: OwnerKind,
    pub currency: Currency,
    pub entry: EntryType,
    /// Always positive; direction is carried by `entry`
    pub amount: Decimal,
    pub description: String,
    /// Correlation to the originating business event, if any
    pub reference: Option<TransactionRef>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reversed_at: Option<DateTime<Utc>>,
}

impl WalletTransaction {
    /// Whether this record is still an unfinalized reservation
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// The key of the wallet this transaction belongs to
    pub fn wallet_key(&self) -> WalletKey {
        WalletKey {
            owner: self.owner.clone(),
            owner_kind: self.owner_kind,
            currency: self.currency.clone(),
        }
    }
}
