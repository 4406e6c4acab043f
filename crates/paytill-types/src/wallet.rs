//! Wallet records with three accounting sub-balances
//!
//! A wallet tracks one owner's funds in one currency across three named
//! sub-balances:
//!
//! - `balance` — spendable funds
//! - `pending_balance` — funds earmarked for an in-flight settlement or an
//!   unconfirmed incoming credit
//! - `locked_balance` — funds frozen for a dispute or hold
//!
//! All three are non-negative at all times. Wallets are created lazily on
//! first reference and never deleted.

use crate::{Currency, OwnerId, OwnerKind, WalletId, WalletKey};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One owner's balance record in one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub owner: OwnerId,
    pub owner_kind: OwnerKind,
    pub currency: Currency,
    /// Spendable funds
    pub balance: Decimal,
    /// Funds awaiting settlement payout or credit confirmation
    pub pending_balance: Decimal,
    /// Funds frozen for disputes
    pub locked_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// Create a zero-balance wallet for the given key
    pub fn new(key: WalletKey) -> Self {
        let now = Utc::now();
        Self {
            id: WalletId::new(),
            owner: key.owner,
            owner_kind: key.owner_kind,
            currency: key.currency,
            balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            locked_balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// The unique (owner, kind, currency) key of this wallet
    pub fn key(&self) -> WalletKey {
        WalletKey {
            owner: self.owner.clone(),
            owner_kind: self.owner_kind,
            currency: self.currency.clone(),
        }
    }

    /// Funds available for settlement or lock: `balance + pending_balance`
    pub fn available_balance(&self) -> Decimal {
        self.balance + self.pending_balance
    }

    /// Build the query-surface summary of this wallet
    pub fn summary(&self) -> WalletSummary {
        WalletSummary {
            owner: self.owner.clone(),
            owner_kind: self.owner_kind,
            currency: self.currency.clone(),
            balance: self.balance,
            pending_balance: self.pending_balance,
            locked_balance: self.locked_balance,
            available_balance: self.available_balance(),
        }
    }
}

/// Per-currency wallet snapshot annotated with the derived available balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub owner: OwnerId,
    pub owner_kind: OwnerKind,
    pub currency: Currency,
    pub balance: Decimal,
    pub pending_balance: Decimal,
    pub locked_balance: Decimal,
    /// `balance + pending_balance`
    pub available_balance: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_wallet_is_zeroed() {
        let wallet = Wallet::new(WalletKey::new("S1", OwnerKind::Store, Currency::usd()));
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(wallet.pending_balance, Decimal::ZERO);
        assert_eq!(wallet.locked_balance, Decimal::ZERO);
    }

    #[test]
    fn test_available_balance_sums_pending() {
        let mut wallet = Wallet::new(WalletKey::new("S1", OwnerKind::Store, Currency::usd()));
        wallet.balance = dec!(70);
        wallet.pending_balance = dec!(30);
        wallet.locked_balance = dec!(5);
        assert_eq!(wallet.available_balance(), dec!(100));

        let summary = wallet.summary();
        assert_eq!(summary.available_balance, dec!(100));
        assert_eq!(summary.locked_balance, dec!(5));
    }
}
