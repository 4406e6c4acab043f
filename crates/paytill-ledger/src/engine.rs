//! The ledger engine: balance mutation protocols over the wallet store
//!
//! The engine is the only component permitted to mutate a wallet's
//! sub-balances. Every mutation runs as an atomic unit of work under the
//! wallet's row lock and is paired with exactly one transaction record, so
//! the journal explains every balance change. Amount validation happens
//! before any lock is taken; balance checks happen inside the unit, against
//! the current row state.

use std::sync::Arc;

use chrono::Utc;
use paytill_types::{
    Currency, EntryType, OwnerKey, PaytillError, Result, TransactionId, TransactionRef,
    TransactionStatus, Wallet, WalletKey, WalletTransaction,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::{HistoryQuery, WalletStore};

/// Ids of the two journal records written by a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// The debit recorded on the source wallet
    pub debit_transaction_id: TransactionId,
    /// The credit recorded on the destination wallet
    pub credit_transaction_id: TransactionId,
}

/// Enforces atomic balance mutation and produces the transaction audit trail.
///
/// Cheap to clone; all clones share the same store.
#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<WalletStore>,
}

impl LedgerEngine {
    /// Create an engine over an injected wallet store
    pub fn new(store: Arc<WalletStore>) -> Self {
        Self { store }
    }

    /// The underlying wallet store
    pub fn store(&self) -> &Arc<WalletStore> {
        &self.store
    }

    /// Increment a wallet's spendable balance.
    ///
    /// Writes a COMPLETED CREDIT record. Fails with
    /// [`PaytillError::InvalidAmount`] when `amount <= 0`.
    pub async fn credit(
        &self,
        wallet: &WalletKey,
        amount: Decimal,
        description: impl Into<String>,
        reference: Option<TransactionRef>,
    ) -> Result<TransactionId> {
        ensure_positive(amount)?;
        let description = description.into();

        let id = self
            .store
            .mutate(wallet, |draft, unit| {
                draft.balance += amount;
                let transaction = new_transaction(
                    draft,
                    EntryType::Credit,
                    amount,
                    description,
                    reference,
                    TransactionStatus::Completed,
                );
                let id = transaction.id.clone();
                unit.insert(transaction);
                Ok(id)
            })
            .await?;

        debug!(wallet = %wallet, amount = %amount, transaction = %id, "credit applied");
        Ok(id)
    }

    /// Decrement a wallet's spendable balance.
    ///
    /// The balance check and the decrement run inside one atomic unit, so a
    /// concurrent debit can never observe a stale balance. Writes a COMPLETED
    /// DEBIT record.
    pub async fn debit(
        &self,
        wallet: &WalletKey,
        amount: Decimal,
        description: impl Into<String>,
        reference: Option<TransactionRef>,
    ) -> Result<TransactionId> {
        ensure_positive(amount)?;
        let description = description.into();

        let id = self
            .store
            .mutate(wallet, |draft, unit| {
                if draft.balance < amount {
                    return Err(PaytillError::InsufficientBalance {
                        wallet: wallet.to_string(),
                        requested: amount,
                        available: draft.balance,
                    });
                }
                draft.balance -= amount;
                let transaction = new_transaction(
                    draft,
                    EntryType::Debit,
                    amount,
                    description,
                    reference,
                    TransactionStatus::Completed,
                );
                let id = transaction.id.clone();
                unit.insert(transaction);
                Ok(id)
            })
            .await?;

        debug!(wallet = %wallet, amount = %amount, transaction = %id, "debit applied");
        Ok(id)
    }

    /// Record an unfinalized mutation as a PENDING transaction.
    ///
    /// - CREDIT: increments `pending_balance` (incoming funds awaiting
    ///   confirmation).
    /// - DEBIT: a payout hold. Moves `amount` from `balance` into
    ///   `pending_balance`; fails with
    ///   [`PaytillError::InsufficientAvailableBalance`] when the spendable
    ///   balance cannot cover the hold.
    ///
    /// The reservation is later finalized by [`Self::complete_pending`] or
    /// undone by [`Self::cancel_pending`].
    pub async fn create_pending(
        &self,
        wallet: &WalletKey,
        entry: EntryType,
        amount: Decimal,
        description: impl Into<String>,
        reference: Option<TransactionRef>,
    ) -> Result<TransactionId> {
        ensure_positive(amount)?;
        let description = description.into();

        let id = self
            .store
            .mutate(wallet, |draft, unit| {
                match entry {
                    EntryType::Credit => {
                        draft.pending_balance += amount;
                    }
                    EntryType::Debit => {
                        if draft.balance < amount {
                            return Err(PaytillError::InsufficientAvailableBalance {
                                wallet: wallet.to_string(),
                                requested: amount,
                                available: draft.balance,
                            });
                        }
                        draft.balance -= amount;
                        draft.pending_balance += amount;
                    }
                }
                let transaction = new_transaction(
                    draft,
                    entry,
                    amount,
                    description,
                    reference,
                    TransactionStatus::Pending,
                );
                let id = transaction.id.clone();
                unit.insert(transaction);
                Ok(id)
            })
            .await?;

        debug!(
            wallet = %wallet,
            entry = %entry,
            amount = %amount,
            transaction = %id,
            "pending transaction created"
        );
        Ok(id)
    }

    /// Finalize an earlier reservation.
    ///
    /// CREDIT: moves the reserved amount from `pending_balance` to `balance`.
    /// DEBIT: drains the hold from `pending_balance`; the funds have left the
    /// platform. Flips the record to COMPLETED. Fails with
    /// [`PaytillError::TransactionNotPending`] unless the record is PENDING.
    pub async fn complete_pending(&self, transaction_id: &TransactionId) -> Result<WalletTransaction> {
        let key = self.transaction_key(transaction_id)?;

        let completed = self
            .store
            .mutate(&key, |draft, unit| {
                // Re-read under the row lock; the earlier snapshot may be stale.
                let mut transaction = self.require_transaction(transaction_id)?;
                if transaction.status != TransactionStatus::Pending {
                    return Err(PaytillError::TransactionNotPending {
                        transaction_id: transaction_id.to_string(),
                        status: transaction.status.to_string(),
                    });
                }

                take_from_pending(draft, &transaction)?;
                if transaction.entry == EntryType::Credit {
                    draft.balance += transaction.amount;
                }

                transaction.status = TransactionStatus::Completed;
                transaction.completed_at = Some(Utc::now());
                unit.update(transaction.clone());
                Ok(transaction)
            })
            .await?;

        info!(transaction = %transaction_id, wallet = %key, "pending transaction completed");
        Ok(completed)
    }

    /// Undo a reservation without writing a compensating record.
    ///
    /// CREDIT: the unconfirmed incoming funds are dropped from
    /// `pending_balance`. DEBIT: the hold is returned to `balance`. Marks the
    /// record REVERSED. Fails with [`PaytillError::TransactionNotPending`]
    /// unless the record is PENDING.
    pub async fn cancel_pending(
        &self,
        transaction_id: &TransactionId,
        reason: &str,
    ) -> Result<WalletTransaction> {
        let key = self.transaction_key(transaction_id)?;

        let cancelled = self
            .store
            .mutate(&key, |draft, unit| {
                let mut transaction = self.require_transaction(transaction_id)?;
                if transaction.status != TransactionStatus::Pending {
                    return Err(PaytillError::TransactionNotPending {
                        transaction_id: transaction_id.to_string(),
                        status: transaction.status.to_string(),
                    });
                }

                take_from_pending(draft, &transaction)?;
                if transaction.entry == EntryType::Debit {
                    draft.balance += transaction.amount;
                }

                transaction.status = TransactionStatus::Reversed;
                transaction.reversed_at = Some(Utc::now());
                unit.update(transaction.clone());
                Ok(transaction)
            })
            .await?;

        info!(transaction = %transaction_id, wallet = %key, reason, "pending transaction cancelled");
        Ok(cancelled)
    }

    /// Reverse a completed mutation with a compensating record.
    ///
    /// Writes a new, opposite-entry COMPLETED transaction described as
    /// `Reversal: {original description}` carrying the original's reference,
    /// applies the inverse delta to `balance`, and marks the original
    /// REVERSED. Reversal is additive: the original record is never rewritten
    /// or deleted. Fails with [`PaytillError::AlreadyReversed`] when the
    /// record was already reversed; pending reservations go through
    /// [`Self::cancel_pending`] instead.
    pub async fn reverse(&self, transaction_id: &TransactionId, reason: &str) -> Result<TransactionId> {
        let key = self.transaction_key(transaction_id)?;

        let reversal_id = self
            .store
            .mutate(&key, |draft, unit| {
                let mut original = self.require_transaction(transaction_id)?;
                match original.status {
                    TransactionStatus::Reversed => Err(PaytillError::AlreadyReversed {
                        transaction_id: transaction_id.to_string(),
                    }),
                    TransactionStatus::Pending => Err(PaytillError::TransactionNotCompleted {
                        transaction_id: transaction_id.to_string(),
                        status: original.status.to_string(),
                    }),
                    TransactionStatus::Completed => {
                        match original.entry {
                            EntryType::Credit => {
                                if draft.balance < original.amount {
                                    return Err(PaytillError::InsufficientBalance {
                                        wallet: draft.key().to_string(),
                                        requested: original.amount,
                                        available: draft.balance,
                                    });
                                }
                                draft.balance -= original.amount;
                            }
                            EntryType::Debit => {
                                draft.balance += original.amount;
                            }
                        }

                        let reversal = new_transaction(
                            draft,
                            original.entry.opposite(),
                            original.amount,
                            format!("Reversal: {}", original.description),
                            original.reference.clone(),
                            TransactionStatus::Completed,
                        );
                        let reversal_id = reversal.id.clone();

                        original.status = TransactionStatus::Reversed;
                        original.reversed_at = Some(Utc::now());
                        unit.update(original);
                        unit.insert(reversal);
                        Ok(reversal_id)
                    }
                }
            })
            .await?;

        info!(
            original = %transaction_id,
            reversal = %reversal_id,
            reason,
            "transaction reversed"
        );
        Ok(reversal_id)
    }

    /// Freeze spendable funds for a dispute hold.
    ///
    /// Moves `amount` from `balance` to `locked_balance`. No journal record
    /// is written: net owned funds are unchanged.
    pub async fn lock(&self, wallet: &WalletKey, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;

        self.store
            .mutate(wallet, |draft, _| {
                if draft.balance < amount {
                    return Err(PaytillError::InsufficientBalance {
                        wallet: wallet.to_string(),
                        requested: amount,
                        available: draft.balance,
                    });
                }
                draft.balance -= amount;
                draft.locked_balance += amount;
                Ok(())
            })
            .await?;

        info!(wallet = %wallet, amount = %amount, "funds locked");
        Ok(())
    }

    /// Return previously locked funds to the spendable balance.
    pub async fn release(&self, wallet: &WalletKey, amount: Decimal) -> Result<()> {
        ensure_positive(amount)?;

        self.store
            .mutate(wallet, |draft, _| {
                if draft.locked_balance < amount {
                    return Err(PaytillError::InsufficientLockedBalance {
                        wallet: wallet.to_string(),
                        requested: amount,
                        locked: draft.locked_balance,
                    });
                }
                draft.locked_balance -= amount;
                draft.balance += amount;
                Ok(())
            })
            .await?;

        info!(wallet = %wallet, amount = %amount, "funds released");
        Ok(())
    }

    /// Move funds between two owners' wallets in the same currency.
    ///
    /// One debit on the source and one credit on the destination, applied as
    /// a single atomic unit spanning both rows: if the source cannot cover
    /// the amount, neither side is applied. Fails with
    /// [`PaytillError::SameWallet`] on self-transfer.
    pub async fn transfer(
        &self,
        from: &OwnerKey,
        to: &OwnerKey,
        amount: Decimal,
        currency: &Currency,
        description: impl Into<String>,
    ) -> Result<TransferReceipt> {
        ensure_positive(amount)?;

        let from_key = WalletKey::new(from.owner.clone(), from.owner_kind, currency.clone());
        let to_key = WalletKey::new(to.owner.clone(), to.owner_kind, currency.clone());
        if from_key == to_key {
            return Err(PaytillError::SameWallet {
                wallet: from_key.to_string(),
            });
        }
        let description = description.into();

        let receipt = self
            .store
            .mutate_pair(&from_key, &to_key, |source, dest, unit| {
                if source.balance < amount {
                    return Err(PaytillError::InsufficientBalance {
                        wallet: source.key().to_string(),
                        requested: amount,
                        available: source.balance,
                    });
                }
                source.balance -= amount;
                dest.balance += amount;

                let debit = new_transaction(
                    source,
                    EntryType::Debit,
                    amount,
                    format!("Transfer to {} {}: {}", dest.owner_kind, dest.owner, description),
                    None,
                    TransactionStatus::Completed,
                );
                let credit = new_transaction(
                    dest,
                    EntryType::Credit,
                    amount,
                    format!(
                        "Transfer from {} {}: {}",
                        source.owner_kind, source.owner, description
                    ),
                    None,
                    TransactionStatus::Completed,
                );
                let receipt = TransferReceipt {
                    debit_transaction_id: debit.id.clone(),
                    credit_transaction_id: credit.id.clone(),
                };
                unit.insert(debit);
                unit.insert(credit);
                Ok(receipt)
            })
            .await?;

        info!(from = %from_key, to = %to_key, amount = %amount, "transfer applied");
        Ok(receipt)
    }

    /// Page through a wallet's journal, newest first
    pub fn history(&self, query: &HistoryQuery) -> Vec<WalletTransaction> {
        self.store.history(query)
    }

    /// Snapshot of one transaction record
    pub fn transaction(&self, transaction_id: &TransactionId) -> Result<WalletTransaction> {
        self.require_transaction(transaction_id)
    }

    /// The wallet for `key`, created zero-balanced if absent
    pub async fn wallet(&self, key: &WalletKey) -> Wallet {
        self.store.get_or_create(key).await
    }

    /// Current spendable balance, zero when the wallet does not exist
    pub async fn balance(&self, key: &WalletKey) -> Decimal {
        self.store
            .get(key)
            .await
            .map(|wallet| wallet.balance)
            .unwrap_or(Decimal::ZERO)
    }

    fn require_transaction(&self, transaction_id: &TransactionId) -> Result<WalletTransaction> {
        self.store
            .transaction(transaction_id)
            .ok_or_else(|| PaytillError::TransactionNotFound {
                transaction_id: transaction_id.to_string(),
            })
    }

    fn transaction_key(&self, transaction_id: &TransactionId) -> Result<WalletKey> {
        Ok(self.require_transaction(transaction_id)?.wallet_key())
    }
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(PaytillError::InvalidAmount { amount });
    }
    Ok(())
}

fn take_from_pending(wallet: &mut Wallet, transaction: &WalletTransaction) -> Result<()> {
    // Each pending record drains at most once, so this holds unless the
    // journal and the row disagree.
    if wallet.pending_balance < transaction.amount {
        return Err(PaytillError::internal(format!(
            "pending balance {} of wallet {} cannot cover transaction {}",
            wallet.pending_balance,
            wallet.key(),
            transaction.id
        )));
    }
    wallet.pending_balance -= transaction.amount;
    Ok(())
}

fn new_transaction(
    wallet: &Wallet,
    entry: EntryType,
    amount: Decimal,
    description: String,
    reference: Option<TransactionRef>,
    status: TransactionStatus,
) -> WalletTransaction {
    let now = Utc::now();
    WalletTransaction {
        id: TransactionId::new(),
        wallet_id: wallet.id.clone(),
        owner: wallet.owner.clone(),
        owner_kind: wallet.owner_kind,
        currency: wallet.currency.clone(),
        entry,
        amount,
        description,
        reference,
        status,
        created_at: now,
        completed_at: match status {
            TransactionStatus::Completed => Some(now),
            _ => None,
        },
        reversed_at: None,
    }
}
