//! In-memory wallet store with row-level locking
//!
//! The wallet row is the unit of mutual exclusion: every read-modify-write
//! runs as a unit of work under the row's async mutex, against a draft copy
//! of the record. Only an `Ok` return commits the draft and its staged
//! journal writes; an `Err` discards both, so a failing operation leaves no
//! partial effect.
//!
//! Queries take snapshots and never block writers globally.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use paytill_types::{
    Currency, OwnerId, OwnerKind, PaytillError, Result, TransactionId, Wallet, WalletKey,
    WalletSummary, WalletTransaction,
};
use tokio::sync::Mutex;

/// Default page size for journal queries
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Query over one wallet's transaction journal, newest first.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub owner: OwnerId,
    pub owner_kind: OwnerKind,
    pub currency: Currency,
    pub limit: usize,
    pub offset: usize,
}

impl HistoryQuery {
    /// Query the journal of the given wallet with default pagination
    pub fn for_wallet(
        owner: impl Into<OwnerId>,
        owner_kind: OwnerKind,
        currency: Currency,
    ) -> Self {
        Self {
            owner: owner.into(),
            owner_kind,
            currency,
            limit: DEFAULT_HISTORY_LIMIT,
            offset: 0,
        }
    }

    /// Set the page size
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the number of newest entries to skip
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn key(&self) -> WalletKey {
        WalletKey {
            owner: self.owner.clone(),
            owner_kind: self.owner_kind,
            currency: self.currency.clone(),
        }
    }
}

/// Journal writes staged by a unit of work.
///
/// Nothing reaches the store until the closure that staged them returns `Ok`.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    inserts: Vec<WalletTransaction>,
    updates: Vec<WalletTransaction>,
}

impl UnitOfWork {
    fn new() -> Self {
        Self::default()
    }

    /// Stage a new transaction record
    pub fn insert(&mut self, transaction: WalletTransaction) {
        self.inserts.push(transaction);
    }

    /// Stage a status transition of an existing record
    pub fn update(&mut self, transaction: WalletTransaction) {
        self.updates.push(transaction);
    }
}

/// Durable (in-process) storage of wallet rows and their transaction journal.
///
/// Thread-safe and designed for concurrent access: operations on different
/// wallet keys proceed fully in parallel, operations on the same key are
/// linearized by the row mutex.
pub struct WalletStore {
    /// Wallet rows; each row mutex is the unit of mutual exclusion
    rows: DashMap<WalletKey, Arc<Mutex<Wallet>>>,
    /// Every transaction ever written, by id (append-only)
    transactions: DashMap<TransactionId, WalletTransaction>,
    /// Per-wallet transaction ids in creation order
    journal: DashMap<WalletKey, Vec<TransactionId>>,
}

impl WalletStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            transactions: DashMap::new(),
            journal: DashMap::new(),
        }
    }

    /// The row for `key`, inserting a zero-balance wallet if absent.
    ///
    /// `DashMap::entry` serializes concurrent first access, so exactly one
    /// wallet ever exists per key.
    fn row(&self, key: &WalletKey) -> Arc<Mutex<Wallet>> {
        self.rows
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Wallet::new(key.clone()))))
            .clone()
    }

    /// Return the wallet for `key`, creating a zero-balance record if absent
    pub async fn get_or_create(&self, key: &WalletKey) -> Wallet {
        let row = self.row(key);
        let guard = row.lock().await;
        guard.clone()
    }

    /// Snapshot of the wallet for `key`, if one exists
    pub async fn get(&self, key: &WalletKey) -> Option<Wallet> {
        let row = match self.rows.get(key) {
            Some(entry) => entry.value().clone(),
            None => return None,
        };
        let guard = row.lock().await;
        Some(guard.clone())
    }

    /// All of an owner's wallets across currencies, sorted by currency code
    pub async fn summarize(&self, owner: &OwnerId, owner_kind: OwnerKind) -> Vec<WalletSummary> {
        let matching: Vec<Arc<Mutex<Wallet>>> = self
            .rows
            .iter()
            .filter(|entry| &entry.key().owner == owner && entry.key().owner_kind == owner_kind)
            .map(|entry| entry.value().clone())
            .collect();

        let mut summaries = Vec::with_capacity(matching.len());
        for row in matching {
            summaries.push(row.lock().await.summary());
        }
        summaries.sort_by(|a, b| a.currency.cmp(&b.currency));
        summaries
    }

    /// Run `f` as an atomic unit of work against the wallet for `key`.
    ///
    /// `f` receives a draft of the current record plus a [`UnitOfWork`] for
    /// journal writes. The row lock is held for the whole call; the draft and
    /// staged writes commit only when `f` returns `Ok`.
    pub async fn mutate<T, F>(&self, key: &WalletKey, f: F) -> Result<T>
    where
        F: FnOnce(&mut Wallet, &mut UnitOfWork) -> Result<T>,
    {
        let row = self.row(key);
        let mut guard = row.lock().await;

        let mut draft = guard.clone();
        let mut unit = UnitOfWork::new();
        let out = f(&mut draft, &mut unit)?;

        draft.updated_at = Utc::now();
        self.apply(unit);
        *guard = draft;
        Ok(out)
    }

    /// Run `f` as one atomic unit spanning two wallet rows.
    ///
    /// Rows are locked in key order regardless of argument order, so two
    /// concurrent pair units can never deadlock. Both drafts commit or
    /// neither does.
    pub async fn mutate_pair<T, F>(&self, key_a: &WalletKey, key_b: &WalletKey, f: F) -> Result<T>
    where
        F: FnOnce(&mut Wallet, &mut Wallet, &mut UnitOfWork) -> Result<T>,
    {
        if key_a == key_b {
            return Err(PaytillError::internal(
                "mutate_pair requires two distinct wallet rows",
            ));
        }

        let row_a = self.row(key_a);
        let row_b = self.row(key_b);
        let (mut guard_a, mut guard_b) = if key_a < key_b {
            let guard_a = row_a.lock().await;
            let guard_b = row_b.lock().await;
            (guard_a, guard_b)
        } else {
            let guard_b = row_b.lock().await;
            let guard_a = row_a.lock().await;
            (guard_a, guard_b)
        };

        let mut draft_a = guard_a.clone();
        let mut draft_b = guard_b.clone();
        let mut unit = UnitOfWork::new();
        let out = f(&mut draft_a, &mut draft_b, &mut unit)?;

        let now = Utc::now();
        draft_a.updated_at = now;
        draft_b.updated_at = now;
        self.apply(unit);
        *guard_a = draft_a;
        *guard_b = draft_b;
        Ok(out)
    }

    fn apply(&self, unit: UnitOfWork) {
        for transaction in unit.updates {
            self.transactions.insert(transaction.id.clone(), transaction);
        }
        for transaction in unit.inserts {
            let id = transaction.id.clone();
            self.journal
                .entry(transaction.wallet_key())
                .or_default()
                .push(id.clone());
            self.transactions.insert(id, transaction);
        }
    }

    /// Snapshot of one transaction record
    pub fn transaction(&self, id: &TransactionId) -> Option<WalletTransaction> {
        self.transactions.get(id).map(|entry| entry.clone())
    }

    /// Page through a wallet's journal, newest first
    pub fn history(&self, query: &HistoryQuery) -> Vec<WalletTransaction> {
        let ids: Vec<TransactionId> = match self.journal.get(&query.key()) {
            Some(ids) => ids.clone(),
            None => return Vec::new(),
        };

        ids.iter()
            .rev()
            .skip(query.offset)
            .take(query.limit)
            .filter_map(|id| self.transactions.get(id).map(|entry| entry.clone()))
            .collect()
    }

    /// Total number of transaction records in the store
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

impl Default for WalletStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paytill_types::{EntryType, TransactionStatus};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn store_key() -> WalletKey {
        WalletKey::new("S1", OwnerKind::Store, Currency::usd())
    }

    fn completed_credit(wallet: &Wallet, amount: Decimal) -> WalletTransaction {
        let now = Utc::now();
        WalletTransaction {
            id: TransactionId::new(),
            wallet_id: wallet.id.clone(),
            owner: wallet.owner.clone(),
            owner_kind: wallet.owner_kind,
            currency: wallet.currency.clone(),
            entry: EntryType::Credit,
            amount,
            description: "test credit".to_string(),
            reference: None,
            status: TransactionStatus::Completed,
            created_at: now,
            completed_at: Some(now),
            reversed_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = WalletStore::new();
        let first = store.get_or_create(&store_key()).await;
        let second = store.get_or_create(&store_key()).await;
        assert_eq!(first.id, second.id);
        assert_eq!(first.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_get_does_not_create() {
        let store = WalletStore::new();
        assert!(store.get(&store_key()).await.is_none());
        store.get_or_create(&store_key()).await;
        assert!(store.get(&store_key()).await.is_some());
    }

    #[tokio::test]
    async fn test_mutate_commits_on_ok() {
        let store = WalletStore::new();
        store
            .mutate(&store_key(), |wallet, unit| {
                wallet.balance += dec!(100);
                unit.insert(completed_credit(wallet, dec!(100)));
                Ok(())
            })
            .await
            .unwrap();

        let wallet = store.get(&store_key()).await.unwrap();
        assert_eq!(wallet.balance, dec!(100));
        assert_eq!(store.transaction_count(), 1);
    }

    #[tokio::test]
    async fn test_mutate_rolls_back_on_err() {
        let store = WalletStore::new();
        store.get_or_create(&store_key()).await;

        let result: Result<()> = store
            .mutate(&store_key(), |wallet, unit| {
                wallet.balance += dec!(999);
                unit.insert(completed_credit(wallet, dec!(999)));
                Err(PaytillError::internal("abort"))
            })
            .await;
        assert!(result.is_err());

        let wallet = store.get(&store_key()).await.unwrap();
        assert_eq!(wallet.balance, Decimal::ZERO);
        assert_eq!(store.transaction_count(), 0);
        let query = HistoryQuery::for_wallet("S1", OwnerKind::Store, Currency::usd());
        assert!(store.history(&query).is_empty());
    }

    #[tokio::test]
    async fn test_mutate_pair_requires_distinct_rows() {
        let store = WalletStore::new();
        let result: Result<()> = store
            .mutate_pair(&store_key(), &store_key(), |_, _, _| Ok(()))
            .await;
        assert!(matches!(result, Err(PaytillError::Internal { .. })));
    }

    #[tokio::test]
    async fn test_mutate_pair_commits_both_rows() {
        let store = WalletStore::new();
        let key_a = store_key();
        let key_b = WalletKey::new("AFF9", OwnerKind::Affiliate, Currency::usd());

        store
            .mutate_pair(&key_a, &key_b, |a, b, _| {
                a.balance += dec!(25);
                b.balance += dec!(75);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(store.get(&key_a).await.unwrap().balance, dec!(25));
        assert_eq!(store.get(&key_b).await.unwrap().balance, dec!(75));
    }

    #[tokio::test]
    async fn test_history_paginates_newest_first() {
        let store = WalletStore::new();
        for amount in [dec!(1), dec!(2), dec!(3)] {
            store
                .mutate(&store_key(), |wallet, unit| {
                    wallet.balance += amount;
                    unit.insert(completed_credit(wallet, amount));
                    Ok(())
                })
                .await
                .unwrap();
        }

        let query = HistoryQuery::for_wallet("S1", OwnerKind::Store, Currency::usd());
        let all = store.history(&query);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].amount, dec!(3));
        assert_eq!(all[2].amount, dec!(1));

        let page = store.history(&query.clone().with_limit(2));
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].amount, dec!(3));

        let tail = store.history(&query.with_limit(2).with_offset(2));
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].amount, dec!(1));
    }

    #[tokio::test]
    async fn test_summarize_spans_currencies() {
        let store = WalletStore::new();
        let usd = store_key();
        let eur = WalletKey::new("S1", OwnerKind::Store, Currency::new("EUR"));
        let other_owner = WalletKey::new("S2", OwnerKind::Store, Currency::usd());

        store
            .mutate(&usd, |wallet, _| {
                wallet.balance = dec!(100);
                wallet.pending_balance = dec!(40);
                Ok(())
            })
            .await
            .unwrap();
        store
            .mutate(&eur, |wallet, _| {
                wallet.balance = dec!(5);
                Ok(())
            })
            .await
            .unwrap();
        store.get_or_create(&other_owner).await;

        let summaries = store.summarize(&OwnerId::new("S1"), OwnerKind::Store).await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].currency, Currency::new("EUR"));
        assert_eq!(summaries[1].currency, Currency::usd());
        assert_eq!(summaries[1].available_balance, dec!(140));
    }
}
