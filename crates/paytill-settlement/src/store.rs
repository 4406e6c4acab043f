//! In-memory settlement rows and the per-owner schedule registry
//!
//! Mirrors the wallet store's shape: each settlement and each schedule lives
//! behind its own async lock inside a concurrent map, so the engine can hold
//! one row while it talks to the ledger without blocking unrelated owners.
//! Queries clone row handles out of the map first and only then take the
//! locks, keeping map shards free during awaits.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use paytill_types::{
    OwnerKey, Settlement, SettlementId, SettlementSchedule, SettlementStatus, SettlementSummary,
};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

/// Default page size for settlement history queries
pub const DEFAULT_SETTLEMENT_HISTORY_LIMIT: usize = 50;

/// Concurrent registry of settlement batches and per-owner schedules.
pub struct SettlementStore {
    settlements: DashMap<SettlementId, Arc<Mutex<Settlement>>>,
    schedules: DashMap<OwnerKey, Arc<Mutex<SettlementSchedule>>>,
}

impl SettlementStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            settlements: DashMap::new(),
            schedules: DashMap::new(),
        }
    }

    /// The live schedule row for `key`, if one exists
    pub fn schedule_row(&self, key: &OwnerKey) -> Option<Arc<Mutex<SettlementSchedule>>> {
        self.schedules.get(key).map(|entry| entry.value().clone())
    }

    /// The live schedule row for `initial.key()`, inserting `initial` when the
    /// owner has no schedule yet.
    ///
    /// On a concurrent first insert exactly one row wins and both callers get
    /// it, so configuration updates always land on the same row.
    pub fn schedule_row_or_insert(
        &self,
        initial: SettlementSchedule,
    ) -> Arc<Mutex<SettlementSchedule>> {
        self.schedules
            .entry(initial.key())
            .or_insert_with(|| Arc::new(Mutex::new(initial)))
            .clone()
    }

    /// Snapshot of one owner's schedule
    pub async fn schedule(&self, key: &OwnerKey) -> Option<SettlementSchedule> {
        match self.schedule_row(key) {
            Some(row) => Some(row.lock().await.clone()),
            None => None,
        }
    }

    /// Snapshot of every schedule, in deterministic owner order
    pub async fn schedules(&self) -> Vec<SettlementSchedule> {
        let rows: Vec<_> = self
            .schedules
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.lock().await.clone());
        }
        out.sort_by_key(|schedule| schedule.key());
        out
    }

    /// Register a new settlement and return its live row
    pub fn insert_settlement(&self, settlement: Settlement) -> Arc<Mutex<Settlement>> {
        let id = settlement.id.clone();
        let row = Arc::new(Mutex::new(settlement));
        self.settlements.insert(id, row.clone());
        row
    }

    /// The live settlement row for `id`, if one exists
    pub fn settlement_row(&self, id: &SettlementId) -> Option<Arc<Mutex<Settlement>>> {
        self.settlements.get(id).map(|entry| entry.value().clone())
    }

    /// Snapshot of one settlement
    pub async fn settlement(&self, id: &SettlementId) -> Option<Settlement> {
        match self.settlement_row(id) {
            Some(row) => Some(row.lock().await.clone()),
            None => None,
        }
    }

    /// All settlements still awaiting payout, newest first
    pub async fn pending(&self) -> Vec<Settlement> {
        let mut out: Vec<_> = self
            .snapshot_all()
            .await
            .into_iter()
            .filter(Settlement::is_pending)
            .collect();
        out.sort_by_key(|settlement| std::cmp::Reverse(settlement.created_at));
        out
    }

    /// One owner's settlements, newest first, paged by `limit` and `offset`
    pub async fn history(&self, key: &OwnerKey, limit: usize, offset: usize) -> Vec<Settlement> {
        let mut out: Vec<_> = self
            .snapshot_all()
            .await
            .into_iter()
            .filter(|settlement| {
                settlement.owner == key.owner && settlement.owner_kind == key.owner_kind
            })
            .collect();
        out.sort_by_key(|settlement| std::cmp::Reverse(settlement.created_at));
        out.into_iter().skip(offset).take(limit).collect()
    }

    /// Aggregate settlements created within `[from, to]`, optionally for one
    /// owner. Totals and the average cover completed settlements only.
    pub async fn summarize(
        &self,
        owner: Option<&OwnerKey>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> SettlementSummary {
        let in_period: Vec<_> = self
            .snapshot_all()
            .await
            .into_iter()
            .filter(|settlement| settlement.created_at >= from && settlement.created_at <= to)
            .filter(|settlement| match owner {
                Some(key) => {
                    settlement.owner == key.owner && settlement.owner_kind == key.owner_kind
                }
                None => true,
            })
            .collect();

        let completed: Vec<_> = in_period
            .iter()
            .filter(|settlement| settlement.status == SettlementStatus::Completed)
            .collect();
        let total_settled_amount: Decimal =
            completed.iter().map(|settlement| settlement.amount).sum();
        let average_settlement_amount = if completed.is_empty() {
            Decimal::ZERO
        } else {
            total_settled_amount / Decimal::from(completed.len() as u64)
        };

        SettlementSummary {
            period_start: from,
            period_end: to,
            total_settlements: in_period.len(),
            completed_settlements: completed.len(),
            pending_settlements: in_period
                .iter()
                .filter(|settlement| settlement.status == SettlementStatus::Pending)
                .count(),
            failed_settlements: in_period
                .iter()
                .filter(|settlement| settlement.status == SettlementStatus::Failed)
                .count(),
            total_settled_amount,
            average_settlement_amount,
        }
    }

    /// Number of settlements ever created
    pub fn settlement_count(&self) -> usize {
        self.settlements.len()
    }

    async fn snapshot_all(&self) -> Vec<Settlement> {
        let rows: Vec<_> = self
            .settlements
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.lock().await.clone());
        }
        out
    }
}

impl Default for SettlementStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use paytill_types::{Currency, Frequency, OwnerKind, TransactionId};
    use rust_decimal_macros::dec;

    fn settlement(
        owner: &str,
        amount: Decimal,
        status: SettlementStatus,
        age_minutes: i64,
    ) -> Settlement {
        let created_at = Utc::now() - Duration::minutes(age_minutes);
        Settlement {
            id: SettlementId::new(),
            owner: owner.into(),
            owner_kind: OwnerKind::Store,
            amount,
            currency: Currency::usd(),
            period_start: created_at - Duration::days(7),
            period_end: created_at,
            method: None,
            description: format!("Automatic settlement for STORE {owner}"),
            status,
            transaction_id: TransactionId::new(),
            reference: None,
            created_at,
            processed_at: None,
        }
    }

    #[tokio::test]
    async fn test_schedule_insert_keeps_existing_row() {
        let store = SettlementStore::new();
        let key = OwnerKey::new("S1", OwnerKind::Store);

        let first = SettlementSchedule::new(
            key.clone(),
            Frequency::Daily,
            dec!(25),
            Currency::usd(),
            Utc::now(),
        );
        store.schedule_row_or_insert(first);

        let second = SettlementSchedule::new(
            key.clone(),
            Frequency::Weekly,
            dec!(99),
            Currency::usd(),
            Utc::now(),
        );
        let row = store.schedule_row_or_insert(second);

        // The original row survives; callers mutate it under its lock.
        assert_eq!(row.lock().await.frequency, Frequency::Daily);
        assert_eq!(store.schedule(&key).await.unwrap().minimum_amount, dec!(25));
    }

    #[tokio::test]
    async fn test_pending_lists_newest_first() {
        let store = SettlementStore::new();
        store.insert_settlement(settlement("S1", dec!(10), SettlementStatus::Pending, 5));
        store.insert_settlement(settlement("S2", dec!(20), SettlementStatus::Pending, 30));
        store.insert_settlement(settlement("S3", dec!(30), SettlementStatus::Completed, 60));

        let pending = store.pending().await;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].owner.as_str(), "S1");
        assert_eq!(pending[1].owner.as_str(), "S2");
    }

    #[tokio::test]
    async fn test_history_filters_owner_and_pages() {
        let store = SettlementStore::new();
        for age in [10, 20, 30] {
            store.insert_settlement(settlement("S1", dec!(10), SettlementStatus::Completed, age));
        }
        store.insert_settlement(settlement("S2", dec!(10), SettlementStatus::Completed, 5));

        let key = OwnerKey::new("S1", OwnerKind::Store);
        let history = store.history(&key, 2, 0).await;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|s| s.owner.as_str() == "S1"));
        assert!(history[0].created_at > history[1].created_at);

        // Offset skips the newest entries.
        let paged = store.history(&key, 2, 2).await;
        assert_eq!(paged.len(), 1);
        assert!(paged[0].created_at < history[1].created_at);
    }

    #[tokio::test]
    async fn test_summarize_counts_and_average() {
        let store = SettlementStore::new();
        store.insert_settlement(settlement("S1", dec!(100), SettlementStatus::Completed, 10));
        store.insert_settlement(settlement("S1", dec!(50), SettlementStatus::Completed, 20));
        store.insert_settlement(settlement("S1", dec!(70), SettlementStatus::Pending, 30));
        store.insert_settlement(settlement("S1", dec!(40), SettlementStatus::Failed, 40));

        let now = Utc::now();
        let summary = store.summarize(None, now - Duration::days(1), now).await;
        assert_eq!(summary.total_settlements, 4);
        assert_eq!(summary.completed_settlements, 2);
        assert_eq!(summary.pending_settlements, 1);
        assert_eq!(summary.failed_settlements, 1);
        assert_eq!(summary.total_settled_amount, dec!(150));
        assert_eq!(summary.average_settlement_amount, dec!(75));
    }

    #[tokio::test]
    async fn test_summarize_scopes_to_owner() {
        let store = SettlementStore::new();
        store.insert_settlement(settlement("S1", dec!(100), SettlementStatus::Completed, 10));
        store.insert_settlement(settlement("S2", dec!(60), SettlementStatus::Completed, 10));

        let now = Utc::now();
        let key = OwnerKey::new("S2", OwnerKind::Store);
        let summary = store
            .summarize(Some(&key), now - Duration::days(1), now)
            .await;
        assert_eq!(summary.total_settlements, 1);
        assert_eq!(summary.total_settled_amount, dec!(60));
    }
}
