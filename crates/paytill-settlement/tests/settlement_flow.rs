//! End-to-end settlement flows across the ledger and settlement engines

use std::sync::Arc;

use chrono::{Duration, Utc};
use paytill_ledger::{HistoryQuery, LedgerEngine, WalletStore};
use paytill_settlement::{SettlementEngine, SettlementStore};
use paytill_types::{
    Currency, EntryType, Frequency, OwnerKey, OwnerKind, PaytillError, SettlementStatus,
    TransactionStatus, WalletKey,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn harness() -> (Arc<LedgerEngine>, SettlementEngine) {
    let ledger = Arc::new(LedgerEngine::new(Arc::new(WalletStore::new())));
    let settlements = SettlementEngine::new(ledger.clone(), Arc::new(SettlementStore::new()));
    (ledger, settlements)
}

#[tokio::test]
async fn scheduled_settlement_full_cycle() {
    init_tracing();
    let (ledger, settlements) = harness();
    let owner = OwnerKey::new("S1", OwnerKind::Store);
    let wallet = WalletKey::new("S1", OwnerKind::Store, Currency::usd());

    settlements
        .configure(&owner, Frequency::Daily, dec!(10), Currency::usd())
        .await;
    ledger
        .credit(&wallet, dec!(80), "card sale #1001", None)
        .await
        .unwrap();
    ledger
        .credit(&wallet, dec!(45), "card sale #1002", None)
        .await
        .unwrap();

    // Sweep after the configured midnight has passed.
    let report = settlements.run_due(Utc::now() + Duration::days(2)).await;
    assert_eq!(report.settled, 1);
    assert_eq!(report.failed, 0);

    let pending = settlements.pending(None).await;
    assert_eq!(pending.len(), 1);
    let settlement = &pending[0];
    assert_eq!(settlement.amount, dec!(125));
    assert_eq!(settlement.description, "Automatic settlement for STORE S1");

    // The hold moved the full balance into pending without losing a cent.
    let snapshot = ledger.wallet(&wallet).await;
    assert_eq!(snapshot.balance, Decimal::ZERO);
    assert_eq!(snapshot.pending_balance, dec!(125));
    assert_eq!(snapshot.available_balance(), dec!(125));

    let completed = settlements
        .complete(&settlement.id, Some("ACH-2024-555".to_string()))
        .await
        .unwrap();
    assert_eq!(completed.status, SettlementStatus::Completed);
    assert_eq!(completed.reference.as_deref(), Some("ACH-2024-555"));

    // Paid out: the funds are gone from every sub-balance.
    let snapshot = ledger.wallet(&wallet).await;
    assert_eq!(snapshot.balance, Decimal::ZERO);
    assert_eq!(snapshot.pending_balance, Decimal::ZERO);

    // The wallet journal tells the whole story, newest first.
    let history = ledger.history(&HistoryQuery::for_wallet(
        "S1",
        OwnerKind::Store,
        Currency::usd(),
    ));
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].entry, EntryType::Debit);
    assert_eq!(history[0].status, TransactionStatus::Completed);
    assert!(history[0]
        .reference
        .as_ref()
        .unwrap()
        .is_settlement(&settlement.id));

    let schedule = settlements.schedule(&owner).await.unwrap();
    assert!(schedule.last_settlement.is_some());
    assert!(schedule.next_settlement > Utc::now());
}

#[tokio::test]
async fn cancelled_settlement_returns_funds_for_resettlement() {
    init_tracing();
    let (ledger, settlements) = harness();
    let owner = OwnerKey::new("SUP9", OwnerKind::Supplier);
    let wallet = WalletKey::new("SUP9", OwnerKind::Supplier, Currency::usd());

    ledger
        .credit(&wallet, dec!(100), "fulfillment fees", None)
        .await
        .unwrap();

    let first = settlements
        .settle_owner(&owner, &Currency::usd())
        .await
        .unwrap()
        .unwrap();
    let snapshot = ledger.wallet(&wallet).await;
    assert_eq!(snapshot.available_balance(), dec!(100));

    let cancelled = settlements
        .cancel(&first, "bank details invalid")
        .await
        .unwrap();
    assert_eq!(cancelled.status, SettlementStatus::Failed);

    // The hold came back to the spendable balance, exactly.
    assert_eq!(ledger.balance(&wallet).await, dec!(100));
    let hold = ledger.transaction(&cancelled.transaction_id).unwrap();
    assert_eq!(hold.status, TransactionStatus::Reversed);

    let second = settlements
        .settle_owner(&owner, &Currency::usd())
        .await
        .unwrap()
        .unwrap();
    settlements.complete(&second, None).await.unwrap();
    assert_eq!(ledger.balance(&wallet).await, Decimal::ZERO);

    let history = settlements.history(&owner, None, 0).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, SettlementStatus::Completed);
    assert_eq!(history[1].status, SettlementStatus::Failed);
}

#[tokio::test]
async fn manual_settlement_on_request() {
    init_tracing();
    let (ledger, settlements) = harness();
    let owner = OwnerKey::new("AFF3", OwnerKind::Affiliate);
    let wallet = WalletKey::new("AFF3", OwnerKind::Affiliate, Currency::usd());

    settlements
        .configure(&owner, Frequency::Manual, Decimal::ZERO, Currency::usd())
        .await;
    ledger
        .credit(&wallet, dec!(500), "commission", None)
        .await
        .unwrap();

    let id = settlements
        .request_manual(&owner, dec!(200), &Currency::usd(), "monthly withdrawal")
        .await
        .unwrap();
    let snapshot = ledger.wallet(&wallet).await;
    assert_eq!(snapshot.balance, dec!(300));
    assert_eq!(snapshot.pending_balance, dec!(200));

    settlements.complete(&id, Some("WISE-77".to_string())).await.unwrap();
    assert_eq!(ledger.balance(&wallet).await, dec!(300));

    let now = Utc::now();
    let summary = settlements.summary(now - Duration::hours(1), now).await;
    assert_eq!(summary.total_settlements, 1);
    assert_eq!(summary.completed_settlements, 1);
    assert_eq!(summary.total_settled_amount, dec!(200));

    // More than the remaining balance cannot be requested.
    let result = settlements
        .request_manual(&owner, dec!(1000), &Currency::usd(), "too much")
        .await;
    assert!(matches!(result, Err(PaytillError::InsufficientBalance { .. })));
}
