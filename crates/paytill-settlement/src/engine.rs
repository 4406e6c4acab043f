//! The settlement engine: payout batching over the ledger
//!
//! A settlement converts an owner's accumulated wallet balance into a payout
//! obligation. Creation places a pending debit hold through the ledger engine
//! and records a PENDING settlement carrying that hold's transaction id;
//! completion drains the hold, cancellation returns it. Schedules decide when
//! [`SettlementEngine::run_due`] attempts this automatically per owner.
//!
//! Lock discipline: a schedule or settlement row lock may be held across the
//! ledger call (row lock before wallet lock), but never a schedule and a
//! settlement row at the same time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use paytill_ledger::LedgerEngine;
use paytill_types::{
    Currency, EntryType, Frequency, OwnerKey, PaytillError, Result, Settlement, SettlementId,
    SettlementSchedule, SettlementStatus, SettlementSummary, TransactionRef, WalletKey,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::planner;
use crate::store::{SettlementStore, DEFAULT_SETTLEMENT_HISTORY_LIMIT};

/// Outcome counts of one [`SettlementEngine::run_due`] sweep.
///
/// `examined` counts the schedules picked up as due; each lands in exactly
/// one of `settled`, `skipped` (no settleable balance) or `failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub examined: usize,
    pub settled: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Drives settlement lifecycles against the ledger.
///
/// Cheap to clone; all clones share the ledger and the settlement store.
#[derive(Clone)]
pub struct SettlementEngine {
    ledger: Arc<LedgerEngine>,
    store: Arc<SettlementStore>,
}

impl SettlementEngine {
    /// Create an engine over an injected ledger and settlement store
    pub fn new(ledger: Arc<LedgerEngine>, store: Arc<SettlementStore>) -> Self {
        Self { ledger, store }
    }

    /// The underlying settlement store
    pub fn store(&self) -> &Arc<SettlementStore> {
        &self.store
    }

    /// The ledger engine this settlement engine settles against
    pub fn ledger(&self) -> &Arc<LedgerEngine> {
        &self.ledger
    }

    /// Create or update an owner's settlement schedule.
    ///
    /// Recomputes `next_settlement` for the given frequency, reactivates the
    /// schedule, and clamps a negative minimum to zero. The currency binds at
    /// creation; reconfiguring an existing schedule keeps its original
    /// currency.
    pub async fn configure(
        &self,
        owner: &OwnerKey,
        frequency: Frequency,
        minimum_amount: Decimal,
        currency: Currency,
    ) -> SettlementSchedule {
        let now = Utc::now();
        let next_settlement = planner::next_settlement(frequency, now);

        let row = self.store.schedule_row_or_insert(SettlementSchedule::new(
            owner.clone(),
            frequency,
            minimum_amount,
            currency,
            next_settlement,
        ));
        let snapshot = {
            let mut schedule = row.lock().await;
            schedule.frequency = frequency;
            schedule.minimum_amount = minimum_amount.max(Decimal::ZERO);
            schedule.next_settlement = next_settlement;
            schedule.active = true;
            schedule.updated_at = now;
            schedule.clone()
        };

        info!(
            owner = %owner,
            frequency = %frequency,
            next_settlement = %snapshot.next_settlement,
            "settlement schedule configured"
        );
        snapshot
    }

    /// Stop automatic settlement for an owner without deleting the schedule.
    ///
    /// Returns the updated schedule, or `None` when the owner has no schedule.
    pub async fn deactivate(&self, owner: &OwnerKey) -> Option<SettlementSchedule> {
        let row = self.store.schedule_row(owner)?;
        let snapshot = {
            let mut schedule = row.lock().await;
            schedule.active = false;
            schedule.updated_at = Utc::now();
            schedule.clone()
        };
        info!(owner = %owner, "settlement schedule deactivated");
        Some(snapshot)
    }

    /// Snapshot of an owner's schedule
    pub async fn schedule(&self, owner: &OwnerKey) -> Option<SettlementSchedule> {
        self.store.schedule(owner).await
    }

    /// Sweep every schedule and settle the owners that are due at `now`.
    ///
    /// Due-ness is re-checked under the schedule row lock, so overlapping
    /// sweeps cannot settle the same period twice. On success or when the
    /// owner has no settleable balance the schedule advances to its next
    /// period; a failure leaves `next_settlement` untouched for the following
    /// sweep to retry, and never aborts the rest of the batch.
    pub async fn run_due(&self, now: DateTime<Utc>) -> RunReport {
        let mut report = RunReport::default();

        for snapshot in self.store.schedules().await {
            if !snapshot.is_due(now) {
                continue;
            }
            let key = snapshot.key();
            let row = match self.store.schedule_row(&key) {
                Some(row) => row,
                None => continue,
            };

            let mut schedule = row.lock().await;
            if !schedule.is_due(now) {
                continue;
            }
            report.examined += 1;

            let policy = schedule.clone();
            match self
                .settle_with_policy(&key, &policy.currency, Some(&policy), now)
                .await
            {
                Ok(Some(settlement_id)) => {
                    report.settled += 1;
                    schedule.next_settlement = planner::next_settlement(schedule.frequency, now);
                    schedule.updated_at = now;
                    info!(
                        owner = %key,
                        settlement = %settlement_id,
                        next_settlement = %schedule.next_settlement,
                        "scheduled settlement created"
                    );
                }
                Ok(None) => {
                    report.skipped += 1;
                    schedule.next_settlement = planner::next_settlement(schedule.frequency, now);
                    schedule.updated_at = now;
                    debug!(owner = %key, "no settleable balance; period advanced");
                }
                Err(error) => {
                    report.failed += 1;
                    warn!(owner = %key, error = %error, "scheduled settlement failed; will retry");
                }
            }
        }

        report
    }

    /// Settle one owner's full current balance, if it clears their minimum.
    ///
    /// Returns `None` without error when the owner has no wallet, a
    /// non-positive balance, or a balance below the schedule's
    /// `minimum_amount`; skipping is a normal outcome, not a failure.
    pub async fn settle_owner(
        &self,
        owner: &OwnerKey,
        currency: &Currency,
    ) -> Result<Option<SettlementId>> {
        let schedule = self.store.schedule(owner).await;
        self.settle_with_policy(owner, currency, schedule.as_ref(), Utc::now())
            .await
    }

    /// Create a PENDING settlement backed by a payout hold on the wallet.
    ///
    /// The hold is a pending debit carrying a `SETTLEMENT` reference to the
    /// new settlement id, so wallet history and settlements cross-link. When
    /// the hold cannot be placed no settlement row is created.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        owner: &OwnerKey,
        amount: Decimal,
        currency: &Currency,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        method: Option<String>,
        description: impl Into<String>,
    ) -> Result<SettlementId> {
        if amount <= Decimal::ZERO {
            return Err(PaytillError::InvalidAmount { amount });
        }
        let description = description.into();
        let settlement_id = SettlementId::new();
        let wallet_key = WalletKey::new(owner.owner.clone(), owner.owner_kind, currency.clone());

        let transaction_id = self
            .ledger
            .create_pending(
                &wallet_key,
                EntryType::Debit,
                amount,
                description.clone(),
                Some(TransactionRef::settlement(&settlement_id)),
            )
            .await?;

        let now = Utc::now();
        self.store.insert_settlement(Settlement {
            id: settlement_id.clone(),
            owner: owner.owner.clone(),
            owner_kind: owner.owner_kind,
            amount,
            currency: currency.clone(),
            period_start,
            period_end,
            method,
            description,
            status: SettlementStatus::Pending,
            transaction_id,
            reference: None,
            created_at: now,
            processed_at: None,
        });

        info!(settlement = %settlement_id, owner = %owner, amount = %amount, "settlement created");
        Ok(settlement_id)
    }

    /// Finalize a settlement: the payout went out.
    ///
    /// Drains the wallet hold via the ledger, marks the settlement COMPLETED
    /// with the external payout `reference`, and stamps the owner's schedule
    /// with `last_settlement`. If draining the hold fails the settlement stays
    /// PENDING for a retry or cancellation.
    pub async fn complete(
        &self,
        settlement_id: &SettlementId,
        reference: Option<String>,
    ) -> Result<Settlement> {
        let row = self.require_row(settlement_id)?;

        let completed = {
            let mut settlement = row.lock().await;
            if settlement.status != SettlementStatus::Pending {
                return Err(PaytillError::SettlementNotPending {
                    settlement_id: settlement_id.to_string(),
                    status: settlement.status.to_string(),
                });
            }
            self.ledger.complete_pending(&settlement.transaction_id).await?;
            settlement.status = SettlementStatus::Completed;
            settlement.processed_at = Some(Utc::now());
            settlement.reference = reference;
            settlement.clone()
        };

        // Settlement row released; now stamp the schedule.
        let owner = OwnerKey::new(completed.owner.clone(), completed.owner_kind);
        if let Some(schedule_row) = self.store.schedule_row(&owner) {
            let mut schedule = schedule_row.lock().await;
            schedule.last_settlement = completed.processed_at;
            schedule.updated_at = Utc::now();
        }

        info!(
            settlement = %settlement_id,
            owner = %owner,
            amount = %completed.amount,
            "settlement completed"
        );
        Ok(completed)
    }

    /// Abort a pending settlement and return its hold to the wallet.
    ///
    /// The linked pending debit is cancelled through the ledger and the
    /// settlement is marked FAILED; the funds become settleable again.
    pub async fn cancel(&self, settlement_id: &SettlementId, reason: &str) -> Result<Settlement> {
        let row = self.require_row(settlement_id)?;

        let cancelled = {
            let mut settlement = row.lock().await;
            if settlement.status != SettlementStatus::Pending {
                return Err(PaytillError::SettlementNotPending {
                    settlement_id: settlement_id.to_string(),
                    status: settlement.status.to_string(),
                });
            }
            self.ledger
                .cancel_pending(&settlement.transaction_id, reason)
                .await?;
            settlement.status = SettlementStatus::Failed;
            settlement.processed_at = Some(Utc::now());
            settlement.clone()
        };

        info!(settlement = %settlement_id, reason, "settlement cancelled");
        Ok(cancelled)
    }

    /// Settle a chosen amount on an owner's explicit request.
    ///
    /// Requires a MANUAL schedule; owners on automatic schedules get
    /// [`PaytillError::ManualNotConfigured`]. The requested amount must not
    /// exceed the wallet's spendable balance. The period reaches back to the
    /// owner's last settlement, or 30 days when they never settled.
    pub async fn request_manual(
        &self,
        owner: &OwnerKey,
        amount: Decimal,
        currency: &Currency,
        description: impl Into<String>,
    ) -> Result<SettlementId> {
        let schedule = self
            .store
            .schedule(owner)
            .await
            .ok_or_else(|| PaytillError::ManualNotConfigured {
                owner: owner.to_string(),
            })?;
        if schedule.frequency != Frequency::Manual {
            return Err(PaytillError::ManualNotConfigured {
                owner: owner.to_string(),
            });
        }

        let wallet_key = WalletKey::new(owner.owner.clone(), owner.owner_kind, currency.clone());
        let balance = self.ledger.balance(&wallet_key).await;
        if balance < amount {
            return Err(PaytillError::InsufficientBalance {
                wallet: wallet_key.to_string(),
                requested: amount,
                available: balance,
            });
        }

        let now = Utc::now();
        let period_start = schedule
            .last_settlement
            .unwrap_or_else(|| now - Duration::days(planner::MANUAL_LOOKBACK_DAYS));
        let settlement_id = self
            .create(owner, amount, currency, period_start, now, None, description)
            .await?;

        info!(settlement = %settlement_id, owner = %owner, "manual settlement requested");
        Ok(settlement_id)
    }

    /// Snapshot of one settlement
    pub async fn settlement(&self, settlement_id: &SettlementId) -> Result<Settlement> {
        self.store
            .settlement(settlement_id)
            .await
            .ok_or_else(|| PaytillError::SettlementNotFound {
                settlement_id: settlement_id.to_string(),
            })
    }

    /// Settlements awaiting payout, newest first
    pub async fn pending(&self, limit: Option<usize>) -> Vec<Settlement> {
        let mut out = self.store.pending().await;
        out.truncate(limit.unwrap_or(DEFAULT_SETTLEMENT_HISTORY_LIMIT));
        out
    }

    /// One owner's settlements, newest first
    pub async fn history(
        &self,
        owner: &OwnerKey,
        limit: Option<usize>,
        offset: usize,
    ) -> Vec<Settlement> {
        self.store
            .history(
                owner,
                limit.unwrap_or(DEFAULT_SETTLEMENT_HISTORY_LIMIT),
                offset,
            )
            .await
    }

    /// Aggregates over settlements created within the period
    pub async fn summary(
        &self,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> SettlementSummary {
        self.store.summarize(None, period_start, period_end).await
    }

    async fn settle_with_policy(
        &self,
        owner: &OwnerKey,
        currency: &Currency,
        schedule: Option<&SettlementSchedule>,
        now: DateTime<Utc>,
    ) -> Result<Option<SettlementId>> {
        let wallet_key = WalletKey::new(owner.owner.clone(), owner.owner_kind, currency.clone());
        let wallet = match self.ledger.store().get(&wallet_key).await {
            Some(wallet) => wallet,
            None => return Ok(None),
        };

        let minimum = schedule
            .map(|schedule| schedule.minimum_amount)
            .unwrap_or(Decimal::ZERO);
        if wallet.balance <= Decimal::ZERO || wallet.balance < minimum {
            debug!(
                owner = %owner,
                balance = %wallet.balance,
                minimum = %minimum,
                "balance below settleable threshold"
            );
            return Ok(None);
        }

        let period_start = schedule
            .and_then(|schedule| schedule.last_settlement)
            .unwrap_or_else(|| now - Duration::days(planner::AUTO_LOOKBACK_DAYS));
        let settlement_id = self
            .create(
                owner,
                wallet.balance,
                currency,
                period_start,
                now,
                None,
                format!("Automatic settlement for {} {}", owner.owner_kind, owner.owner),
            )
            .await?;
        Ok(Some(settlement_id))
    }

    fn require_row(
        &self,
        settlement_id: &SettlementId,
    ) -> Result<Arc<tokio::sync::Mutex<Settlement>>> {
        self.store
            .settlement_row(settlement_id)
            .ok_or_else(|| PaytillError::SettlementNotFound {
                settlement_id: settlement_id.to_string(),
            })
    }
}
