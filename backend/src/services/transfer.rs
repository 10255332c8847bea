//! Bulk warehouse/shelf transfers
//!
//! Planning is read-only and built on the pure selectors in
//! [`shared::planner`]. Execution applies one independent `transfer`
//! movement per item: a failing item is reported and never rolls back the
//! others.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::{
    allocate_transfer, ensure_not_expired, select_eligible_batches, validate_transfer_quantity,
    ActingContext, AllocationPlan, Batch, BulkTransferItem, BulkTransferRequest,
    BulkTransferSummary, EligibilityReport, LedgerError, LedgerResult, MovementIntent,
    MovementMeta, MovementType, StockRecord, StockRecordFilter, TransferCandidate,
    TransferDirection,
};
use uuid::Uuid;

use super::LedgerService;
use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

/// Preview request for a bulk transfer
#[derive(Debug, Clone, Deserialize)]
pub struct TransferPlanRequest {
    pub direction: TransferDirection,
    /// Restrict the preview to these records; all records otherwise
    pub stock_record_ids: Option<Vec<Uuid>>,
    /// When given, also propose a first-expiry-first-out allocation
    pub requested_total: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferPlan {
    pub eligibility: EligibilityReport,
    pub allocation: Option<AllocationPlan>,
}

#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn LedgerStore>,
    ledger: LedgerService,
    expiring_soon_days: i64,
}

impl TransferService {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self {
            expiring_soon_days: config.expiring_soon_days,
            ledger: LedgerService::new(store.clone(), config),
            store,
        }
    }

    /// Which batches may take part, and optionally how much of each to move
    pub async fn plan(&self, request: TransferPlanRequest, ctx: &ActingContext) -> AppResult<TransferPlan> {
        if let Some(total) = request.requested_total {
            if total <= 0 {
                return Err(AppError::validation(
                    "requested_total",
                    "requested_total must be positive",
                ));
            }
        }

        let records = match &request.stock_record_ids {
            Some(ids) => {
                let mut records = Vec::with_capacity(ids.len());
                for id in ids {
                    records.push(self.store.get_stock_record(*id).await?);
                }
                records
            }
            None => {
                self.store
                    .list_stock_records(&StockRecordFilter::default())
                    .await?
            }
        };
        let candidates = self.candidates(records).await?;

        let eligibility = select_eligible_batches(
            &candidates,
            request.direction,
            ctx.today(),
            self.expiring_soon_days,
        );
        let allocation = request
            .requested_total
            .map(|total| allocate_transfer(&eligibility.eligible, total));

        Ok(TransferPlan {
            eligibility,
            allocation,
        })
    }

    /// Apply each item as its own transfer movement
    pub async fn bulk_transfer(
        &self,
        request: BulkTransferRequest,
        ctx: &ActingContext,
    ) -> AppResult<BulkTransferSummary> {
        if request.items.is_empty() {
            return Err(AppError::validation("items", "at least one item is required"));
        }

        let direction = request.direction;
        let mut summary = BulkTransferSummary::new(direction);

        for item in &request.items {
            match self.transfer_item(item, &request, ctx).await {
                Ok((movement, expiring_soon)) => summary.record_success(movement, expiring_soon),
                Err(err) => {
                    tracing::warn!(
                        stock_record_id = %item.detail_inventory_id,
                        code = err.code(),
                        "Bulk transfer item rejected: {}",
                        err
                    );
                    summary.record_failure(item.detail_inventory_id, err.code(), err.detail().message);
                }
            }
        }

        summary.finish(direction);
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            excluded = summary.excluded,
            "Bulk transfer finished"
        );
        Ok(summary)
    }

    async fn transfer_item(
        &self,
        item: &BulkTransferItem,
        request: &BulkTransferRequest,
        ctx: &ActingContext,
    ) -> AppResult<(shared::Movement, bool)> {
        let record = self.store.get_stock_record(item.detail_inventory_id).await?;
        let batch = self.store.get_batch(record.batch_id).await?;
        let candidate = TransferCandidate { record, batch };

        let expiring_soon = precheck(
            &candidate,
            request.direction,
            item.quantity,
            ctx,
            self.expiring_soon_days,
        )?;

        let meta = &request.meta;
        let intent = MovementIntent {
            stock_record_id: item.detail_inventory_id,
            movement_type: MovementType::Transfer,
            quantity: request.direction.signed(item.quantity),
            meta: MovementMeta {
                reason: meta.reason.clone(),
                notes: meta.notes.clone(),
                date: meta.date,
                performed_by: meta.performed_by,
                ..MovementMeta::default()
            },
        };
        let outcome = self.ledger.apply(intent, ctx).await?;
        Ok((outcome.movement, expiring_soon))
    }

    async fn candidates(&self, records: Vec<StockRecord>) -> AppResult<Vec<TransferCandidate>> {
        let batches: HashMap<Uuid, Batch> = self
            .store
            .list_batches(None)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();

        Ok(records
            .into_iter()
            .filter_map(|record| {
                let batch = batches.get(&record.batch_id)?.clone();
                Some(TransferCandidate { record, batch })
            })
            .collect())
    }
}

/// Expiry first, then the per-batch quantity bound; returns the
/// expiring-soon flag of an eligible item
fn precheck(
    candidate: &TransferCandidate,
    direction: TransferDirection,
    quantity: i64,
    ctx: &ActingContext,
    expiring_soon_days: i64,
) -> LedgerResult<bool> {
    ensure_not_expired(&candidate.batch, ctx.today())?;

    let report = select_eligible_batches(
        std::slice::from_ref(candidate),
        direction,
        ctx.today(),
        expiring_soon_days,
    );
    match report.eligible.first() {
        Some(eligible) => {
            validate_transfer_quantity(eligible, quantity)?;
            Ok(eligible.expiring_soon)
        }
        None if quantity <= 0 => Err(LedgerError::InvalidQuantity {
            operation: "transfer".to_string(),
            quantity,
            message: "bulk transfer quantities must be positive".to_string(),
        }),
        None => Err(LedgerError::InsufficientStock {
            bucket: "source",
            current: 0,
            requested: quantity,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use shared::BatchStatus;

    fn candidate(hand: i64, expiry_in_days: Option<i64>) -> TransferCandidate {
        let now = Utc::now();
        let batch = Batch {
            id: Uuid::new_v4(),
            batch_code: "B-1".to_string(),
            product_id: Uuid::new_v4(),
            product_name: None,
            expiry_date: expiry_in_days.map(|d| (now + Duration::days(d)).date_naive()),
            quantity: hand,
            status: BatchStatus::Active,
            created_at: now,
        };
        let mut record = StockRecord::new(Uuid::new_v4(), batch.id, now);
        record.quantity_on_hand = hand;
        TransferCandidate { record, batch }
    }

    #[test]
    fn test_precheck_rejects_expired_before_quantity() {
        let ctx = ActingContext::system();
        let err = precheck(&candidate(10, Some(-1)), TransferDirection::ToShelf, 500, &ctx, 30)
            .unwrap_err();
        assert_eq!(err.code(), "EXPIRED_BATCH");
    }

    #[test]
    fn test_precheck_bounds_quantity_by_source() {
        let ctx = ActingContext::system();
        let err = precheck(&candidate(10, None), TransferDirection::ToShelf, 11, &ctx, 30)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientStock { current: 10, .. }));

        let err = precheck(&candidate(0, None), TransferDirection::ToShelf, 0, &ctx, 30)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_QUANTITY");
    }

    #[test]
    fn test_precheck_flags_expiring_soon() {
        let ctx = ActingContext::system();
        let soon = precheck(&candidate(10, Some(5)), TransferDirection::ToShelf, 5, &ctx, 30);
        assert_eq!(soon, Ok(true));
        let later = precheck(&candidate(10, Some(90)), TransferDirection::ToShelf, 5, &ctx, 30);
        assert_eq!(later, Ok(false));
    }
}
