//! Bulk transfer planning
//!
//! Pure selection of which batches may take part in a multi-batch transfer
//! and how much of each to move. The interactive bulk-transfer flow is a thin
//! caller of these functions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{LedgerError, LedgerResult};
use crate::models::{Batch, Movement, StockRecord, StockSide};

/// Direction of a bulk transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Warehouse -> shelf
    #[serde(alias = "toShelf")]
    ToShelf,
    /// Shelf -> warehouse
    #[serde(alias = "toWarehouse")]
    ToWarehouse,
}

impl TransferDirection {
    /// Side the quantity is drawn from
    pub fn source_side(&self) -> StockSide {
        match self {
            TransferDirection::ToShelf => StockSide::OnHand,
            TransferDirection::ToWarehouse => StockSide::OnShelf,
        }
    }

    /// Signed quantity for a `transfer` movement in this direction
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            TransferDirection::ToShelf => quantity,
            TransferDirection::ToWarehouse => -quantity,
        }
    }
}

/// A stock record together with its batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCandidate {
    pub record: StockRecord,
    pub batch: Batch,
}

/// A stock record that may take part in the transfer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EligibleBatch {
    pub stock_record_id: Uuid,
    pub batch_id: Uuid,
    pub batch_code: String,
    pub source_quantity: i64,
    pub expiry_date: Option<NaiveDate>,
    pub days_to_expiry: Option<i64>,
    /// Advisory only
    pub expiring_soon: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Expired,
    NoStock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExcludedBatch {
    pub stock_record_id: Uuid,
    pub batch_id: Uuid,
    pub batch_code: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub direction: TransferDirection,
    pub eligible: Vec<EligibleBatch>,
    pub excluded: Vec<ExcludedBatch>,
}

/// Split candidates into eligible and excluded.
///
/// Expired batches (`expiry_date <= today`) are always excluded, then records
/// with nothing on the source side. Batches expiring within
/// `expiring_soon_days` stay eligible but are flagged.
pub fn select_eligible_batches(
    candidates: &[TransferCandidate],
    direction: TransferDirection,
    today: NaiveDate,
    expiring_soon_days: i64,
) -> EligibilityReport {
    let mut eligible = Vec::new();
    let mut excluded = Vec::new();

    for TransferCandidate { record, batch } in candidates {
        let exclude = |reason: ExclusionReason| ExcludedBatch {
            stock_record_id: record.id,
            batch_id: batch.id,
            batch_code: batch.batch_code.clone(),
            reason,
        };

        if batch.is_expired(today) {
            excluded.push(exclude(ExclusionReason::Expired));
            continue;
        }
        let source_quantity = record.quantity_at(direction.source_side());
        if source_quantity <= 0 {
            excluded.push(exclude(ExclusionReason::NoStock));
            continue;
        }

        eligible.push(EligibleBatch {
            stock_record_id: record.id,
            batch_id: batch.id,
            batch_code: batch.batch_code.clone(),
            source_quantity,
            expiry_date: batch.expiry_date,
            days_to_expiry: batch.days_to_expiry(today),
            expiring_soon: batch.is_expiring_soon(today, expiring_soon_days),
        });
    }

    EligibilityReport {
        direction,
        eligible,
        excluded,
    }
}

/// Guard used by the executor: expired batches never move
pub fn ensure_not_expired(batch: &Batch, today: NaiveDate) -> LedgerResult<()> {
    match batch.expiry_date {
        Some(expiry_date) if batch.is_expired(today) => Err(LedgerError::ExpiredBatch {
            batch_id: batch.id,
            batch_code: batch.batch_code.clone(),
            expiry_date,
        }),
        _ => Ok(()),
    }
}

/// Per-batch quantity must be positive and within the source quantity
pub fn validate_transfer_quantity(eligible: &EligibleBatch, quantity: i64) -> LedgerResult<()> {
    if quantity <= 0 {
        return Err(LedgerError::InvalidQuantity {
            operation: "transfer".to_string(),
            quantity,
            message: "bulk transfer quantities must be positive".to_string(),
        });
    }
    if quantity > eligible.source_quantity {
        return Err(LedgerError::InsufficientStock {
            bucket: "source",
            current: eligible.source_quantity,
            requested: quantity,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub stock_record_id: Uuid,
    pub batch_code: String,
    pub quantity: i64,
    pub expiring_soon: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocationPlan {
    pub allocations: Vec<Allocation>,
    pub requested: i64,
    pub allocated: i64,
    pub shortfall: i64,
}

/// Fill `requested_total` first-expiry-first-out.
///
/// Batches without an expiry date go last; ties break on batch code so the
/// plan is deterministic.
pub fn allocate_transfer(eligible: &[EligibleBatch], requested_total: i64) -> AllocationPlan {
    let mut ordered: Vec<&EligibleBatch> = eligible.iter().collect();
    ordered.sort_by(|a, b| {
        let key = |e: &EligibleBatch| (e.expiry_date.is_none(), e.expiry_date);
        key(*a)
            .cmp(&key(*b))
            .then_with(|| a.batch_code.cmp(&b.batch_code))
    });

    let requested = requested_total.max(0);
    let mut remaining = requested;
    let mut allocations = Vec::new();

    for entry in ordered {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(entry.source_quantity);
        if take <= 0 {
            continue;
        }
        allocations.push(Allocation {
            stock_record_id: entry.stock_record_id,
            batch_code: entry.batch_code.clone(),
            quantity: take,
            expiring_soon: entry.expiring_soon,
        });
        remaining -= take;
    }

    AllocationPlan {
        allocations,
        requested,
        allocated: requested - remaining,
        shortfall: remaining,
    }
}

/// One line of a bulk transfer request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransferItem {
    #[serde(alias = "detailInventoryId", alias = "stock_record_id")]
    pub detail_inventory_id: Uuid,
    pub quantity: i64,
}

/// Metadata copied onto every movement of a bulk transfer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkTransferMeta {
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub performed_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransferRequest {
    pub items: Vec<BulkTransferItem>,
    pub direction: TransferDirection,
    #[serde(default)]
    pub meta: BulkTransferMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkTransferFailure {
    pub stock_record_id: Uuid,
    pub code: String,
    pub error: String,
}

/// Outcome of a bulk transfer; partial success is expected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransferSummary {
    pub succeeded: usize,
    /// Every item not applied, expired ones included
    pub failed: usize,
    /// Items rejected because their batch has expired
    pub excluded: usize,
    pub summary: String,
    pub failures: Vec<BulkTransferFailure>,
    pub movements: Vec<Movement>,
    /// Stock records moved whose batch expires soon
    pub expiring_soon: Vec<Uuid>,
}

impl BulkTransferSummary {
    pub fn new(direction: TransferDirection) -> Self {
        Self {
            succeeded: 0,
            failed: 0,
            excluded: 0,
            summary: format!("{:?}: nothing submitted", direction),
            failures: Vec::new(),
            movements: Vec::new(),
            expiring_soon: Vec::new(),
        }
    }

    pub fn record_success(&mut self, movement: Movement, expiring_soon: bool) {
        if expiring_soon {
            self.expiring_soon.push(movement.stock_record_id);
        }
        self.succeeded += 1;
        self.movements.push(movement);
    }

    pub fn record_failure(&mut self, stock_record_id: Uuid, code: &str, error: String) {
        if code == "EXPIRED_BATCH" {
            self.excluded += 1;
        }
        self.failed += 1;
        self.failures.push(BulkTransferFailure {
            stock_record_id,
            code: code.to_string(),
            error,
        });
    }

    pub fn finish(&mut self, direction: TransferDirection) {
        let label = match direction {
            TransferDirection::ToShelf => "to shelf",
            TransferDirection::ToWarehouse => "to warehouse",
        };
        self.summary = format!(
            "{} of {} transfers {} applied ({} failed, {} expired)",
            self.succeeded,
            self.succeeded + self.failed,
            label,
            self.failed,
            self.excluded
        );
    }
}
