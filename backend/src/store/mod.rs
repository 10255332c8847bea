//! Persistence for the stock ledger
//!
//! A [`LedgerStore`] is the single writer of stock quantities. Every mutating
//! method runs its read-modify-write inside one critical section (a database
//! transaction holding row locks, or the in-memory state lock) and delegates
//! the rules to the pure functions in [`shared::ledger`].

use async_trait::async_trait;
use shared::{
    ActingContext, Batch, BatchStatus, Location, LocationSnapshot, Movement, MovementFilter,
    MovementIntent, MovementMetadataUpdate, MovementOutcome, Pagination, SortOrder, StockRecord,
    StockRecordFilter,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a batch and, optionally, its initial empty stock record
    async fn insert_batch(&self, batch: Batch, record: Option<StockRecord>) -> AppResult<()>;
    async fn get_batch(&self, id: Uuid) -> AppResult<Batch>;
    async fn list_batches(&self, product_id: Option<Uuid>) -> AppResult<Vec<Batch>>;
    async fn update_batch_status(&self, id: Uuid, status: BatchStatus) -> AppResult<Batch>;

    async fn insert_location(&self, location: Location) -> AppResult<()>;
    async fn get_location(&self, id: Uuid) -> AppResult<Location>;
    async fn list_locations(&self, active_only: bool) -> AppResult<Vec<Location>>;
    /// Deactivating an occupied location is rejected
    async fn set_location_active(&self, id: Uuid, active: bool) -> AppResult<Location>;
    /// Location with its occupants, recomputed from stock records
    async fn location_snapshot(&self, id: Uuid) -> AppResult<LocationSnapshot>;

    async fn insert_stock_record(&self, record: StockRecord) -> AppResult<()>;
    async fn get_stock_record(&self, id: Uuid) -> AppResult<StockRecord>;
    async fn list_stock_records(&self, filter: &StockRecordFilter) -> AppResult<Vec<StockRecord>>;
    /// Only empty records may be deleted
    async fn delete_stock_record(&self, id: Uuid) -> AppResult<()>;
    /// Reserve (`delta > 0`) or release (`delta < 0`)
    async fn change_reservation(
        &self,
        id: Uuid,
        delta: i64,
        ctx: &ActingContext,
    ) -> AppResult<StockRecord>;

    /// Validate and apply one movement atomically
    async fn apply_movement(
        &self,
        intent: MovementIntent,
        ctx: &ActingContext,
    ) -> AppResult<MovementOutcome>;
    /// Append the compensating movement for `id` and mark it reversed
    async fn reverse_movement(&self, id: Uuid, ctx: &ActingContext) -> AppResult<MovementOutcome>;
    async fn get_movement(&self, id: Uuid) -> AppResult<Movement>;
    /// One page of matching movements plus the total match count
    async fn list_movements(
        &self,
        filter: &MovementFilter,
        order: SortOrder,
        page: Pagination,
    ) -> AppResult<(Vec<Movement>, u64)>;
    async fn update_movement_metadata(
        &self,
        id: Uuid,
        update: MovementMetadataUpdate,
    ) -> AppResult<Movement>;

    /// Whether the backing storage is reachable
    async fn ping(&self) -> bool;
}

/// Status changes follow the batch lifecycle; `depleted` needs empty records
pub(crate) fn validate_status_change<'a>(
    batch: &Batch,
    next: BatchStatus,
    records: impl IntoIterator<Item = &'a StockRecord>,
) -> AppResult<()> {
    if !batch.status.can_transition_to(next) {
        return Err(AppError::InvalidStateTransition(format!(
            "batch {} cannot change from {} to {}",
            batch.batch_code, batch.status, next
        )));
    }
    if next == BatchStatus::Depleted {
        for record in records {
            shared::check_deletable(record)?;
        }
    }
    Ok(())
}
