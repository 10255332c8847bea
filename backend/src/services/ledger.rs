//! Movement ledger service: the only path that changes stock quantities

use std::sync::Arc;

use shared::{
    ActingContext, LedgerError, Movement, MovementFilter, MovementIntent, MovementMetadataUpdate,
    MovementOutcome, PaginatedResponse, Pagination, RecordMovementInput, SortOrder,
    StockRecordView,
};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

/// Ledger service for applying, reversing and listing movements
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Record a movement submitted over the API
    pub async fn record_movement(
        &self,
        input: RecordMovementInput,
        ctx: &ActingContext,
    ) -> AppResult<MovementOutcome> {
        let record = self.store.get_stock_record(input.inventory_detail_id).await?;
        if record.batch_id != input.batch_id {
            return Err(AppError::validation(
                "batch_id",
                format!(
                    "stock record {} belongs to batch {}, not {}",
                    record.id, record.batch_id, input.batch_id
                ),
            ));
        }

        self.apply(input.into_intent(), ctx).await
    }

    /// Apply one movement atomically
    pub async fn apply(
        &self,
        intent: MovementIntent,
        ctx: &ActingContext,
    ) -> AppResult<MovementOutcome> {
        self.ensure_performer(intent.meta.performed_by, ctx)?;

        let movement_type = intent.movement_type;
        let outcome = self.store.apply_movement(intent, ctx).await?;

        tracing::info!(
            movement_number = outcome.movement.movement_number,
            movement_type = %movement_type,
            stock_record_id = %outcome.movement.stock_record_id,
            quantity = outcome.movement.quantity,
            "Movement recorded"
        );
        Ok(outcome)
    }

    /// Undo a movement by appending its compensating movement
    pub async fn reverse(&self, movement_id: Uuid, ctx: &ActingContext) -> AppResult<MovementOutcome> {
        self.ensure_performer(None, ctx)?;

        let outcome = self.store.reverse_movement(movement_id, ctx).await?;

        tracing::info!(
            movement_number = outcome.movement.movement_number,
            reversal_of = %movement_id,
            "Movement reversed"
        );
        Ok(outcome)
    }

    pub async fn get(&self, movement_id: Uuid) -> AppResult<Movement> {
        self.store.get_movement(movement_id).await
    }

    /// Page through movements, newest first unless `order` says otherwise
    pub async fn list(
        &self,
        filter: MovementFilter,
        order: Option<SortOrder>,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> AppResult<PaginatedResponse<Movement>> {
        if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
            if start > end {
                return Err(AppError::validation(
                    "start_date",
                    "start_date must not be after end_date",
                ));
            }
        }

        let pagination = Pagination::new(
            page,
            per_page,
            self.config.default_page_size,
            self.config.max_page_size,
        );
        let (movements, total) = self
            .store
            .list_movements(&filter, order.unwrap_or_default(), pagination)
            .await?;

        Ok(PaginatedResponse::new(movements, pagination, total))
    }

    /// Edit reason, notes or date of a movement
    pub async fn update_metadata(
        &self,
        movement_id: Uuid,
        update: MovementMetadataUpdate,
    ) -> AppResult<Movement> {
        let movement = self.store.update_movement_metadata(movement_id, update).await?;
        tracing::debug!(movement_number = movement.movement_number, "Movement metadata updated");
        Ok(movement)
    }

    /// Hold `quantity` of the record's available stock
    pub async fn reserve(
        &self,
        stock_record_id: Uuid,
        quantity: i64,
        ctx: &ActingContext,
    ) -> AppResult<StockRecordView> {
        let quantity = positive("reserve", quantity)?;
        self.ensure_performer(None, ctx)?;

        let record = self
            .store
            .change_reservation(stock_record_id, quantity, ctx)
            .await?;
        tracing::info!(%stock_record_id, quantity, "Stock reserved");
        Ok(record.view())
    }

    /// Give back previously reserved quantity
    pub async fn release_reservation(
        &self,
        stock_record_id: Uuid,
        quantity: i64,
        ctx: &ActingContext,
    ) -> AppResult<StockRecordView> {
        let quantity = positive("release", quantity)?;
        self.ensure_performer(None, ctx)?;

        let record = self
            .store
            .change_reservation(stock_record_id, -quantity, ctx)
            .await?;
        tracing::info!(%stock_record_id, quantity, "Reservation released");
        Ok(record.view())
    }

    fn ensure_performer(&self, performed_by: Option<Uuid>, ctx: &ActingContext) -> AppResult<()> {
        if self.config.require_performer && performed_by.or(ctx.employee_id).is_none() {
            return Err(AppError::validation(
                "performed_by",
                "an acting employee is required for stock changes",
            ));
        }
        Ok(())
    }
}

fn positive(operation: &str, quantity: i64) -> AppResult<i64> {
    if quantity <= 0 {
        return Err(LedgerError::InvalidQuantity {
            operation: operation.to_string(),
            quantity,
            message: "quantity must be positive".to_string(),
        }
        .into());
    }
    Ok(quantity)
}
