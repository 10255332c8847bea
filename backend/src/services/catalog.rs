//! Batches and their stock records

use std::sync::Arc;

use serde::Serialize;
use shared::{
    validate_batch_code, ActingContext, Batch, BatchStatus, CreateBatchInput,
    CreateStockRecordInput, StockRecord, StockRecordFilter, StockRecordView,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

/// A newly registered batch with its initial stock record
#[derive(Debug, Clone, Serialize)]
pub struct CreatedBatch {
    pub batch: Batch,
    pub stock_record: Option<StockRecordView>,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LedgerStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Register a received batch; quantities start at zero and only change
    /// through movements
    pub async fn create_batch(
        &self,
        input: CreateBatchInput,
        ctx: &ActingContext,
    ) -> AppResult<CreatedBatch> {
        input.validate()?;
        validate_batch_code(&input.batch_code)
            .map_err(|msg| AppError::validation("batch_code", msg))?;

        let batch = Batch {
            id: Uuid::new_v4(),
            batch_code: input.batch_code,
            product_id: input.product_id,
            product_name: shared::normalize_text(input.product_name),
            expiry_date: input.expiry_date,
            quantity: input.quantity,
            status: BatchStatus::Active,
            created_at: ctx.now,
        };
        let record = input
            .create_stock_record
            .unwrap_or(true)
            .then(|| StockRecord::new(Uuid::new_v4(), batch.id, ctx.now));

        self.store.insert_batch(batch.clone(), record.clone()).await?;

        tracing::info!(batch_code = %batch.batch_code, "Batch registered");
        Ok(CreatedBatch {
            batch,
            stock_record: record.map(StockRecord::view),
        })
    }

    pub async fn get_batch(&self, batch_id: Uuid) -> AppResult<Batch> {
        self.store.get_batch(batch_id).await
    }

    pub async fn list_batches(&self, product_id: Option<Uuid>) -> AppResult<Vec<Batch>> {
        self.store.list_batches(product_id).await
    }

    pub async fn update_batch_status(&self, batch_id: Uuid, status: BatchStatus) -> AppResult<Batch> {
        let batch = self.store.update_batch_status(batch_id, status).await?;
        tracing::info!(batch_code = %batch.batch_code, status = %status, "Batch status changed");
        Ok(batch)
    }

    /// Add a further stock record for a batch (split across locations)
    pub async fn create_stock_record(
        &self,
        input: CreateStockRecordInput,
        ctx: &ActingContext,
    ) -> AppResult<StockRecordView> {
        let batch = self.store.get_batch(input.batch_id).await?;
        if batch.status.is_terminal() {
            return Err(AppError::InvalidStateTransition(format!(
                "batch {} is {} and cannot receive new stock records",
                batch.batch_code, batch.status
            )));
        }

        let record = StockRecord::new(Uuid::new_v4(), batch.id, ctx.now);
        self.store.insert_stock_record(record.clone()).await?;

        tracing::info!(stock_record_id = %record.id, batch_code = %batch.batch_code, "Stock record created");
        Ok(record.view())
    }

    pub async fn get_stock_record(&self, stock_record_id: Uuid) -> AppResult<StockRecordView> {
        Ok(self.store.get_stock_record(stock_record_id).await?.view())
    }

    pub async fn list_stock_records(&self, filter: StockRecordFilter) -> AppResult<Vec<StockRecordView>> {
        let records = self.store.list_stock_records(&filter).await?;
        Ok(records.into_iter().map(StockRecord::view).collect())
    }

    /// Empty records only; the movement history stays
    pub async fn delete_stock_record(&self, stock_record_id: Uuid) -> AppResult<()> {
        self.store.delete_stock_record(stock_record_id).await?;
        tracing::info!(%stock_record_id, "Stock record deleted");
        Ok(())
    }
}
