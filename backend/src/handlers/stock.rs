//! HTTP handlers for stock records

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{
    AssignLocationInput, CreateStockRecordInput, MoveBatchInput, MovementOutcome,
    ReservationInput, StockRecordFilter, StockRecordView,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::Acting;
use crate::services::{CatalogService, LedgerService, LocationService};
use crate::AppState;

/// Create a stock record for an existing batch
pub async fn create_stock_record(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Json(input): Json<CreateStockRecordInput>,
) -> AppResult<(StatusCode, Json<StockRecordView>)> {
    let service = CatalogService::new(state.store);
    let record = service.create_stock_record(input, &ctx).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// List stock records
pub async fn list_stock_records(
    State(state): State<AppState>,
    Query(filter): Query<StockRecordFilter>,
) -> AppResult<Json<Vec<StockRecordView>>> {
    let service = CatalogService::new(state.store);
    let records = service.list_stock_records(filter).await?;
    Ok(Json(records))
}

/// Get a stock record
pub async fn get_stock_record(
    State(state): State<AppState>,
    Path(stock_record_id): Path<Uuid>,
) -> AppResult<Json<StockRecordView>> {
    let service = CatalogService::new(state.store);
    let record = service.get_stock_record(stock_record_id).await?;
    Ok(Json(record))
}

/// Delete an empty stock record
pub async fn delete_stock_record(
    State(state): State<AppState>,
    Path(stock_record_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = CatalogService::new(state.store);
    service.delete_stock_record(stock_record_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reserve available quantity
pub async fn reserve_stock(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Path(stock_record_id): Path<Uuid>,
    Json(input): Json<ReservationInput>,
) -> AppResult<Json<StockRecordView>> {
    let service = LedgerService::new(state.store, state.config.ledger.clone());
    let record = service.reserve(stock_record_id, input.quantity, &ctx).await?;
    Ok(Json(record))
}

/// Release reserved quantity
pub async fn release_stock(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Path(stock_record_id): Path<Uuid>,
    Json(input): Json<ReservationInput>,
) -> AppResult<Json<StockRecordView>> {
    let service = LedgerService::new(state.store, state.config.ledger.clone());
    let record = service
        .release_reservation(stock_record_id, input.quantity, &ctx)
        .await?;
    Ok(Json(record))
}

/// Assign (or, with `null`, release) the record's location
pub async fn assign_location(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Path(stock_record_id): Path<Uuid>,
    Json(input): Json<AssignLocationInput>,
) -> AppResult<Json<MovementOutcome>> {
    let service = LocationService::new(state.store, state.config.ledger.clone());
    let outcome = service.assign_location(stock_record_id, input, &ctx).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReleaseLocationInput {
    pub reason: Option<String>,
}

/// Clear the record's location
pub async fn release_location(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Path(stock_record_id): Path<Uuid>,
    input: Option<Json<ReleaseLocationInput>>,
) -> AppResult<Json<MovementOutcome>> {
    let reason = input.and_then(|Json(input)| input.reason);
    let service = LocationService::new(state.store, state.config.ledger.clone());
    let outcome = service.release_location(stock_record_id, reason, &ctx).await?;
    Ok(Json(outcome))
}

/// Move the record from one location to another atomically
pub async fn move_batch(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Path(stock_record_id): Path<Uuid>,
    Json(input): Json<MoveBatchInput>,
) -> AppResult<Json<MovementOutcome>> {
    let service = LocationService::new(state.store, state.config.ledger.clone());
    let outcome = service.move_batch(stock_record_id, input, &ctx).await?;
    Ok(Json(outcome))
}
