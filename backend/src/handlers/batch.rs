//! HTTP handlers for batches

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Batch, CreateBatchInput, UpdateBatchStatusInput};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::Acting;
use crate::services::catalog::{CatalogService, CreatedBatch};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListBatchesQuery {
    pub product_id: Option<Uuid>,
}

/// Register a batch
pub async fn create_batch(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<CreatedBatch>)> {
    let service = CatalogService::new(state.store);
    let created = service.create_batch(input, &ctx).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<ListBatchesQuery>,
) -> AppResult<Json<Vec<Batch>>> {
    let service = CatalogService::new(state.store);
    let batches = service.list_batches(query.product_id).await?;
    Ok(Json(batches))
}

pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<Batch>> {
    let service = CatalogService::new(state.store);
    let batch = service.get_batch(batch_id).await?;
    Ok(Json(batch))
}

/// Change a batch's lifecycle status
pub async fn update_batch_status(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<UpdateBatchStatusInput>,
) -> AppResult<Json<Batch>> {
    let service = CatalogService::new(state.store);
    let batch = service.update_batch_status(batch_id, input.status).await?;
    Ok(Json(batch))
}
