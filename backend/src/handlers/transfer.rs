//! HTTP handlers for bulk transfers

use axum::{extract::State, Json};
use shared::{BulkTransferRequest, BulkTransferSummary};

use crate::error::AppResult;
use crate::middleware::Acting;
use crate::services::transfer::{TransferPlan, TransferPlanRequest, TransferService};
use crate::AppState;

/// Preview eligibility and a first-expiry-first-out allocation
pub async fn plan_transfer(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Json(input): Json<TransferPlanRequest>,
) -> AppResult<Json<TransferPlan>> {
    let service = TransferService::new(state.store, state.config.ledger.clone());
    let plan = service.plan(input, &ctx).await?;
    Ok(Json(plan))
}

/// Apply a bulk transfer item by item
pub async fn bulk_transfer(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Json(input): Json<BulkTransferRequest>,
) -> AppResult<Json<BulkTransferSummary>> {
    let service = TransferService::new(state.store, state.config.ledger.clone());
    let summary = service.bulk_transfer(input, &ctx).await?;
    Ok(Json(summary))
}
