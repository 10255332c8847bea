//! HTTP handlers for the movement ledger

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::{
    Movement, MovementFilter, MovementMetadataUpdate, MovementOutcome, MovementType,
    PaginatedResponse, RecordMovementInput, SortOrder,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::Acting;
use crate::services::LedgerService;
use crate::AppState;

/// Query parameters for listing movements
#[derive(Debug, Deserialize)]
pub struct ListMovementsQuery {
    #[serde(alias = "stock_record_id")]
    pub inventory_detail: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub performed_by: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub order: Option<SortOrder>,
}

impl ListMovementsQuery {
    fn filter(&self) -> MovementFilter {
        MovementFilter {
            stock_record_id: self.inventory_detail,
            batch_id: self.batch_id,
            product_id: self.product_id,
            movement_type: self.movement_type,
            start_date: self.start_date,
            end_date: self.end_date,
            performed_by: self.performed_by,
        }
    }
}

fn ledger(state: AppState) -> LedgerService {
    LedgerService::new(state.store, state.config.ledger.clone())
}

/// Record a movement
pub async fn record_movement(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Json(input): Json<RecordMovementInput>,
) -> AppResult<Json<MovementOutcome>> {
    let outcome = ledger(state).record_movement(input, &ctx).await?;
    Ok(Json(outcome))
}

/// List movements
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<ListMovementsQuery>,
) -> AppResult<Json<PaginatedResponse<Movement>>> {
    let page = ledger(state)
        .list(query.filter(), query.order, query.page, query.per_page)
        .await?;
    Ok(Json(page))
}

/// Get a single movement
pub async fn get_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<Movement>> {
    let movement = ledger(state).get(movement_id).await?;
    Ok(Json(movement))
}

/// Edit reason, notes or date
pub async fn update_movement(
    State(state): State<AppState>,
    Path(movement_id): Path<Uuid>,
    Json(input): Json<MovementMetadataUpdate>,
) -> AppResult<Json<Movement>> {
    let movement = ledger(state).update_metadata(movement_id, input).await?;
    Ok(Json(movement))
}

/// Delete a movement by appending its reversal
pub async fn reverse_movement(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Path(movement_id): Path<Uuid>,
) -> AppResult<Json<MovementOutcome>> {
    let outcome = ledger(state).reverse(movement_id, &ctx).await?;
    Ok(Json(outcome))
}
