//! HTTP handlers for storage locations

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{CreateLocationInput, Location, LocationOccupancy};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::Acting;
use crate::services::LocationService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListLocationsQuery {
    pub active_only: Option<bool>,
}

fn service(state: AppState) -> LocationService {
    LocationService::new(state.store, state.config.ledger.clone())
}

pub async fn create_location(
    State(state): State<AppState>,
    Acting(ctx): Acting,
    Json(input): Json<CreateLocationInput>,
) -> AppResult<(StatusCode, Json<Location>)> {
    let location = service(state).create(input, &ctx).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

pub async fn list_locations(
    State(state): State<AppState>,
    Query(query): Query<ListLocationsQuery>,
) -> AppResult<Json<Vec<Location>>> {
    let locations = service(state)
        .list(query.active_only.unwrap_or(false))
        .await?;
    Ok(Json(locations))
}

pub async fn get_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> AppResult<Json<Location>> {
    let location = service(state).get(location_id).await?;
    Ok(Json(location))
}

/// Current occupant and free capacity
pub async fn get_occupancy(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> AppResult<Json<LocationOccupancy>> {
    let occupancy = service(state).occupancy(location_id).await?;
    Ok(Json(occupancy))
}

pub async fn activate_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> AppResult<Json<Location>> {
    let location = service(state).activate(location_id).await?;
    Ok(Json(location))
}

pub async fn deactivate_location(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> AppResult<Json<Location>> {
    let location = service(state).deactivate(location_id).await?;
    Ok(Json(location))
}
