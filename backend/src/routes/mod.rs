//! Route definitions for the stock ledger API

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/movements", movement_routes())
        .nest("/stock-records", stock_record_routes())
        .nest("/batches", batch_routes())
        .nest("/locations", location_routes())
        .nest("/transfers", transfer_routes())
}

/// Movement ledger routes
fn movement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_movements).post(handlers::record_movement),
        )
        .route(
            "/:movement_id",
            get(handlers::get_movement)
                .patch(handlers::update_movement)
                .delete(handlers::reverse_movement),
        )
}

/// Stock record routes
fn stock_record_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_stock_records).post(handlers::create_stock_record),
        )
        .route(
            "/:stock_record_id",
            get(handlers::get_stock_record).delete(handlers::delete_stock_record),
        )
        .route(
            "/:stock_record_id/location",
            put(handlers::assign_location).delete(handlers::release_location),
        )
        .route("/:stock_record_id/move", post(handlers::move_batch))
        .route("/:stock_record_id/reserve", post(handlers::reserve_stock))
        .route("/:stock_record_id/release", post(handlers::release_stock))
}

/// Batch routes
fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batches).post(handlers::create_batch))
        .route("/:batch_id", get(handlers::get_batch))
        .route("/:batch_id/status", put(handlers::update_batch_status))
}

/// Location routes
fn location_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_locations).post(handlers::create_location),
        )
        .route("/:location_id", get(handlers::get_location))
        .route("/:location_id/occupancy", get(handlers::get_occupancy))
        .route("/:location_id/activate", post(handlers::activate_location))
        .route("/:location_id/deactivate", post(handlers::deactivate_location))
}

/// Bulk transfer routes
fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/plan", post(handlers::plan_transfer))
        .route("/bulk", post(handlers::bulk_transfer))
}
