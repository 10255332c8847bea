//! Location management: topology, occupancy and stock record placement

use std::sync::Arc;

use shared::{
    validate_location_code, ActingContext, AssignLocationInput, CreateLocationInput, Location,
    LocationOccupancy, MoveBatchInput, MovementIntent, MovementMeta, MovementOutcome,
    MovementType,
};
use uuid::Uuid;
use validator::Validate;

use super::LedgerService;
use crate::config::LedgerConfig;
use crate::error::{AppError, AppResult};
use crate::store::LedgerStore;

#[derive(Clone)]
pub struct LocationService {
    store: Arc<dyn LedgerStore>,
    ledger: LedgerService,
}

impl LocationService {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self {
            ledger: LedgerService::new(store.clone(), config),
            store,
        }
    }

    /// Register a new location
    pub async fn create(&self, input: CreateLocationInput, ctx: &ActingContext) -> AppResult<Location> {
        input.validate()?;
        let name = input.name.trim().to_uppercase();
        shared::parse_location_name(&name).map_err(|msg| AppError::validation("name", msg))?;
        validate_location_code(&input.location_code)
            .map_err(|msg| AppError::validation("location_code", msg))?;

        let location = Location {
            id: Uuid::new_v4(),
            name,
            location_code: input.location_code.trim().to_string(),
            max_capacity: input.max_capacity,
            is_active: input.is_active.unwrap_or(true),
            created_at: ctx.now,
        };
        self.store.insert_location(location.clone()).await?;

        tracing::info!(location = %location.name, capacity = location.max_capacity, "Location created");
        Ok(location)
    }

    pub async fn get(&self, location_id: Uuid) -> AppResult<Location> {
        self.store.get_location(location_id).await
    }

    pub async fn list(&self, active_only: bool) -> AppResult<Vec<Location>> {
        self.store.list_locations(active_only).await
    }

    /// Occupant and free capacity, recomputed from stock records
    pub async fn occupancy(&self, location_id: Uuid) -> AppResult<LocationOccupancy> {
        let snapshot = self.store.location_snapshot(location_id).await?;
        Ok(snapshot.to_occupancy())
    }

    pub async fn activate(&self, location_id: Uuid) -> AppResult<Location> {
        let location = self.store.set_location_active(location_id, true).await?;
        tracing::info!(location = %location.name, "Location activated");
        Ok(location)
    }

    /// Only an empty location can be deactivated
    pub async fn deactivate(&self, location_id: Uuid) -> AppResult<Location> {
        let location = self.store.set_location_active(location_id, false).await?;
        tracing::info!(location = %location.name, "Location deactivated");
        Ok(location)
    }

    /// Bind the record to a location, or release it when `location_id` is null
    pub async fn assign_location(
        &self,
        stock_record_id: Uuid,
        input: AssignLocationInput,
        ctx: &ActingContext,
    ) -> AppResult<MovementOutcome> {
        let intent = MovementIntent {
            stock_record_id,
            movement_type: MovementType::Location,
            quantity: 0,
            meta: MovementMeta {
                location_id: input.location_id,
                reason: input.reason,
                notes: input.notes,
                ..MovementMeta::default()
            },
        };
        self.ledger.apply(intent, ctx).await
    }

    pub async fn release_location(
        &self,
        stock_record_id: Uuid,
        reason: Option<String>,
        ctx: &ActingContext,
    ) -> AppResult<MovementOutcome> {
        let input = AssignLocationInput {
            location_id: None,
            reason,
            notes: None,
        };
        self.assign_location(stock_record_id, input, ctx).await
    }

    /// Move from one location to another in a single movement; a failed
    /// target check leaves the record where it was
    pub async fn move_batch(
        &self,
        stock_record_id: Uuid,
        input: MoveBatchInput,
        ctx: &ActingContext,
    ) -> AppResult<MovementOutcome> {
        if input.from_location_id == input.to_location_id {
            return Err(AppError::validation(
                "to_location_id",
                "source and target locations must differ",
            ));
        }

        let intent = MovementIntent {
            stock_record_id,
            movement_type: MovementType::Location,
            quantity: 0,
            meta: MovementMeta {
                location_id: Some(input.to_location_id),
                expected_location_id: Some(input.from_location_id),
                reason: input.reason,
                notes: input.notes,
                ..MovementMeta::default()
            },
        };
        self.ledger.apply(intent, ctx).await
    }
}
