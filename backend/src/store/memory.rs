//! In-process ledger store
//!
//! All state lives behind one async mutex, so each operation observes and
//! mutates a consistent snapshot. Used when no database is configured and in
//! tests.

use std::collections::HashMap;

use async_trait::async_trait;
use shared::{
    ActingContext, Batch, BatchStatus, Location, LocationContext, LocationSnapshot, Movement,
    MovementFilter, MovementIntent, MovementMetadataUpdate, MovementOutcome, MovementType,
    Pagination, SortOrder, StockRecord, StockRecordFilter, Transition,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{validate_status_change, LedgerStore};
use crate::error::{AppError, AppResult};

#[derive(Debug, Default)]
struct LedgerState {
    batches: HashMap<Uuid, Batch>,
    locations: HashMap<Uuid, Location>,
    records: HashMap<Uuid, StockRecord>,
    /// Append-only, ordered by movement number
    movements: Vec<Movement>,
    movement_index: HashMap<Uuid, usize>,
    last_movement_number: i64,
}

impl LedgerState {
    fn record(&self, id: Uuid) -> AppResult<&StockRecord> {
        self.records
            .get(&id)
            .ok_or_else(|| AppError::not_found("Stock record"))
    }

    fn batch(&self, id: Uuid) -> AppResult<&Batch> {
        self.batches
            .get(&id)
            .ok_or_else(|| AppError::not_found("Batch"))
    }

    fn snapshot(&self, location_id: Uuid) -> AppResult<LocationSnapshot> {
        let location = self
            .locations
            .get(&location_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Location"))?;
        let mut occupants: Vec<(Uuid, i64)> = self
            .records
            .values()
            .filter(|r| r.location_id == Some(location_id))
            .map(|r| (r.id, r.quantity_on_hand))
            .collect();
        occupants.sort();
        Ok(LocationSnapshot::new(location, occupants))
    }

    fn location_context(
        &self,
        current: Option<Uuid>,
        target: Option<Uuid>,
    ) -> AppResult<LocationContext> {
        Ok(LocationContext {
            current: current.map(|id| self.snapshot(id)).transpose()?,
            target: target.map(|id| self.snapshot(id)).transpose()?,
        })
    }

    /// Persist a planned transition: allocate the next number, store both
    fn commit(&mut self, transition: Transition, ctx: &ActingContext) -> MovementOutcome {
        self.last_movement_number += 1;
        let record = transition.record;
        let movement = transition.movement.into_movement(
            Uuid::new_v4(),
            self.last_movement_number,
            record.id,
            record.batch_id,
            ctx.now,
        );

        self.movement_index.insert(movement.id, self.movements.len());
        self.movements.push(movement.clone());
        self.records.insert(record.id, record.clone());

        MovementOutcome {
            movement,
            stock_record: record.view(),
        }
    }
}

/// Ledger store backed by process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<LedgerState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_batch(&self, batch: Batch, record: Option<StockRecord>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state
            .batches
            .values()
            .any(|b| b.batch_code == batch.batch_code)
        {
            return Err(AppError::DuplicateEntry("batch_code".to_string()));
        }
        if let Some(record) = record {
            state.records.insert(record.id, record);
        }
        state.batches.insert(batch.id, batch);
        Ok(())
    }

    async fn get_batch(&self, id: Uuid) -> AppResult<Batch> {
        let state = self.state.lock().await;
        state.batch(id).cloned()
    }

    async fn list_batches(&self, product_id: Option<Uuid>) -> AppResult<Vec<Batch>> {
        let state = self.state.lock().await;
        let mut batches: Vec<Batch> = state
            .batches
            .values()
            .filter(|b| product_id.map_or(true, |id| b.product_id == id))
            .cloned()
            .collect();
        batches.sort_by(|a, b| a.batch_code.cmp(&b.batch_code));
        Ok(batches)
    }

    async fn update_batch_status(&self, id: Uuid, status: BatchStatus) -> AppResult<Batch> {
        let mut state = self.state.lock().await;
        let batch = state.batch(id)?.clone();
        validate_status_change(
            &batch,
            status,
            state.records.values().filter(|r| r.batch_id == id),
        )?;

        let updated = Batch { status, ..batch };
        state.batches.insert(id, updated.clone());
        Ok(updated)
    }

    async fn insert_location(&self, location: Location) -> AppResult<()> {
        let mut state = self.state.lock().await;
        for existing in state.locations.values() {
            if existing.name == location.name {
                return Err(AppError::DuplicateEntry("name".to_string()));
            }
            if existing.location_code == location.location_code {
                return Err(AppError::DuplicateEntry("location_code".to_string()));
            }
        }
        state.locations.insert(location.id, location);
        Ok(())
    }

    async fn get_location(&self, id: Uuid) -> AppResult<Location> {
        let state = self.state.lock().await;
        state
            .locations
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Location"))
    }

    async fn list_locations(&self, active_only: bool) -> AppResult<Vec<Location>> {
        let state = self.state.lock().await;
        let mut locations: Vec<Location> = state
            .locations
            .values()
            .filter(|l| !active_only || l.is_active)
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn set_location_active(&self, id: Uuid, active: bool) -> AppResult<Location> {
        let mut state = self.state.lock().await;
        let snapshot = state.snapshot(id)?;
        if !active {
            if let Some(occupant) = snapshot.occupants.first().map(|(id, _)| *id) {
                return Err(shared::LedgerError::LocationOccupied {
                    location_id: id,
                    name: snapshot.location.name.clone(),
                    occupant,
                }
                .into());
            }
        }

        let updated = Location {
            is_active: active,
            ..snapshot.location
        };
        state.locations.insert(id, updated.clone());
        Ok(updated)
    }

    async fn location_snapshot(&self, id: Uuid) -> AppResult<LocationSnapshot> {
        let state = self.state.lock().await;
        state.snapshot(id)
    }

    async fn insert_stock_record(&self, record: StockRecord) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.batch(record.batch_id)?;
        state.records.insert(record.id, record);
        Ok(())
    }

    async fn get_stock_record(&self, id: Uuid) -> AppResult<StockRecord> {
        let state = self.state.lock().await;
        state.record(id).cloned()
    }

    async fn list_stock_records(&self, filter: &StockRecordFilter) -> AppResult<Vec<StockRecord>> {
        let state = self.state.lock().await;
        let mut records: Vec<StockRecord> = state
            .records
            .values()
            .filter(|r| filter.batch_id.map_or(true, |id| r.batch_id == id))
            .filter(|r| filter.location_id.map_or(true, |id| r.location_id == Some(id)))
            .filter(|r| {
                filter.product_id.map_or(true, |id| {
                    state
                        .batches
                        .get(&r.batch_id)
                        .is_some_and(|b| b.product_id == id)
                })
            })
            .filter(|r| filter.in_stock.map_or(true, |wanted| (r.total() > 0) == wanted))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn delete_stock_record(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        shared::check_deletable(state.record(id)?)?;
        state.records.remove(&id);
        Ok(())
    }

    async fn change_reservation(
        &self,
        id: Uuid,
        delta: i64,
        ctx: &ActingContext,
    ) -> AppResult<StockRecord> {
        let mut state = self.state.lock().await;
        let next = shared::plan_reservation(state.record(id)?, delta, ctx.now)?;
        state.records.insert(id, next.clone());
        Ok(next)
    }

    async fn apply_movement(
        &self,
        intent: MovementIntent,
        ctx: &ActingContext,
    ) -> AppResult<MovementOutcome> {
        let mut state = self.state.lock().await;
        let record = state.record(intent.stock_record_id)?.clone();
        let target = match intent.movement_type {
            MovementType::Location => intent.meta.location_id,
            _ => None,
        };
        let locations = state.location_context(record.location_id, target)?;

        let transition = shared::plan_movement(&record, &locations, &intent, ctx)?;
        shared::check_batch(state.batch(record.batch_id)?, &transition, ctx.today())?;
        Ok(state.commit(transition, ctx))
    }

    async fn reverse_movement(&self, id: Uuid, ctx: &ActingContext) -> AppResult<MovementOutcome> {
        let mut state = self.state.lock().await;
        let index = *state
            .movement_index
            .get(&id)
            .ok_or_else(|| AppError::not_found("Movement"))?;
        let original = state.movements[index].clone();
        let record = state.record(original.stock_record_id)?.clone();
        let target = match original.movement_type {
            MovementType::Location => original.from_location_id,
            _ => None,
        };
        let locations = state.location_context(record.location_id, target)?;

        let transition = shared::plan_reversal(&original, &record, &locations, ctx)?;
        shared::check_batch(state.batch(record.batch_id)?, &transition, ctx.today())?;
        let outcome = state.commit(transition, ctx);
        state.movements[index].reversed_by = Some(outcome.movement.id);
        Ok(outcome)
    }

    async fn get_movement(&self, id: Uuid) -> AppResult<Movement> {
        let state = self.state.lock().await;
        state
            .movement_index
            .get(&id)
            .map(|&index| state.movements[index].clone())
            .ok_or_else(|| AppError::not_found("Movement"))
    }

    async fn list_movements(
        &self,
        filter: &MovementFilter,
        order: SortOrder,
        page: Pagination,
    ) -> AppResult<(Vec<Movement>, u64)> {
        let state = self.state.lock().await;
        let matching: Vec<&Movement> = state
            .movements
            .iter()
            .filter(|m| {
                let product_id = state.batches.get(&m.batch_id).map(|b| b.product_id);
                filter.matches(m, product_id)
            })
            .collect();
        let total = matching.len() as u64;

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        let data: Vec<Movement> = match order {
            SortOrder::Asc => matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            SortOrder::Desc => matching
                .into_iter()
                .rev()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
        };
        Ok((data, total))
    }

    async fn update_movement_metadata(
        &self,
        id: Uuid,
        update: MovementMetadataUpdate,
    ) -> AppResult<Movement> {
        let mut state = self.state.lock().await;
        let index = *state
            .movement_index
            .get(&id)
            .ok_or_else(|| AppError::not_found("Movement"))?;
        let updated = shared::apply_metadata_update(&state.movements[index], &update)?;
        state.movements[index] = updated.clone();
        Ok(updated)
    }

    async fn ping(&self) -> bool {
        true
    }
}
