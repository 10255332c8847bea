//! Movement ledger state machine
//!
//! Every function here is pure: it takes the current stock record, the
//! snapshots of any location involved and the caller's intent, and returns
//! either the next record plus the movement to append, or a typed error.
//! Stores run these inside their critical section and persist the result,
//! so the rules are identical for every persistence engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Batch, BatchStatus, LocationSnapshot, Movement, MovementDraft, MovementIntent, MovementMeta,
    MovementMetadataUpdate, MovementType, StockRecord, StockSide,
};
use crate::planner::ensure_not_expired;
use crate::types::ActingContext;
use crate::validation::{has_reason, normalize_text};

/// Ledger rule violations. All are recoverable and reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Invalid quantity {quantity} for {operation}: {message}")]
    InvalidQuantity {
        operation: String,
        quantity: i64,
        message: String,
    },

    #[error("Insufficient stock {bucket}: current {current}, requested {requested}")]
    InsufficientStock {
        bucket: &'static str,
        current: i64,
        requested: i64,
    },

    #[error("A reason is required for {movement_type} movements")]
    MissingReason { movement_type: MovementType },

    #[error("Location {name} is inactive")]
    LocationInactive { location_id: Uuid, name: String },

    #[error("Location {name} is already occupied by stock record {occupant}")]
    LocationOccupied {
        location_id: Uuid,
        name: String,
        occupant: Uuid,
    },

    #[error("Location {name} capacity {max_capacity} exceeded: occupied {occupied}, requested {requested}")]
    LocationCapacityExceeded {
        location_id: Uuid,
        name: String,
        max_capacity: i64,
        occupied: i64,
        requested: i64,
    },

    #[error("Batch {batch_code} expired on {expiry_date}")]
    ExpiredBatch {
        batch_id: Uuid,
        batch_code: String,
        expiry_date: NaiveDate,
    },

    #[error("Batch {batch_code} is {status} and cannot take on stock")]
    BatchClosed {
        batch_id: Uuid,
        batch_code: String,
        status: BatchStatus,
    },

    #[error("Invalid movement: {0}")]
    InvalidMovement(String),

    #[error("Movement {movement_id} has already been reversed")]
    AlreadyReversed {
        movement_id: Uuid,
        reversed_by: Option<Uuid>,
    },

    #[error("Stock record {stock_record_id} still holds stock")]
    StockNotEmpty {
        stock_record_id: Uuid,
        on_hand: i64,
        on_shelf: i64,
        reserved: i64,
    },
}

impl LedgerError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            LedgerError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            LedgerError::MissingReason { .. } => "MISSING_REASON",
            LedgerError::LocationInactive { .. } => "LOCATION_INACTIVE",
            LedgerError::LocationOccupied { .. } => "LOCATION_OCCUPIED",
            LedgerError::LocationCapacityExceeded { .. } => "LOCATION_CAPACITY_EXCEEDED",
            LedgerError::ExpiredBatch { .. } => "EXPIRED_BATCH",
            LedgerError::BatchClosed { .. } => "BATCH_CLOSED",
            LedgerError::InvalidMovement(_) => "INVALID_MOVEMENT",
            LedgerError::AlreadyReversed { .. } => "ALREADY_REVERSED",
            LedgerError::StockNotEmpty { .. } => "STOCK_NOT_EMPTY",
        }
    }

    /// Structured details for rendering an actionable message
    pub fn context(&self) -> Option<Value> {
        match self {
            LedgerError::InvalidQuantity {
                operation, quantity, ..
            } => Some(json!({ "operation": operation, "quantity": quantity })),
            LedgerError::InsufficientStock {
                bucket,
                current,
                requested,
            } => Some(json!({ "bucket": bucket, "current": current, "requested": requested })),
            LedgerError::MissingReason { movement_type } => {
                Some(json!({ "movement_type": movement_type }))
            }
            LedgerError::LocationInactive { location_id, name } => {
                Some(json!({ "location_id": location_id, "location_name": name }))
            }
            LedgerError::LocationOccupied {
                location_id,
                name,
                occupant,
            } => Some(json!({
                "location_id": location_id,
                "location_name": name,
                "occupant": occupant,
            })),
            LedgerError::LocationCapacityExceeded {
                location_id,
                name,
                max_capacity,
                occupied,
                requested,
            } => Some(json!({
                "location_id": location_id,
                "location_name": name,
                "max_capacity": max_capacity,
                "occupied": occupied,
                "requested": requested,
            })),
            LedgerError::ExpiredBatch {
                batch_id,
                batch_code,
                expiry_date,
            } => Some(json!({
                "batch_id": batch_id,
                "batch_code": batch_code,
                "expiry_date": expiry_date,
            })),
            LedgerError::BatchClosed {
                batch_id,
                batch_code,
                status,
            } => Some(json!({
                "batch_id": batch_id,
                "batch_code": batch_code,
                "status": status,
            })),
            LedgerError::InvalidMovement(_) => None,
            LedgerError::AlreadyReversed {
                movement_id,
                reversed_by,
            } => Some(json!({ "movement_id": movement_id, "reversed_by": reversed_by })),
            LedgerError::StockNotEmpty {
                stock_record_id,
                on_hand,
                on_shelf,
                reserved,
            } => Some(json!({
                "stock_record_id": stock_record_id,
                "on_hand": on_hand,
                "on_shelf": on_shelf,
                "reserved": reserved,
            })),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Snapshots of the locations a movement touches
#[derive(Debug, Clone, Default)]
pub struct LocationContext {
    /// The location the record is currently bound to
    pub current: Option<LocationSnapshot>,
    /// The location a relocation targets
    pub target: Option<LocationSnapshot>,
}

/// Next state of a stock record plus the movement that explains it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub record: StockRecord,
    pub movement: MovementDraft,
}

/// Check a planned transition against the owning batch.
///
/// A terminal batch takes no movement that adds stock, and stock of an
/// expired batch is never transferred. Reversals restore a prior state and
/// are exempt from the expiry rule but not from the terminal one.
pub fn check_batch(batch: &Batch, transition: &Transition, today: NaiveDate) -> LedgerResult<()> {
    let movement = &transition.movement;
    if batch.id != transition.record.batch_id {
        return Err(LedgerError::InvalidMovement(format!(
            "stock record {} does not belong to batch {}",
            transition.record.id, batch.batch_code
        )));
    }
    if batch.status.is_terminal() && movement.delta_on_hand + movement.delta_on_shelf > 0 {
        return Err(LedgerError::BatchClosed {
            batch_id: batch.id,
            batch_code: batch.batch_code.clone(),
            status: batch.status,
        });
    }
    if movement.movement_type == MovementType::Transfer && movement.reversal_of.is_none() {
        ensure_not_expired(batch, today)?;
    }
    Ok(())
}

/// Validate `intent` against `record` and compute the resulting transition
pub fn plan_movement(
    record: &StockRecord,
    locations: &LocationContext,
    intent: &MovementIntent,
    ctx: &ActingContext,
) -> LedgerResult<Transition> {
    let meta = &intent.meta;
    let movement_type = intent.movement_type;

    if intent.stock_record_id != record.id {
        return Err(LedgerError::InvalidMovement(format!(
            "intent targets stock record {} but {} was loaded",
            intent.stock_record_id, record.id
        )));
    }
    if meta.purchase_order_id.is_some() && movement_type != MovementType::In {
        return Err(LedgerError::InvalidMovement(
            "only in movements may reference a purchase order".to_string(),
        ));
    }
    if meta.counted.is_some() && movement_type != MovementType::Audit {
        return Err(LedgerError::InvalidMovement(
            "only audit movements accept a physical count".to_string(),
        ));
    }
    if (meta.location_id.is_some() || meta.expected_location_id.is_some())
        && movement_type != MovementType::Location
    {
        return Err(LedgerError::InvalidMovement(
            "only location movements may change a stock record's location".to_string(),
        ));
    }
    if movement_type.requires_reason() && !has_reason(meta.reason.as_deref()) {
        return Err(LedgerError::MissingReason { movement_type });
    }

    let (quantity, side, delta_on_hand, delta_on_shelf) = match movement_type {
        MovementType::Location => return plan_relocation(record, locations, meta, ctx),
        MovementType::In => {
            let q = positive_quantity(movement_type, intent.quantity)?;
            (q, None, q, 0)
        }
        MovementType::Out => {
            let side = required_side(movement_type, meta)?;
            let q = positive_quantity(movement_type, intent.quantity)?;
            let (dh, ds) = side_delta(side, -q);
            (q, Some(side), dh, ds)
        }
        MovementType::Adjustment => {
            let side = required_side(movement_type, meta)?;
            let q = nonzero_quantity(movement_type, intent.quantity)?;
            let (dh, ds) = side_delta(side, q);
            (q, Some(side), dh, ds)
        }
        MovementType::Audit => {
            let side = required_side(movement_type, meta)?;
            let discrepancy = match meta.counted {
                Some(counted) if counted < 0 => {
                    return Err(LedgerError::InvalidQuantity {
                        operation: movement_type.to_string(),
                        quantity: counted,
                        message: "physical count cannot be negative".to_string(),
                    })
                }
                Some(counted) => counted - record.quantity_at(side),
                None => intent.quantity,
            };
            let q = nonzero_quantity(movement_type, discrepancy)?;
            let (dh, ds) = side_delta(side, q);
            (q, Some(side), dh, ds)
        }
        MovementType::Transfer => {
            let q = nonzero_quantity(movement_type, intent.quantity)?;
            (q, None, -q, q)
        }
    };

    let next = apply_deltas(record, delta_on_hand, delta_on_shelf, ctx.now)?;
    if delta_on_hand > 0 {
        check_capacity(&next, locations.current.as_ref())?;
    }

    Ok(Transition {
        record: next,
        movement: MovementDraft {
            movement_type,
            quantity,
            side,
            delta_on_hand,
            delta_on_shelf,
            from_location_id: None,
            to_location_id: None,
            reason: normalize_text(meta.reason.clone()),
            date: meta.date.unwrap_or(ctx.now),
            performed_by: meta.performed_by.or(ctx.employee_id),
            notes: normalize_text(meta.notes.clone()),
            purchase_order_id: meta.purchase_order_id,
            reversal_of: None,
        },
    })
}

/// Compute the compensating transition that undoes `original`.
///
/// The inverse is validated against the current state with the same
/// invariants as any other movement; a reversal that would drive a quantity
/// negative or overflow a location is rejected, not clamped.
pub fn plan_reversal(
    original: &Movement,
    record: &StockRecord,
    locations: &LocationContext,
    ctx: &ActingContext,
) -> LedgerResult<Transition> {
    if original.reversed_by.is_some() {
        return Err(LedgerError::AlreadyReversed {
            movement_id: original.id,
            reversed_by: original.reversed_by,
        });
    }
    if original.is_compensating() {
        return Err(LedgerError::InvalidMovement(format!(
            "movement #{} is itself a reversal and cannot be reversed",
            original.movement_number
        )));
    }
    if original.stock_record_id != record.id {
        return Err(LedgerError::InvalidMovement(format!(
            "movement #{} does not belong to stock record {}",
            original.movement_number, record.id
        )));
    }

    let reason = Some(format!("Reversal of movement #{}", original.movement_number));

    if original.movement_type == MovementType::Location {
        if record.location_id != original.to_location_id {
            return Err(LedgerError::InvalidMovement(format!(
                "stock record has been relocated since movement #{}",
                original.movement_number
            )));
        }
        let restored = original.from_location_id;
        if let Some(location_id) = restored {
            let snapshot = target_snapshot(locations, location_id)?;
            check_location_assignment(record, snapshot)?;
        }

        let mut next = touched(record, ctx.now);
        next.location_id = restored;

        return Ok(Transition {
            movement: MovementDraft {
                movement_type: MovementType::Location,
                quantity: record.quantity_on_hand,
                side: None,
                delta_on_hand: 0,
                delta_on_shelf: 0,
                from_location_id: record.location_id,
                to_location_id: restored,
                reason,
                date: ctx.now,
                performed_by: ctx.employee_id,
                notes: None,
                purchase_order_id: None,
                reversal_of: Some(original.id),
            },
            record: next,
        });
    }

    let delta_on_hand = -original.delta_on_hand;
    let delta_on_shelf = -original.delta_on_shelf;
    let next = apply_deltas(record, delta_on_hand, delta_on_shelf, ctx.now)?;
    if delta_on_hand > 0 {
        check_capacity(&next, locations.current.as_ref())?;
    }

    Ok(Transition {
        record: next,
        movement: MovementDraft {
            movement_type: original.movement_type,
            quantity: -original.quantity,
            side: original.side,
            delta_on_hand,
            delta_on_shelf,
            from_location_id: None,
            to_location_id: None,
            reason,
            date: ctx.now,
            performed_by: ctx.employee_id,
            notes: None,
            purchase_order_id: original.purchase_order_id,
            reversal_of: Some(original.id),
        },
    })
}

/// Reserve (`delta > 0`) or release (`delta < 0`) quantity on a record
pub fn plan_reservation(
    record: &StockRecord,
    delta: i64,
    now: DateTime<Utc>,
) -> LedgerResult<StockRecord> {
    let operation = if delta < 0 { "release" } else { "reserve" };
    if delta == 0 {
        return Err(LedgerError::InvalidQuantity {
            operation: operation.to_string(),
            quantity: delta,
            message: "quantity must be non-zero".to_string(),
        });
    }
    if delta > 0 && delta > record.quantity_available() {
        return Err(LedgerError::InsufficientStock {
            bucket: "available",
            current: record.quantity_available(),
            requested: delta,
        });
    }
    if delta < 0 && -delta > record.quantity_reserved {
        return Err(LedgerError::InvalidQuantity {
            operation: operation.to_string(),
            quantity: -delta,
            message: format!("only {} reserved", record.quantity_reserved),
        });
    }

    let mut next = touched(record, now);
    next.quantity_reserved += delta;
    Ok(next)
}

/// Edit administrative metadata; quantities and identity never change
pub fn apply_metadata_update(
    movement: &Movement,
    update: &MovementMetadataUpdate,
) -> LedgerResult<Movement> {
    let mut next = movement.clone();
    if let Some(reason) = &update.reason {
        next.reason = normalize_text(Some(reason.clone()));
        if movement.movement_type.requires_reason()
            && !movement.is_compensating()
            && next.reason.is_none()
        {
            return Err(LedgerError::MissingReason {
                movement_type: movement.movement_type,
            });
        }
    }
    if let Some(notes) = &update.notes {
        next.notes = normalize_text(Some(notes.clone()));
    }
    if let Some(date) = update.date {
        next.date = date;
    }
    Ok(next)
}

/// Exclusivity, activity and capacity rules for binding `record` to a location
pub fn check_location_assignment(
    record: &StockRecord,
    target: &LocationSnapshot,
) -> LedgerResult<()> {
    let location = &target.location;
    if !location.is_active {
        return Err(LedgerError::LocationInactive {
            location_id: location.id,
            name: location.name.clone(),
        });
    }
    if let Some(occupant) = target.other_occupant(record.id) {
        return Err(LedgerError::LocationOccupied {
            location_id: location.id,
            name: location.name.clone(),
            occupant,
        });
    }
    let occupied = target.occupied_by_others(record.id);
    if occupied + record.quantity_on_hand > location.max_capacity {
        return Err(LedgerError::LocationCapacityExceeded {
            location_id: location.id,
            name: location.name.clone(),
            max_capacity: location.max_capacity,
            occupied,
            requested: record.quantity_on_hand,
        });
    }
    Ok(())
}

/// A stock record may only be deleted when it holds nothing
pub fn check_deletable(record: &StockRecord) -> LedgerResult<()> {
    if record.is_empty() {
        Ok(())
    } else {
        Err(LedgerError::StockNotEmpty {
            stock_record_id: record.id,
            on_hand: record.quantity_on_hand,
            on_shelf: record.quantity_on_shelf,
            reserved: record.quantity_reserved,
        })
    }
}

/// Apply signed deltas, enforcing non-negativity and the reservation bound
pub fn apply_deltas(
    record: &StockRecord,
    delta_on_hand: i64,
    delta_on_shelf: i64,
    now: DateTime<Utc>,
) -> LedgerResult<StockRecord> {
    let on_hand = checked_add(record.quantity_on_hand, delta_on_hand)?;
    if on_hand < 0 {
        return Err(LedgerError::InsufficientStock {
            bucket: StockSide::OnHand.as_str(),
            current: record.quantity_on_hand,
            requested: -delta_on_hand,
        });
    }
    let on_shelf = checked_add(record.quantity_on_shelf, delta_on_shelf)?;
    if on_shelf < 0 {
        return Err(LedgerError::InsufficientStock {
            bucket: StockSide::OnShelf.as_str(),
            current: record.quantity_on_shelf,
            requested: -delta_on_shelf,
        });
    }
    if checked_add(on_hand, on_shelf)? < record.quantity_reserved {
        return Err(LedgerError::InsufficientStock {
            bucket: "available",
            current: record.quantity_available(),
            requested: -(delta_on_hand + delta_on_shelf),
        });
    }

    let mut next = touched(record, now);
    next.quantity_on_hand = on_hand;
    next.quantity_on_shelf = on_shelf;
    Ok(next)
}

fn plan_relocation(
    record: &StockRecord,
    locations: &LocationContext,
    meta: &MovementMeta,
    ctx: &ActingContext,
) -> LedgerResult<Transition> {
    if let Some(expected) = meta.expected_location_id {
        if record.location_id != Some(expected) {
            return Err(LedgerError::InvalidMovement(format!(
                "stock record {} is not at location {}",
                record.id, expected
            )));
        }
    }

    let target = meta.location_id;
    match target {
        None if record.location_id.is_none() => {
            return Err(LedgerError::InvalidMovement(
                "stock record has no location to release".to_string(),
            ));
        }
        Some(location_id) if record.location_id == Some(location_id) => {
            return Err(LedgerError::InvalidMovement(
                "stock record is already at this location".to_string(),
            ));
        }
        Some(location_id) => {
            let snapshot = target_snapshot(locations, location_id)?;
            check_location_assignment(record, snapshot)?;
        }
        None => {}
    }

    let mut next = touched(record, ctx.now);
    next.location_id = target;

    Ok(Transition {
        movement: MovementDraft {
            movement_type: MovementType::Location,
            quantity: record.quantity_on_hand,
            side: None,
            delta_on_hand: 0,
            delta_on_shelf: 0,
            from_location_id: record.location_id,
            to_location_id: target,
            reason: normalize_text(meta.reason.clone()),
            date: meta.date.unwrap_or(ctx.now),
            performed_by: meta.performed_by.or(ctx.employee_id),
            notes: normalize_text(meta.notes.clone()),
            purchase_order_id: None,
            reversal_of: None,
        },
        record: next,
    })
}

/// Re-check the bound location after warehouse quantity grew
fn check_capacity(next: &StockRecord, current: Option<&LocationSnapshot>) -> LedgerResult<()> {
    let Some(location_id) = next.location_id else {
        return Ok(());
    };
    let snapshot = current
        .filter(|s| s.location.id == location_id)
        .ok_or_else(|| {
            LedgerError::InvalidMovement(format!(
                "location {} of stock record {} was not loaded",
                location_id, next.id
            ))
        })?;

    let location = &snapshot.location;
    if !location.is_active {
        return Err(LedgerError::LocationInactive {
            location_id: location.id,
            name: location.name.clone(),
        });
    }
    let occupied = snapshot.occupied_by_others(next.id);
    if occupied + next.quantity_on_hand > location.max_capacity {
        return Err(LedgerError::LocationCapacityExceeded {
            location_id: location.id,
            name: location.name.clone(),
            max_capacity: location.max_capacity,
            occupied,
            requested: next.quantity_on_hand,
        });
    }
    Ok(())
}

fn target_snapshot(locations: &LocationContext, location_id: Uuid) -> LedgerResult<&LocationSnapshot> {
    locations
        .target
        .as_ref()
        .filter(|s| s.location.id == location_id)
        .ok_or_else(|| {
            LedgerError::InvalidMovement(format!("location {} was not loaded", location_id))
        })
}

fn touched(record: &StockRecord, now: DateTime<Utc>) -> StockRecord {
    let mut next = record.clone();
    next.version += 1;
    next.updated_at = now;
    next
}

fn required_side(movement_type: MovementType, meta: &MovementMeta) -> LedgerResult<StockSide> {
    meta.side.ok_or_else(|| {
        LedgerError::InvalidMovement(format!(
            "{} movements must name the side they act on (on_hand or on_shelf)",
            movement_type
        ))
    })
}

fn positive_quantity(movement_type: MovementType, quantity: i64) -> LedgerResult<i64> {
    if quantity > 0 {
        Ok(quantity)
    } else {
        Err(LedgerError::InvalidQuantity {
            operation: movement_type.to_string(),
            quantity,
            message: "quantity must be positive".to_string(),
        })
    }
}

fn nonzero_quantity(movement_type: MovementType, quantity: i64) -> LedgerResult<i64> {
    if quantity != 0 {
        Ok(quantity)
    } else {
        Err(LedgerError::InvalidQuantity {
            operation: movement_type.to_string(),
            quantity,
            message: "quantity must be non-zero".to_string(),
        })
    }
}

fn side_delta(side: StockSide, delta: i64) -> (i64, i64) {
    match side {
        StockSide::OnHand => (delta, 0),
        StockSide::OnShelf => (0, delta),
    }
}

fn checked_add(current: i64, delta: i64) -> LedgerResult<i64> {
    current
        .checked_add(delta)
        .ok_or_else(|| LedgerError::InvalidQuantity {
            operation: "apply".to_string(),
            quantity: delta,
            message: "quantity overflow".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use proptest::prelude::*;

    fn ctx() -> ActingContext {
        ActingContext::new(Some(Uuid::new_v4()), Utc::now())
    }

    fn record(hand: i64, shelf: i64) -> StockRecord {
        StockRecord {
            quantity_on_hand: hand,
            quantity_on_shelf: shelf,
            ..StockRecord::new(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
        }
    }

    fn location(capacity: i64) -> Location {
        Location {
            id: Uuid::new_v4(),
            name: "A-07".to_string(),
            location_code: "WH-A-07".to_string(),
            max_capacity: capacity,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn intent(record: &StockRecord, movement_type: MovementType, quantity: i64) -> MovementIntent {
        MovementIntent {
            stock_record_id: record.id,
            movement_type,
            quantity,
            meta: MovementMeta::default(),
        }
    }

    fn with_side(mut intent: MovementIntent, side: StockSide) -> MovementIntent {
        intent.meta.side = Some(side);
        intent
    }

    fn plan(record: &StockRecord, intent: &MovementIntent) -> LedgerResult<Transition> {
        plan_movement(record, &LocationContext::default(), intent, &ctx())
    }

    fn commit(transition: &Transition, record: &StockRecord, number: i64) -> Movement {
        transition.movement.clone().into_movement(
            Uuid::new_v4(),
            number,
            record.id,
            record.batch_id,
            Utc::now(),
        )
    }

    #[test]
    fn test_in_adds_to_warehouse() {
        let rec = record(0, 0);
        let t = plan(&rec, &intent(&rec, MovementType::In, 25)).unwrap();
        assert_eq!(t.record.quantity_on_hand, 25);
        assert_eq!(t.record.version, 1);
        assert_eq!(t.movement.delta_on_hand, 25);
    }

    #[test]
    fn test_in_rejects_non_positive() {
        let rec = record(0, 0);
        for q in [0, -3] {
            let err = plan(&rec, &intent(&rec, MovementType::In, q)).unwrap_err();
            assert_eq!(err.code(), "INVALID_QUANTITY");
        }
    }

    #[test]
    fn test_transfer_scenario() {
        let rec = record(100, 0);
        let t = plan(&rec, &intent(&rec, MovementType::Transfer, 30)).unwrap();
        assert_eq!((t.record.quantity_on_hand, t.record.quantity_on_shelf), (70, 30));

        let err = plan(&t.record, &intent(&t.record, MovementType::Transfer, 100)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                bucket: "on_hand",
                current: 70,
                requested: 100
            }
        );
    }

    #[test]
    fn test_transfer_back_to_warehouse() {
        let rec = record(0, 12);
        let t = plan(&rec, &intent(&rec, MovementType::Transfer, -12)).unwrap();
        assert_eq!((t.record.quantity_on_hand, t.record.quantity_on_shelf), (12, 0));

        let err = plan(&rec, &intent(&rec, MovementType::Transfer, -13)).unwrap_err();
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    }

    #[test]
    fn test_adjustment_requires_reason() {
        let rec = record(10, 3);
        let err = plan(&rec, &with_side(intent(&rec, MovementType::Adjustment, -1), StockSide::OnShelf))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::MissingReason {
                movement_type: MovementType::Adjustment
            }
        );
    }

    #[test]
    fn test_adjustment_below_zero_is_rejected() {
        let rec = record(10, 3);
        let mut i = with_side(intent(&rec, MovementType::Adjustment, -5), StockSide::OnShelf);
        i.meta.reason = Some("damaged".to_string());
        let err = plan(&rec, &i).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                bucket: "on_shelf",
                current: 3,
                requested: 5
            }
        );
    }

    #[test]
    fn test_out_requires_explicit_side() {
        let rec = record(10, 10);
        let err = plan(&rec, &intent(&rec, MovementType::Out, 1)).unwrap_err();
        assert_eq!(err.code(), "INVALID_MOVEMENT");

        let t = plan(&rec, &with_side(intent(&rec, MovementType::Out, 4), StockSide::OnShelf)).unwrap();
        assert_eq!(t.record.quantity_on_shelf, 6);
        assert_eq!(t.movement.delta_on_shelf, -4);
    }

    #[test]
    fn test_out_respects_reservations() {
        let mut rec = record(5, 5);
        rec.quantity_reserved = 8;
        let err = plan(&rec, &with_side(intent(&rec, MovementType::Out, 3), StockSide::OnHand)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                bucket: "available",
                current: 2,
                requested: 3
            }
        );
        assert!(plan(&rec, &with_side(intent(&rec, MovementType::Out, 2), StockSide::OnHand)).is_ok());
    }

    #[test]
    fn test_audit_from_physical_count() {
        let rec = record(40, 0);
        let mut i = with_side(intent(&rec, MovementType::Audit, 0), StockSide::OnHand);
        i.meta.counted = Some(37);
        let t = plan(&rec, &i).unwrap();
        assert_eq!(t.movement.quantity, -3);
        assert_eq!(t.record.quantity_on_hand, 37);

        i.meta.counted = Some(40);
        assert_eq!(plan(&rec, &i).unwrap_err().code(), "INVALID_QUANTITY");
    }

    #[test]
    fn test_purchase_order_only_on_in() {
        let rec = record(10, 0);
        let mut i = intent(&rec, MovementType::Transfer, 1);
        i.meta.purchase_order_id = Some(Uuid::new_v4());
        assert_eq!(plan(&rec, &i).unwrap_err().code(), "INVALID_MOVEMENT");
    }

    #[test]
    fn test_in_rechecks_location_capacity() {
        let loc = location(50);
        let mut rec = record(40, 0);
        rec.location_id = Some(loc.id);
        let locations = LocationContext {
            current: Some(LocationSnapshot::new(loc.clone(), vec![(rec.id, 40)])),
            target: None,
        };

        let err = plan_movement(&rec, &locations, &intent(&rec, MovementType::In, 11), &ctx()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::LocationCapacityExceeded {
                location_id: loc.id,
                name: "A-07".to_string(),
                max_capacity: 50,
                occupied: 0,
                requested: 51
            }
        );
        assert!(plan_movement(&rec, &locations, &intent(&rec, MovementType::In, 10), &ctx()).is_ok());
    }

    #[test]
    fn test_shelf_quantity_does_not_count_against_capacity() {
        let loc = location(10);
        let mut rec = record(10, 0);
        rec.location_id = Some(loc.id);
        let locations = LocationContext {
            current: Some(LocationSnapshot::new(loc, vec![(rec.id, 10)])),
            target: None,
        };
        let mut i = with_side(intent(&rec, MovementType::Adjustment, 500), StockSide::OnShelf);
        i.meta.reason = Some("found on floor".to_string());
        assert!(plan_movement(&rec, &locations, &i, &ctx()).is_ok());
    }

    #[test]
    fn test_location_assignment_rules() {
        let loc = location(50);
        let first = record(40, 0);
        let second = record(20, 0);

        let empty = LocationSnapshot::new(loc.clone(), vec![]);
        assert!(check_location_assignment(&first, &empty).is_ok());

        let occupied = LocationSnapshot::new(loc.clone(), vec![(first.id, 40)]);
        assert_eq!(
            check_location_assignment(&second, &occupied).unwrap_err().code(),
            "LOCATION_OCCUPIED"
        );

        let mut inactive = loc.clone();
        inactive.is_active = false;
        assert_eq!(
            check_location_assignment(&first, &LocationSnapshot::new(inactive, vec![]))
                .unwrap_err()
                .code(),
            "LOCATION_INACTIVE"
        );

        let big = record(51, 0);
        assert_eq!(
            check_location_assignment(&big, &empty).unwrap_err().code(),
            "LOCATION_CAPACITY_EXCEEDED"
        );
    }

    #[test]
    fn test_relocation_to_same_location_is_invalid() {
        let loc = location(50);
        let mut rec = record(5, 0);
        rec.location_id = Some(loc.id);
        let mut i = intent(&rec, MovementType::Location, 0);
        i.meta.location_id = Some(loc.id);
        let locations = LocationContext {
            current: Some(LocationSnapshot::new(loc.clone(), vec![(rec.id, 5)])),
            target: Some(LocationSnapshot::new(loc, vec![(rec.id, 5)])),
        };
        assert_eq!(
            plan_movement(&rec, &locations, &i, &ctx()).unwrap_err().code(),
            "INVALID_MOVEMENT"
        );
    }

    #[test]
    fn test_relocation_records_from_and_to() {
        let from = location(50);
        let to = location(50);
        let mut rec = record(5, 0);
        rec.location_id = Some(from.id);

        let mut i = intent(&rec, MovementType::Location, 0);
        i.meta.location_id = Some(to.id);
        i.meta.expected_location_id = Some(from.id);
        let locations = LocationContext {
            current: Some(LocationSnapshot::new(from.clone(), vec![(rec.id, 5)])),
            target: Some(LocationSnapshot::new(to.clone(), vec![])),
        };
        let t = plan_movement(&rec, &locations, &i, &ctx()).unwrap();
        assert_eq!(t.record.location_id, Some(to.id));
        assert_eq!(t.movement.from_location_id, Some(from.id));
        assert_eq!(t.movement.to_location_id, Some(to.id));
        assert_eq!(t.movement.quantity, 5);

        i.meta.expected_location_id = Some(Uuid::new_v4());
        assert_eq!(
            plan_movement(&rec, &locations, &i, &ctx()).unwrap_err().code(),
            "INVALID_MOVEMENT"
        );
    }

    #[test]
    fn test_release_without_location_is_invalid() {
        let rec = record(5, 0);
        let i = intent(&rec, MovementType::Location, 0);
        assert_eq!(plan(&rec, &i).unwrap_err().code(), "INVALID_MOVEMENT");
    }

    #[test]
    fn test_reversal_restores_state_and_is_not_repeatable() {
        let rec = record(100, 0);
        let t = plan(&rec, &intent(&rec, MovementType::Transfer, 30)).unwrap();
        let mut original = commit(&t, &rec, 1);

        let r = plan_reversal(&original, &t.record, &LocationContext::default(), &ctx()).unwrap();
        assert_eq!(r.record.quantity_on_hand, rec.quantity_on_hand);
        assert_eq!(r.record.quantity_on_shelf, rec.quantity_on_shelf);
        assert_eq!(r.movement.reversal_of, Some(original.id));
        assert_eq!(r.movement.quantity, -30);

        original.reversed_by = Some(Uuid::new_v4());
        let err = plan_reversal(&original, &r.record, &LocationContext::default(), &ctx()).unwrap_err();
        assert_eq!(err.code(), "ALREADY_REVERSED");

        let compensating = commit(&r, &t.record, 2);
        let err = plan_reversal(&compensating, &r.record, &LocationContext::default(), &ctx()).unwrap_err();
        assert_eq!(err.code(), "INVALID_MOVEMENT");
    }

    #[test]
    fn test_reversal_of_in_fails_when_stock_is_gone() {
        let rec = record(0, 0);
        let t = plan(&rec, &intent(&rec, MovementType::In, 10)).unwrap();
        let original = commit(&t, &rec, 1);
        let drained = plan(&t.record, &with_side(intent(&t.record, MovementType::Out, 8), StockSide::OnHand))
            .unwrap()
            .record;

        let err = plan_reversal(&original, &drained, &LocationContext::default(), &ctx()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStock {
                bucket: "on_hand",
                current: 2,
                requested: 10
            }
        );
    }

    #[test]
    fn test_reservations() {
        let rec = record(6, 4);
        let reserved = plan_reservation(&rec, 10, Utc::now()).unwrap();
        assert_eq!(reserved.quantity_available(), 0);
        assert_eq!(plan_reservation(&reserved, 1, Utc::now()).unwrap_err().code(), "INSUFFICIENT_STOCK");
        assert_eq!(plan_reservation(&reserved, -11, Utc::now()).unwrap_err().code(), "INVALID_QUANTITY");
        assert_eq!(plan_reservation(&reserved, -10, Utc::now()).unwrap().quantity_reserved, 0);
        assert_eq!(plan_reservation(&rec, 0, Utc::now()).unwrap_err().code(), "INVALID_QUANTITY");
    }

    #[test]
    fn test_metadata_update_keeps_adjustment_reason() {
        let rec = record(10, 0);
        let mut i = with_side(intent(&rec, MovementType::Adjustment, 2), StockSide::OnHand);
        i.meta.reason = Some("recount".to_string());
        let t = plan(&rec, &i).unwrap();
        let movement = commit(&t, &rec, 1);

        let cleared = MovementMetadataUpdate {
            reason: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            apply_metadata_update(&movement, &cleared).unwrap_err().code(),
            "MISSING_REASON"
        );

        let edited = MovementMetadataUpdate {
            notes: Some("pallet 4".to_string()),
            ..Default::default()
        };
        let updated = apply_metadata_update(&movement, &edited).unwrap();
        assert_eq!(updated.notes.as_deref(), Some("pallet 4"));
        assert_eq!(updated.delta_on_hand, movement.delta_on_hand);
    }

    #[test]
    fn test_check_deletable() {
        assert!(check_deletable(&record(0, 0)).is_ok());
        assert_eq!(check_deletable(&record(0, 1)).unwrap_err().code(), "STOCK_NOT_EMPTY");
    }

    #[test]
    fn test_error_context_carries_quantities() {
        let err = LedgerError::InsufficientStock {
            bucket: "on_hand",
            current: 70,
            requested: 100,
        };
        let context = err.context().unwrap();
        assert_eq!(context["current"], 70);
        assert_eq!(context["requested"], 100);
    }

    fn batch_of(rec: &StockRecord, status: BatchStatus, expiry_date: Option<NaiveDate>) -> Batch {
        Batch {
            id: rec.batch_id,
            batch_code: "B-2024-0042".to_string(),
            product_id: Uuid::new_v4(),
            product_name: None,
            expiry_date,
            quantity: 0,
            status,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_depleted_batch_takes_no_stock() {
        let today = Utc::now().date_naive();
        let rec = record(0, 0);
        let depleted = batch_of(&rec, BatchStatus::Depleted, None);

        let receive = plan(&rec, &intent(&rec, MovementType::In, 5)).unwrap();
        let err = check_batch(&depleted, &receive, today).unwrap_err();
        assert_eq!(err.code(), "BATCH_CLOSED");
        assert_eq!(err.context().unwrap()["status"], "depleted");

        let active = batch_of(&rec, BatchStatus::Active, None);
        assert!(check_batch(&active, &receive, today).is_ok());

        // Decreases are still planned against a depleted batch
        let stocked = record(5, 0);
        let out = plan(&stocked, &with_side(intent(&stocked, MovementType::Out, 5), StockSide::OnHand)).unwrap();
        assert!(check_batch(&batch_of(&stocked, BatchStatus::Depleted, None), &out, today).is_ok());
    }

    #[test]
    fn test_expired_stock_is_not_transferred() {
        let today = Utc::now().date_naive();
        let rec = record(10, 0);
        let expired = batch_of(&rec, BatchStatus::Active, Some(today));

        let transfer = plan(&rec, &intent(&rec, MovementType::Transfer, 4)).unwrap();
        assert_eq!(
            check_batch(&expired, &transfer, today).unwrap_err().code(),
            "EXPIRED_BATCH"
        );

        let out = plan(&rec, &with_side(intent(&rec, MovementType::Out, 4), StockSide::OnHand)).unwrap();
        assert!(check_batch(&expired, &out, today).is_ok());

        // Undoing an earlier transfer is allowed once the batch has expired
        let original = commit(&transfer, &rec, 1);
        let reversal =
            plan_reversal(&original, &transfer.record, &LocationContext::default(), &ctx()).unwrap();
        assert!(check_batch(&expired, &reversal, today).is_ok());
    }

    fn op_strategy() -> impl Strategy<Value = (MovementType, StockSide, i64)> {
        (
            prop_oneof![
                Just(MovementType::In),
                Just(MovementType::Out),
                Just(MovementType::Adjustment),
                Just(MovementType::Transfer),
                Just(MovementType::Audit),
            ],
            prop_oneof![Just(StockSide::OnHand), Just(StockSide::OnShelf)],
            -60i64..=60,
        )
    }

    fn op_intent(rec: &StockRecord, op: (MovementType, StockSide, i64)) -> MovementIntent {
        let (movement_type, side, quantity) = op;
        let mut i = intent(rec, movement_type, quantity);
        i.meta.side = Some(side).filter(|_| movement_type.requires_side());
        i.meta.reason = Some("cycle count".to_string());
        i
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Quantity conservation, non-negativity and the reservation bound
        /// hold for any sequence of movements.
        #[test]
        fn prop_sequences_conserve_quantity(
            reserved in 0i64..20,
            ops in prop::collection::vec(op_strategy(), 1..40)
        ) {
            let mut rec = record(20, 0);
            rec.quantity_reserved = reserved;
            let mut expected_total = rec.total();

            for op in ops {
                let before = rec.clone();
                match plan(&rec, &op_intent(&rec, op)) {
                    Ok(t) => {
                        let effect = t.movement.delta_on_hand + t.movement.delta_on_shelf;
                        if t.movement.movement_type == MovementType::Out {
                            prop_assert_eq!(effect, -t.movement.quantity);
                        }
                        expected_total += effect;
                        rec = t.record;
                    }
                    Err(_) => prop_assert_eq!(&rec, &before),
                }
                prop_assert!(rec.quantities_valid());
                prop_assert_eq!(rec.total(), expected_total);
            }
        }

        /// Reversing a successful movement restores the prior quantities
        #[test]
        fn prop_reversal_restores_previous_state(
            hand in 0i64..100,
            shelf in 0i64..100,
            op in op_strategy()
        ) {
            let rec = record(hand, shelf);
            if let Ok(t) = plan(&rec, &op_intent(&rec, op)) {
                let original = commit(&t, &rec, 1);
                let r = plan_reversal(&original, &t.record, &LocationContext::default(), &ctx()).unwrap();
                prop_assert_eq!(r.record.quantity_on_hand, rec.quantity_on_hand);
                prop_assert_eq!(r.record.quantity_on_shelf, rec.quantity_on_shelf);
                prop_assert_eq!(r.record.quantity_reserved, rec.quantity_reserved);
            }
        }
    }
}
