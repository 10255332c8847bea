//! Storage location models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A fixed-capacity storage slot in the warehouse/shelf topology
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub id: Uuid,
    /// Block + position, e.g. "A-07"
    pub name: String,
    pub location_code: String,
    pub max_capacity: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Location {
    /// Block letter(s) of the location name, if it parses
    pub fn block(&self) -> Option<String> {
        crate::validation::parse_location_name(&self.name)
            .ok()
            .map(|(block, _)| block)
    }

    pub fn position(&self) -> Option<u32> {
        crate::validation::parse_location_name(&self.name)
            .ok()
            .map(|(_, position)| position)
    }
}

/// Current state of a location, recomputed from the stock records bound to it.
///
/// Occupancy is never cached: stores build a fresh snapshot inside the same
/// critical section that validates an assignment or a capacity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationSnapshot {
    pub location: Location,
    /// `(stock_record_id, quantity_on_hand)` for every record bound here
    pub occupants: Vec<(Uuid, i64)>,
}

impl LocationSnapshot {
    pub fn new(location: Location, occupants: Vec<(Uuid, i64)>) -> Self {
        Self {
            location,
            occupants,
        }
    }

    /// Occupant other than `stock_record_id`, if any
    pub fn other_occupant(&self, stock_record_id: Uuid) -> Option<Uuid> {
        self.occupants
            .iter()
            .map(|(id, _)| *id)
            .find(|id| *id != stock_record_id)
    }

    /// Warehouse quantity held here by records other than `stock_record_id`
    pub fn occupied_by_others(&self, stock_record_id: Uuid) -> i64 {
        self.occupants
            .iter()
            .filter(|(id, _)| *id != stock_record_id)
            .map(|(_, on_hand)| *on_hand)
            .sum()
    }

    pub fn occupied_quantity(&self) -> i64 {
        self.occupants.iter().map(|(_, on_hand)| *on_hand).sum()
    }

    pub fn to_occupancy(&self) -> LocationOccupancy {
        let occupied = self.occupied_quantity();
        LocationOccupancy {
            location: self.location.clone(),
            occupant: self.occupants.first().map(|(id, _)| *id),
            occupied_quantity: occupied,
            free_capacity: (self.location.max_capacity - occupied).max(0),
        }
    }
}

/// Occupancy report for a location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationOccupancy {
    pub location: Location,
    pub occupant: Option<Uuid>,
    pub occupied_quantity: i64,
    pub free_capacity: i64,
}

/// Input for creating a location
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateLocationInput {
    #[validate(length(min = 3, max = 32))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub location_code: String,
    #[validate(range(min = 0))]
    pub max_capacity: i64,
    pub is_active: Option<bool>,
}

/// Input for assigning or releasing a stock record's location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssignLocationInput {
    /// `null` releases the current location
    pub location_id: Option<Uuid>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// Input for moving a batch between two locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoveBatchInput {
    pub from_location_id: Uuid,
    pub to_location_id: Uuid,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_block_and_position() {
        let loc = location(10);
        assert_eq!(loc.block().as_deref(), Some("A"));
        assert_eq!(loc.position(), Some(7));
    }

    #[test]
    fn test_occupancy_is_recomputed_from_occupants() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let snapshot = LocationSnapshot::new(location(50), vec![(me, 10), (other, 25)]);

        assert_eq!(snapshot.occupied_quantity(), 35);
        assert_eq!(snapshot.occupied_by_others(me), 25);
        assert_eq!(snapshot.other_occupant(me), Some(other));

        let occupancy = snapshot.to_occupancy();
        assert_eq!(occupancy.free_capacity, 15);
    }

    #[test]
    fn test_empty_snapshot_has_no_occupant() {
        let snapshot = LocationSnapshot::new(location(5), vec![]);
        assert_eq!(snapshot.other_occupant(Uuid::new_v4()), None);
        assert_eq!(snapshot.to_occupancy().free_capacity, 5);
    }
}
