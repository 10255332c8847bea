//! Movement models
//!
//! A movement is the immutable, typed record of one change to a stock
//! record. Applying a movement is the only way quantities change.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StockSide;

/// Kind of stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Receipt into the warehouse
    In,
    /// Release, sale or consumption from one side
    Out,
    /// Signed correction of one side; requires a reason
    Adjustment,
    /// Warehouse <-> shelf
    Transfer,
    /// Location reassignment, no quantity change
    Location,
    /// Reconciliation against a physical count
    Audit,
}

impl MovementType {
    pub const ALL: [MovementType; 6] = [
        MovementType::In,
        MovementType::Out,
        MovementType::Adjustment,
        MovementType::Transfer,
        MovementType::Location,
        MovementType::Audit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjustment => "adjustment",
            MovementType::Transfer => "transfer",
            MovementType::Location => "location",
            MovementType::Audit => "audit",
        }
    }

    pub fn requires_reason(&self) -> bool {
        matches!(self, MovementType::Adjustment)
    }

    /// Types that act on a single side named by the caller
    pub fn requires_side(&self) -> bool {
        matches!(
            self,
            MovementType::Out | MovementType::Adjustment | MovementType::Audit
        )
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown movement type '{}'", s))
    }
}

/// A recorded movement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movement {
    pub id: Uuid,
    /// Global, strictly increasing, gap-free audit reference
    pub movement_number: i64,
    pub movement_type: MovementType,
    pub stock_record_id: Uuid,
    pub batch_id: Uuid,
    /// Signed quantity as submitted; for location movements, the
    /// warehouse quantity carried along
    pub quantity: i64,
    pub side: Option<StockSide>,
    pub delta_on_hand: i64,
    pub delta_on_shelf: i64,
    pub from_location_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    pub reason: Option<String>,
    pub date: DateTime<Utc>,
    pub performed_by: Option<Uuid>,
    pub notes: Option<String>,
    pub purchase_order_id: Option<Uuid>,
    /// Set on compensating movements
    pub reversal_of: Option<Uuid>,
    /// Set on the original once it has been reversed
    pub reversed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    pub fn is_reversed(&self) -> bool {
        self.reversed_by.is_some()
    }

    pub fn is_compensating(&self) -> bool {
        self.reversal_of.is_some()
    }
}

/// Caller-supplied metadata for a movement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementMeta {
    /// Side acted on by out / adjustment / audit
    pub side: Option<StockSide>,
    /// Target of a location movement; `None` releases
    pub location_id: Option<Uuid>,
    /// For location movements: fail unless the record is currently here
    pub expected_location_id: Option<Uuid>,
    /// For audits: physical count; the discrepancy becomes the quantity
    pub counted: Option<i64>,
    pub reason: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub performed_by: Option<Uuid>,
    pub notes: Option<String>,
    pub purchase_order_id: Option<Uuid>,
}

/// A request to apply one movement to one stock record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementIntent {
    pub stock_record_id: Uuid,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub meta: MovementMeta,
}

/// A validated movement before the store allocates its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    pub movement_type: MovementType,
    pub quantity: i64,
    pub side: Option<StockSide>,
    pub delta_on_hand: i64,
    pub delta_on_shelf: i64,
    pub from_location_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    pub reason: Option<String>,
    pub date: DateTime<Utc>,
    pub performed_by: Option<Uuid>,
    pub notes: Option<String>,
    pub purchase_order_id: Option<Uuid>,
    pub reversal_of: Option<Uuid>,
}

impl MovementDraft {
    pub fn into_movement(
        self,
        id: Uuid,
        movement_number: i64,
        stock_record_id: Uuid,
        batch_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Movement {
        Movement {
            id,
            movement_number,
            movement_type: self.movement_type,
            stock_record_id,
            batch_id,
            quantity: self.quantity,
            side: self.side,
            delta_on_hand: self.delta_on_hand,
            delta_on_shelf: self.delta_on_shelf,
            from_location_id: self.from_location_id,
            to_location_id: self.to_location_id,
            reason: self.reason,
            date: self.date,
            performed_by: self.performed_by,
            notes: self.notes,
            purchase_order_id: self.purchase_order_id,
            reversal_of: self.reversal_of,
            reversed_by: None,
            created_at,
        }
    }
}

/// Input for recording a movement over the API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordMovementInput {
    pub batch_id: Uuid,
    #[serde(alias = "inventoryDetailId", alias = "stock_record_id")]
    pub inventory_detail_id: Uuid,
    pub movement_type: MovementType,
    #[serde(default)]
    pub quantity: i64,
    pub side: Option<StockSide>,
    pub location_id: Option<Uuid>,
    pub counted: Option<i64>,
    pub reason: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub performed_by: Option<Uuid>,
    pub notes: Option<String>,
    pub purchase_order_id: Option<Uuid>,
}

impl RecordMovementInput {
    pub fn into_intent(self) -> MovementIntent {
        MovementIntent {
            stock_record_id: self.inventory_detail_id,
            movement_type: self.movement_type,
            quantity: self.quantity,
            meta: MovementMeta {
                side: self.side,
                location_id: self.location_id,
                expected_location_id: None,
                counted: self.counted,
                reason: self.reason,
                date: self.date,
                performed_by: self.performed_by,
                notes: self.notes,
                purchase_order_id: self.purchase_order_id,
            },
        }
    }
}

/// Administrative metadata edit; quantities are never editable
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MovementMetadataUpdate {
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Result of applying or reversing a movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementOutcome {
    pub movement: Movement,
    pub stock_record: super::StockRecordView,
}

/// Filter criteria for listing movements
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MovementFilter {
    pub stock_record_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    /// Inclusive, on the movement date
    pub start_date: Option<NaiveDate>,
    /// Inclusive, on the movement date
    pub end_date: Option<NaiveDate>,
    pub performed_by: Option<Uuid>,
}

impl MovementFilter {
    /// `product_id` is the product of the movement's batch, when known
    pub fn matches(&self, movement: &Movement, product_id: Option<Uuid>) -> bool {
        let day = movement.date.date_naive();
        self.stock_record_id.map_or(true, |id| movement.stock_record_id == id)
            && self.batch_id.map_or(true, |id| movement.batch_id == id)
            && self.product_id.map_or(true, |id| product_id == Some(id))
            && self.movement_type.map_or(true, |t| movement.movement_type == t)
            && self.start_date.map_or(true, |start| day >= start)
            && self.end_date.map_or(true, |end| day <= end)
            && self.performed_by.map_or(true, |id| movement.performed_by == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_type_round_trip_names() {
        for t in MovementType::ALL {
            assert_eq!(t.as_str().parse::<MovementType>().unwrap(), t);
        }
        assert!("sale".parse::<MovementType>().is_err());
    }

    #[test]
    fn test_only_adjustment_requires_reason() {
        let requiring: Vec<_> = MovementType::ALL
            .into_iter()
            .filter(|t| t.requires_reason())
            .collect();
        assert_eq!(requiring, vec![MovementType::Adjustment]);
    }

    #[test]
    fn test_record_input_accepts_inventory_detail_alias() {
        let json = serde_json::json!({
            "batch_id": Uuid::nil(),
            "inventoryDetailId": Uuid::nil(),
            "movement_type": "in",
            "quantity": 5
        });
        let input: RecordMovementInput = serde_json::from_value(json).unwrap();
        let intent = input.into_intent();
        assert_eq!(intent.movement_type, MovementType::In);
        assert_eq!(intent.quantity, 5);
    }

    #[test]
    fn test_filter_date_range_is_inclusive() {
        let date = DateTime::parse_from_rfc3339("2024-03-10T15:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let movement = MovementDraft {
            movement_type: MovementType::In,
            quantity: 1,
            side: None,
            delta_on_hand: 1,
            delta_on_shelf: 0,
            from_location_id: None,
            to_location_id: None,
            reason: None,
            date,
            performed_by: None,
            notes: None,
            purchase_order_id: None,
            reversal_of: None,
        }
        .into_movement(Uuid::new_v4(), 1, Uuid::new_v4(), Uuid::new_v4(), date);

        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let filter = MovementFilter {
            start_date: Some(day),
            end_date: Some(day),
            ..Default::default()
        };
        assert!(filter.matches(&movement, None));

        let filter = MovementFilter {
            movement_type: Some(MovementType::Out),
            ..Default::default()
        };
        assert!(!filter.matches(&movement, None));
    }
}
