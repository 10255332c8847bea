//! Stock record models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the two physical quantity buckets of a stock record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockSide {
    /// Warehouse quantity
    #[serde(alias = "onHand")]
    OnHand,
    /// Sales floor quantity
    #[serde(alias = "onShelf")]
    OnShelf,
}

impl StockSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockSide::OnHand => "on_hand",
            StockSide::OnShelf => "on_shelf",
        }
    }
}

impl std::fmt::Display for StockSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StockSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_hand" => Ok(StockSide::OnHand),
            "on_shelf" => Ok(StockSide::OnShelf),
            other => Err(format!("unknown stock side '{}'", other)),
        }
    }
}

/// Mutable quantity state for one batch.
///
/// Quantities are only ever changed by the ledger; see [`crate::ledger`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockRecord {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub quantity_on_hand: i64,
    pub quantity_on_shelf: i64,
    pub quantity_reserved: i64,
    pub location_id: Option<Uuid>,
    /// Incremented on every mutation
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// Empty record for a batch
    pub fn new(id: Uuid, batch_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            batch_id,
            quantity_on_hand: 0,
            quantity_on_shelf: 0,
            quantity_reserved: 0,
            location_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total(&self) -> i64 {
        self.quantity_on_hand + self.quantity_on_shelf
    }

    /// `max(0, on_hand + on_shelf - reserved)`
    pub fn quantity_available(&self) -> i64 {
        (self.total() - self.quantity_reserved).max(0)
    }

    pub fn quantity_at(&self, side: StockSide) -> i64 {
        match side {
            StockSide::OnHand => self.quantity_on_hand,
            StockSide::OnShelf => self.quantity_on_shelf,
        }
    }

    /// No quantity anywhere and no open reservation
    pub fn is_empty(&self) -> bool {
        self.quantity_on_hand == 0 && self.quantity_on_shelf == 0 && self.quantity_reserved == 0
    }

    /// Quantity invariants that hold independently of any location
    pub fn quantities_valid(&self) -> bool {
        self.quantity_on_hand >= 0
            && self.quantity_on_shelf >= 0
            && self.quantity_reserved >= 0
            && self.quantity_reserved <= self.total()
    }

    pub fn view(self) -> StockRecordView {
        let quantity_available = self.quantity_available();
        StockRecordView {
            record: self,
            quantity_available,
        }
    }
}

/// Stock record as returned to callers, with the derived available quantity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockRecordView {
    #[serde(flatten)]
    pub record: StockRecord,
    pub quantity_available: i64,
}

impl From<StockRecord> for StockRecordView {
    fn from(record: StockRecord) -> Self {
        record.view()
    }
}

/// Input for creating a stock record for an existing batch
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateStockRecordInput {
    pub batch_id: Uuid,
}

/// Input for reserving or releasing reserved quantity
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReservationInput {
    pub quantity: i64,
}

/// Filter for enumerating stock records
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StockRecordFilter {
    pub batch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    /// Only records holding any quantity
    pub in_stock: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hand: i64, shelf: i64, reserved: i64) -> StockRecord {
        StockRecord {
            quantity_on_hand: hand,
            quantity_on_shelf: shelf,
            quantity_reserved: reserved,
            ..StockRecord::new(Uuid::new_v4(), Uuid::new_v4(), Utc::now())
        }
    }

    #[test]
    fn test_available_is_clamped() {
        assert_eq!(record(10, 5, 3).quantity_available(), 12);
        assert_eq!(record(0, 0, 0).quantity_available(), 0);
        // unreachable through the ledger, but the derivation still clamps
        assert_eq!(record(1, 0, 5).quantity_available(), 0);
    }

    #[test]
    fn test_quantities_valid() {
        assert!(record(10, 5, 15).quantities_valid());
        assert!(!record(10, 5, 16).quantities_valid());
        assert!(!record(-1, 5, 0).quantities_valid());
    }

    #[test]
    fn test_view_serializes_available() {
        let json = serde_json::to_value(record(7, 3, 2).view()).unwrap();
        assert_eq!(json["quantity_available"], 8);
        assert_eq!(json["quantity_on_hand"], 7);
    }

    #[test]
    fn test_side_accepts_camel_case_alias() {
        let side: StockSide = serde_json::from_str("\"onShelf\"").unwrap();
        assert_eq!(side, StockSide::OnShelf);
        assert_eq!(serde_json::to_string(&StockSide::OnHand).unwrap(), "\"on_hand\"");
    }
}
