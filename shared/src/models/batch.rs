//! Batch models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Days before expiry at which a batch is flagged as expiring soon
pub const EXPIRING_SOON_DAYS: i64 = 30;

/// A received lot of a product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Batch {
    pub id: Uuid,
    /// Human-readable unique code (e.g., "B-2024-0042")
    pub batch_code: String,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    /// Originally received amount; informational only
    pub quantity: i64,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    /// A batch whose expiry date is today or earlier is expired
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        matches!(self.expiry_date, Some(expiry) if expiry <= today)
    }

    pub fn days_to_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.expiry_date.map(|expiry| (expiry - today).num_days())
    }

    /// Advisory flag: `0 < expiry - today <= window_days`
    pub fn is_expiring_soon(&self, today: NaiveDate, window_days: i64) -> bool {
        matches!(self.days_to_expiry(today), Some(days) if days > 0 && days <= window_days)
    }
}

/// Lifecycle status of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Active,
    Inactive,
    /// Terminal: every stock record of the batch has been emptied
    Depleted,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Inactive => "inactive",
            BatchStatus::Depleted => "depleted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Depleted)
    }

    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        match (self, next) {
            (BatchStatus::Depleted, _) => false,
            (current, next) => *current != next,
        }
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BatchStatus::Active),
            "inactive" => Ok(BatchStatus::Inactive),
            "depleted" => Ok(BatchStatus::Depleted),
            other => Err(format!("unknown batch status '{}'", other)),
        }
    }
}

/// Input for registering a received batch
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateBatchInput {
    #[validate(length(min = 1, max = 64))]
    pub batch_code: String,
    pub product_id: Uuid,
    #[validate(length(max = 255))]
    pub product_name: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    #[validate(range(min = 0))]
    pub quantity: i64,
    /// Create the empty stock record alongside the batch (default true)
    pub create_stock_record: Option<bool>,
}

/// Input for changing a batch status
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBatchStatusInput {
    pub status: BatchStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(expiry: Option<NaiveDate>) -> Batch {
        Batch {
            id: Uuid::new_v4(),
            batch_code: "B-1".to_string(),
            product_id: Uuid::new_v4(),
            product_name: None,
            expiry_date: expiry,
            quantity: 10,
            status: BatchStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_expiry_boundaries() {
        let today = date(2024, 6, 1);
        assert!(batch(Some(date(2024, 6, 1))).is_expired(today));
        assert!(batch(Some(date(2024, 5, 31))).is_expired(today));
        assert!(!batch(Some(date(2024, 6, 2))).is_expired(today));
        assert!(!batch(None).is_expired(today));
    }

    #[test]
    fn test_expiring_soon_window() {
        let today = date(2024, 6, 1);
        assert!(batch(Some(date(2024, 6, 2))).is_expiring_soon(today, EXPIRING_SOON_DAYS));
        assert!(batch(Some(date(2024, 7, 1))).is_expiring_soon(today, EXPIRING_SOON_DAYS));
        assert!(!batch(Some(date(2024, 7, 2))).is_expiring_soon(today, EXPIRING_SOON_DAYS));
        assert!(!batch(Some(today)).is_expiring_soon(today, EXPIRING_SOON_DAYS));
        assert!(!batch(None).is_expiring_soon(today, EXPIRING_SOON_DAYS));
    }

    #[test]
    fn test_status_transitions() {
        assert!(BatchStatus::Active.can_transition_to(BatchStatus::Inactive));
        assert!(BatchStatus::Inactive.can_transition_to(BatchStatus::Active));
        assert!(BatchStatus::Active.can_transition_to(BatchStatus::Depleted));
        assert!(!BatchStatus::Depleted.can_transition_to(BatchStatus::Active));
        assert!(!BatchStatus::Active.can_transition_to(BatchStatus::Active));
    }
}
