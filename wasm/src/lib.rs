//! WebAssembly module for the Stock Ledger
//!
//! Provides client-side computation for:
//! - Movement previews (same rules the server enforces)
//! - Available quantity
//! - Bulk transfer eligibility and allocation previews
//! - Offline field validation

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::planner::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{ActingContext, LedgerError, LocationContext};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("stock ledger wasm loaded"));
}

fn now_from_js() -> DateTime<Utc> {
    let iso: String = js_sys::Date::new_0().to_iso_string().into();
    DateTime::parse_from_rfc3339(&iso)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn ledger_error_json(err: &LedgerError) -> String {
    json!({
        "code": err.code(),
        "message": err.to_string(),
        "context": err.context(),
    })
    .to_string()
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}': {}", value, e))
}

/// Apply a movement to a stock record locally and return the next record.
///
/// Location occupancy is only known to the server, so capacity and
/// exclusivity are not checked here; a `location` intent is rejected.
fn preview_movement_at(
    record_json: &str,
    intent_json: &str,
    now: DateTime<Utc>,
) -> Result<String, String> {
    let mut record: StockRecord = serde_json::from_str(record_json)
        .map_err(|e| format!("Invalid stock record JSON: {}", e))?;
    let intent: MovementIntent = serde_json::from_str(intent_json)
        .map_err(|e| format!("Invalid movement JSON: {}", e))?;

    if intent.movement_type == MovementType::Location {
        return Err(json!({
            "code": "INVALID_MOVEMENT",
            "message": "location changes can only be previewed by the server",
        })
        .to_string());
    }
    record.location_id = None;

    let ctx = ActingContext::new(None, now);
    let transition = shared::plan_movement(&record, &LocationContext::default(), &intent, &ctx)
        .map_err(|e| ledger_error_json(&e))?;

    serde_json::to_string(&transition.record.view()).map_err(|e| e.to_string())
}

/// Preview a movement; throws a JSON `{code, message, context}` on rejection
#[wasm_bindgen]
pub fn preview_movement(record_json: &str, intent_json: &str) -> Result<String, JsValue> {
    preview_movement_at(record_json, intent_json, now_from_js()).map_err(|e| JsValue::from_str(&e))
}

/// On-hand plus on-shelf minus reserved, never negative
#[wasm_bindgen]
pub fn quantity_available(on_hand: i32, on_shelf: i32, reserved: i32) -> i32 {
    (on_hand + on_shelf - reserved).max(0)
}

fn select_batches_json(
    candidates_json: &str,
    direction: &str,
    today: &str,
    expiring_soon_days: i32,
) -> Result<String, String> {
    let candidates: Vec<TransferCandidate> = serde_json::from_str(candidates_json)
        .map_err(|e| format!("Invalid candidates JSON: {}", e))?;
    let direction: TransferDirection = serde_json::from_value(json!(direction))
        .map_err(|_| format!("Unknown transfer direction '{}'", direction))?;

    let report = select_eligible_batches(
        &candidates,
        direction,
        parse_date(today)?,
        i64::from(expiring_soon_days),
    );
    serde_json::to_string(&report).map_err(|e| e.to_string())
}

/// Split `[{record, batch}]` candidates into eligible and excluded entries
#[wasm_bindgen]
pub fn select_transfer_batches(
    candidates_json: &str,
    direction: &str,
    today: &str,
    expiring_soon_days: i32,
) -> Result<String, JsValue> {
    select_batches_json(candidates_json, direction, today, expiring_soon_days)
        .map_err(|e| JsValue::from_str(&e))
}

fn allocate_json(eligible_json: &str, requested_total: i32) -> Result<String, String> {
    let eligible: Vec<EligibleBatch> = serde_json::from_str(eligible_json)
        .map_err(|e| format!("Invalid eligible batches JSON: {}", e))?;
    let plan = allocate_transfer(&eligible, i64::from(requested_total));
    serde_json::to_string(&plan).map_err(|e| e.to_string())
}

/// First-expiry-first-out allocation of `requested_total`
#[wasm_bindgen]
pub fn allocate_transfer_preview(eligible_json: &str, requested_total: i32) -> Result<String, JsValue> {
    allocate_json(eligible_json, requested_total).map_err(|e| JsValue::from_str(&e))
}

/// Whether `name` follows the `<block>-<position>` format
#[wasm_bindgen]
pub fn is_valid_location_name(name: &str) -> bool {
    parse_location_name(name).is_ok()
}

#[wasm_bindgen]
pub fn is_valid_batch_code(code: &str) -> bool {
    validate_batch_code(code).is_ok()
}

/// Days until expiry; negative once expired. `None` for unparsable dates.
#[wasm_bindgen]
pub fn days_until_expiry(expiry_date: &str, today: &str) -> Option<i32> {
    let expiry = parse_date(expiry_date).ok()?;
    let today = parse_date(today).ok()?;
    i32::try_from((expiry - today).num_days()).ok()
}
