//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use ledger_server::config::LedgerConfig;
use ledger_server::services::{CatalogService, LedgerService, LocationService, TransferService};
use ledger_server::{LedgerStore, MemoryStore};
use shared::{
    ActingContext, Batch, CreateBatchInput, CreateLocationInput, Location, MovementIntent,
    MovementMeta, MovementType, StockSide,
};
use uuid::Uuid;

pub struct Ledger {
    pub store: Arc<dyn LedgerStore>,
    pub catalog: CatalogService,
    pub ledger: LedgerService,
    pub locations: LocationService,
    pub transfers: TransferService,
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::new());
        Self {
            catalog: CatalogService::new(store.clone()),
            ledger: LedgerService::new(store.clone(), config.clone()),
            locations: LocationService::new(store.clone(), config.clone()),
            transfers: TransferService::new(store.clone(), config),
            store,
        }
    }

    /// Register a batch with its stock record; returns both ids
    pub async fn batch(&self, code: &str, expiry_in_days: Option<i64>) -> (Batch, Uuid) {
        let input = CreateBatchInput {
            batch_code: code.to_string(),
            product_id: Uuid::new_v4(),
            product_name: Some("Paracetamol 500mg".to_string()),
            expiry_date: expiry_in_days.map(expiry),
            quantity: 0,
            create_stock_record: None,
        };
        let created = self.catalog.create_batch(input, &ctx()).await.unwrap();
        let record_id = created.stock_record.unwrap().record.id;
        (created.batch, record_id)
    }

    /// A batch whose record already holds `on_hand` in the warehouse
    pub async fn stocked(&self, code: &str, on_hand: i64) -> Uuid {
        let (_, record_id) = self.batch(code, None).await;
        self.receive(record_id, on_hand).await;
        record_id
    }

    pub async fn receive(&self, record_id: Uuid, quantity: i64) {
        self.ledger
            .apply(intent(record_id, MovementType::In, quantity, None), &ctx())
            .await
            .unwrap();
    }

    pub async fn location(&self, name: &str, max_capacity: i64) -> Location {
        let input = CreateLocationInput {
            name: name.to_string(),
            location_code: format!("WH-{}", name),
            max_capacity,
            is_active: None,
        };
        self.locations.create(input, &ctx()).await.unwrap()
    }
}

pub fn ctx() -> ActingContext {
    ActingContext::new(Some(employee()), Utc::now())
}

pub fn employee() -> Uuid {
    Uuid::from_u128(0x0e_u128)
}

pub fn expiry(days_from_today: i64) -> NaiveDate {
    (Utc::now() + Duration::days(days_from_today)).date_naive()
}

pub fn intent(
    stock_record_id: Uuid,
    movement_type: MovementType,
    quantity: i64,
    side: Option<StockSide>,
) -> MovementIntent {
    MovementIntent {
        stock_record_id,
        movement_type,
        quantity,
        meta: MovementMeta {
            side,
            ..MovementMeta::default()
        },
    }
}
