//! PostgreSQL ledger store
//!
//! Each mutation runs in one transaction. Locks are always taken in the same
//! order: the stock record row, then the location rows it touches (sorted by
//! id), then the movement counter. That keeps concurrent movements on
//! different records from deadlocking while serializing any two that compete
//! for the same record or location.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    ActingContext, Batch, BatchStatus, Location, LocationContext, LocationSnapshot, Movement,
    MovementFilter, MovementIntent, MovementMetadataUpdate, MovementOutcome, MovementType,
    Pagination, SortOrder, StockRecord, StockRecordFilter, StockSide, Transition,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{validate_status_change, LedgerStore};
use crate::error::{map_unique_violation, AppError, AppResult};

/// Ledger store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    batch_code: String,
    product_id: Uuid,
    product_name: Option<String>,
    expiry_date: Option<NaiveDate>,
    quantity: i64,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for Batch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> AppResult<Self> {
        Ok(Batch {
            id: row.id,
            batch_code: row.batch_code,
            product_id: row.product_id,
            product_name: row.product_name,
            expiry_date: row.expiry_date,
            quantity: row.quantity,
            status: row.status.parse().map_err(AppError::Internal)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LocationRow {
    id: Uuid,
    name: String,
    location_code: String,
    max_capacity: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.id,
            name: row.name,
            location_code: row.location_code,
            max_capacity: row.max_capacity,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StockRecordRow {
    id: Uuid,
    batch_id: Uuid,
    quantity_on_hand: i64,
    quantity_on_shelf: i64,
    quantity_reserved: i64,
    location_id: Option<Uuid>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<StockRecordRow> for StockRecord {
    fn from(row: StockRecordRow) -> Self {
        StockRecord {
            id: row.id,
            batch_id: row.batch_id,
            quantity_on_hand: row.quantity_on_hand,
            quantity_on_shelf: row.quantity_on_shelf,
            quantity_reserved: row.quantity_reserved,
            location_id: row.location_id,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    movement_number: i64,
    movement_type: String,
    stock_record_id: Uuid,
    batch_id: Uuid,
    quantity: i64,
    side: Option<String>,
    delta_on_hand: i64,
    delta_on_shelf: i64,
    from_location_id: Option<Uuid>,
    to_location_id: Option<Uuid>,
    reason: Option<String>,
    movement_date: DateTime<Utc>,
    performed_by: Option<Uuid>,
    notes: Option<String>,
    purchase_order_id: Option<Uuid>,
    reversal_of: Option<Uuid>,
    reversed_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        let side = row
            .side
            .map(|s| s.parse::<StockSide>())
            .transpose()
            .map_err(AppError::Internal)?;
        Ok(Movement {
            id: row.id,
            movement_number: row.movement_number,
            movement_type: row
                .movement_type
                .parse::<MovementType>()
                .map_err(AppError::Internal)?,
            stock_record_id: row.stock_record_id,
            batch_id: row.batch_id,
            quantity: row.quantity,
            side,
            delta_on_hand: row.delta_on_hand,
            delta_on_shelf: row.delta_on_shelf,
            from_location_id: row.from_location_id,
            to_location_id: row.to_location_id,
            reason: row.reason,
            date: row.movement_date,
            performed_by: row.performed_by,
            notes: row.notes,
            purchase_order_id: row.purchase_order_id,
            reversal_of: row.reversal_of,
            reversed_by: row.reversed_by,
            created_at: row.created_at,
        })
    }
}

const MOVEMENT_COLUMNS: &str = "m.id, m.movement_number, m.movement_type, m.stock_record_id, \
    m.batch_id, m.quantity, m.side, m.delta_on_hand, m.delta_on_shelf, m.from_location_id, \
    m.to_location_id, m.reason, m.movement_date, m.performed_by, m.notes, m.purchase_order_id, \
    m.reversal_of, m.reversed_by, m.created_at";

async fn lock_stock_record(conn: &mut PgConnection, id: Uuid) -> AppResult<StockRecord> {
    sqlx::query_as::<_, StockRecordRow>("SELECT * FROM stock_records WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .map(StockRecord::from)
        .ok_or_else(|| AppError::not_found("Stock record"))
}

/// Read the batch of a record that is already locked.
///
/// Status changes lock the batch and then its records, so once the record
/// lock is held the status read here cannot go stale before commit.
async fn owning_batch(conn: &mut PgConnection, batch_id: Uuid) -> AppResult<Batch> {
    sqlx::query_as::<_, BatchRow>("SELECT * FROM batches WHERE id = $1")
        .bind(batch_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Batch"))?
        .try_into()
}

/// Lock the given locations (in id order) and recompute their occupancy
async fn lock_snapshots(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, LocationSnapshot>> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let locations = sqlx::query_as::<_, LocationRow>(
        "SELECT * FROM locations WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut snapshots = HashMap::with_capacity(locations.len());
    for row in locations {
        let occupants = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT id, quantity_on_hand FROM stock_records WHERE location_id = $1 ORDER BY id",
        )
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await?;
        snapshots.insert(row.id, LocationSnapshot::new(row.into(), occupants));
    }

    if ids.iter().any(|id| !snapshots.contains_key(id)) {
        return Err(AppError::not_found("Location"));
    }
    Ok(snapshots)
}

async fn location_context(
    conn: &mut PgConnection,
    current: Option<Uuid>,
    target: Option<Uuid>,
) -> AppResult<LocationContext> {
    let ids: Vec<Uuid> = current.into_iter().chain(target).collect();
    let snapshots = lock_snapshots(conn, &ids).await?;
    Ok(LocationContext {
        current: current.and_then(|id| snapshots.get(&id).cloned()),
        target: target.and_then(|id| snapshots.get(&id).cloned()),
    })
}

async fn save_stock_record(conn: &mut PgConnection, record: &StockRecord) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE stock_records
        SET quantity_on_hand = $2, quantity_on_shelf = $3, quantity_reserved = $4,
            location_id = $5, version = $6, updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(record.quantity_on_hand)
    .bind(record.quantity_on_shelf)
    .bind(record.quantity_reserved)
    .bind(record.location_id)
    .bind(record.version)
    .bind(record.updated_at)
    .execute(conn)
    .await
    .map_err(|e| map_unique_violation(e, "location_id"))?;
    Ok(())
}

/// Persist a planned transition inside the caller's transaction
async fn commit_transition(
    conn: &mut PgConnection,
    transition: Transition,
    ctx: &ActingContext,
) -> AppResult<MovementOutcome> {
    let record = transition.record;
    save_stock_record(&mut *conn, &record).await?;

    let number = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE ledger_sequence
        SET last_movement_number = last_movement_number + 1
        WHERE id = 1
        RETURNING last_movement_number
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;

    let movement = transition.movement.into_movement(
        Uuid::new_v4(),
        number,
        record.id,
        record.batch_id,
        ctx.now,
    );

    sqlx::query(
        r#"
        INSERT INTO movements (
            id, movement_number, movement_type, stock_record_id, batch_id, quantity, side,
            delta_on_hand, delta_on_shelf, from_location_id, to_location_id, reason,
            movement_date, performed_by, notes, purchase_order_id, reversal_of, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(movement.id)
    .bind(movement.movement_number)
    .bind(movement.movement_type.as_str())
    .bind(movement.stock_record_id)
    .bind(movement.batch_id)
    .bind(movement.quantity)
    .bind(movement.side.map(|s| s.as_str()))
    .bind(movement.delta_on_hand)
    .bind(movement.delta_on_shelf)
    .bind(movement.from_location_id)
    .bind(movement.to_location_id)
    .bind(&movement.reason)
    .bind(movement.date)
    .bind(movement.performed_by)
    .bind(&movement.notes)
    .bind(movement.purchase_order_id)
    .bind(movement.reversal_of)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(MovementOutcome {
        movement,
        stock_record: record.view(),
    })
}

fn push_movement_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &MovementFilter) {
    if let Some(id) = filter.stock_record_id {
        qb.push(" AND m.stock_record_id = ").push_bind(id);
    }
    if let Some(id) = filter.batch_id {
        qb.push(" AND m.batch_id = ").push_bind(id);
    }
    if let Some(id) = filter.product_id {
        qb.push(" AND b.product_id = ").push_bind(id);
    }
    if let Some(movement_type) = filter.movement_type {
        qb.push(" AND m.movement_type = ")
            .push_bind(movement_type.as_str());
    }
    if let Some(start) = filter.start_date {
        qb.push(" AND (m.movement_date AT TIME ZONE 'UTC')::date >= ")
            .push_bind(start);
    }
    if let Some(end) = filter.end_date {
        qb.push(" AND (m.movement_date AT TIME ZONE 'UTC')::date <= ")
            .push_bind(end);
    }
    if let Some(id) = filter.performed_by {
        qb.push(" AND m.performed_by = ").push_bind(id);
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn insert_batch(&self, batch: Batch, record: Option<StockRecord>) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO batches (id, batch_code, product_id, product_name, expiry_date, quantity, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(batch.id)
        .bind(&batch.batch_code)
        .bind(batch.product_id)
        .bind(&batch.product_name)
        .bind(batch.expiry_date)
        .bind(batch.quantity)
        .bind(batch.status.as_str())
        .bind(batch.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "batch_code"))?;

        if let Some(record) = record {
            insert_stock_record_row(&mut tx, &record).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_batch(&self, id: Uuid) -> AppResult<Batch> {
        sqlx::query_as::<_, BatchRow>("SELECT * FROM batches WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Batch"))?
            .try_into()
    }

    async fn list_batches(&self, product_id: Option<Uuid>) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT * FROM batches
            WHERE ($1::uuid IS NULL OR product_id = $1)
            ORDER BY batch_code
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Batch::try_from).collect()
    }

    async fn update_batch_status(&self, id: Uuid, status: BatchStatus) -> AppResult<Batch> {
        let mut tx = self.db.begin().await?;

        let batch: Batch =
            sqlx::query_as::<_, BatchRow>("SELECT * FROM batches WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::not_found("Batch"))?
                .try_into()?;

        let records: Vec<StockRecord> = sqlx::query_as::<_, StockRecordRow>(
            "SELECT * FROM stock_records WHERE batch_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(StockRecord::from)
        .collect();

        validate_status_change(&batch, status, &records)?;

        sqlx::query("UPDATE batches SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Batch { status, ..batch })
    }

    async fn insert_location(&self, location: Location) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO locations (id, name, location_code, max_capacity, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(location.id)
        .bind(&location.name)
        .bind(&location.location_code)
        .bind(location.max_capacity)
        .bind(location.is_active)
        .bind(location.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.constraint() == Some("locations_name_key") => {
                AppError::DuplicateEntry("name".to_string())
            }
            _ => map_unique_violation(e, "location_code"),
        })?;
        Ok(())
    }

    async fn get_location(&self, id: Uuid) -> AppResult<Location> {
        sqlx::query_as::<_, LocationRow>("SELECT * FROM locations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(Location::from)
            .ok_or_else(|| AppError::not_found("Location"))
    }

    async fn list_locations(&self, active_only: bool) -> AppResult<Vec<Location>> {
        let rows = sqlx::query_as::<_, LocationRow>(
            "SELECT * FROM locations WHERE ($1 = FALSE OR is_active) ORDER BY name",
        )
        .bind(active_only)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Location::from).collect())
    }

    async fn set_location_active(&self, id: Uuid, active: bool) -> AppResult<Location> {
        let mut tx = self.db.begin().await?;

        let mut snapshots = lock_snapshots(&mut tx, &[id]).await?;
        let snapshot = snapshots
            .remove(&id)
            .ok_or_else(|| AppError::not_found("Location"))?;
        if !active {
            if let Some((occupant, _)) = snapshot.occupants.first() {
                return Err(shared::LedgerError::LocationOccupied {
                    location_id: id,
                    name: snapshot.location.name.clone(),
                    occupant: *occupant,
                }
                .into());
            }
        }

        sqlx::query("UPDATE locations SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Location {
            is_active: active,
            ..snapshot.location
        })
    }

    async fn location_snapshot(&self, id: Uuid) -> AppResult<LocationSnapshot> {
        let location = self.get_location(id).await?;
        let occupants = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT id, quantity_on_hand FROM stock_records WHERE location_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(LocationSnapshot::new(location, occupants))
    }

    async fn insert_stock_record(&self, record: StockRecord) -> AppResult<()> {
        let mut conn = self.db.acquire().await?;
        insert_stock_record_row(&mut conn, &record).await
    }

    async fn get_stock_record(&self, id: Uuid) -> AppResult<StockRecord> {
        sqlx::query_as::<_, StockRecordRow>("SELECT * FROM stock_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(StockRecord::from)
            .ok_or_else(|| AppError::not_found("Stock record"))
    }

    async fn list_stock_records(&self, filter: &StockRecordFilter) -> AppResult<Vec<StockRecord>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT s.* FROM stock_records s JOIN batches b ON b.id = s.batch_id WHERE TRUE",
        );
        if let Some(id) = filter.batch_id {
            qb.push(" AND s.batch_id = ").push_bind(id);
        }
        if let Some(id) = filter.product_id {
            qb.push(" AND b.product_id = ").push_bind(id);
        }
        if let Some(id) = filter.location_id {
            qb.push(" AND s.location_id = ").push_bind(id);
        }
        match filter.in_stock {
            Some(true) => {
                qb.push(" AND s.quantity_on_hand + s.quantity_on_shelf > 0");
            }
            Some(false) => {
                qb.push(" AND s.quantity_on_hand + s.quantity_on_shelf = 0");
            }
            None => {}
        }
        qb.push(" ORDER BY s.created_at, s.id");

        let rows = qb
            .build_query_as::<StockRecordRow>()
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(StockRecord::from).collect())
    }

    async fn delete_stock_record(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let record = lock_stock_record(&mut tx, id).await?;
        shared::check_deletable(&record)?;

        sqlx::query("DELETE FROM stock_records WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn change_reservation(
        &self,
        id: Uuid,
        delta: i64,
        ctx: &ActingContext,
    ) -> AppResult<StockRecord> {
        let mut tx = self.db.begin().await?;
        let record = lock_stock_record(&mut tx, id).await?;
        let next = shared::plan_reservation(&record, delta, ctx.now)?;
        save_stock_record(&mut tx, &next).await?;
        tx.commit().await?;
        Ok(next)
    }

    async fn apply_movement(
        &self,
        intent: MovementIntent,
        ctx: &ActingContext,
    ) -> AppResult<MovementOutcome> {
        let mut tx = self.db.begin().await?;

        let record = lock_stock_record(&mut tx, intent.stock_record_id).await?;
        let target = match intent.movement_type {
            MovementType::Location => intent.meta.location_id,
            _ => None,
        };
        let locations = location_context(&mut tx, record.location_id, target).await?;

        let transition = shared::plan_movement(&record, &locations, &intent, ctx)?;
        let batch = owning_batch(&mut tx, record.batch_id).await?;
        shared::check_batch(&batch, &transition, ctx.today())?;
        let outcome = commit_transition(&mut tx, transition, ctx).await?;

        tx.commit().await?;
        Ok(outcome)
    }

    async fn reverse_movement(&self, id: Uuid, ctx: &ActingContext) -> AppResult<MovementOutcome> {
        let mut tx = self.db.begin().await?;

        // Resolve the record first so the lock order matches apply_movement
        let stock_record_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT stock_record_id FROM movements WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Movement"))?;

        let record = lock_stock_record(&mut tx, stock_record_id).await?;

        let query = format!("SELECT {} FROM movements m WHERE m.id = $1 FOR UPDATE", MOVEMENT_COLUMNS);
        let original: Movement = sqlx::query_as::<_, MovementRow>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;

        let target = match original.movement_type {
            MovementType::Location => original.from_location_id,
            _ => None,
        };
        let locations = location_context(&mut tx, record.location_id, target).await?;

        let transition = shared::plan_reversal(&original, &record, &locations, ctx)?;
        let batch = owning_batch(&mut tx, record.batch_id).await?;
        shared::check_batch(&batch, &transition, ctx.today())?;
        let outcome = commit_transition(&mut tx, transition, ctx).await?;

        sqlx::query("UPDATE movements SET reversed_by = $2 WHERE id = $1")
            .bind(original.id)
            .bind(outcome.movement.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(outcome)
    }

    async fn get_movement(&self, id: Uuid) -> AppResult<Movement> {
        let query = format!("SELECT {} FROM movements m WHERE m.id = $1", MOVEMENT_COLUMNS);
        sqlx::query_as::<_, MovementRow>(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Movement"))?
            .try_into()
    }

    async fn list_movements(
        &self,
        filter: &MovementFilter,
        order: SortOrder,
        page: Pagination,
    ) -> AppResult<(Vec<Movement>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM movements m JOIN batches b ON b.id = m.batch_id WHERE TRUE",
        );
        push_movement_filter(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM movements m JOIN batches b ON b.id = m.batch_id WHERE TRUE",
            MOVEMENT_COLUMNS
        ));
        push_movement_filter(&mut qb, filter);
        qb.push(match order {
            SortOrder::Asc => " ORDER BY m.movement_number ASC",
            SortOrder::Desc => " ORDER BY m.movement_number DESC",
        });
        qb.push(" LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = qb.build_query_as::<MovementRow>().fetch_all(&self.db).await?;
        let movements = rows
            .into_iter()
            .map(Movement::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        Ok((movements, total.max(0) as u64))
    }

    async fn update_movement_metadata(
        &self,
        id: Uuid,
        update: MovementMetadataUpdate,
    ) -> AppResult<Movement> {
        let mut tx = self.db.begin().await?;

        let query = format!("SELECT {} FROM movements m WHERE m.id = $1 FOR UPDATE", MOVEMENT_COLUMNS);
        let current: Movement = sqlx::query_as::<_, MovementRow>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Movement"))?
            .try_into()?;

        let updated = shared::apply_metadata_update(&current, &update)?;

        sqlx::query("UPDATE movements SET reason = $2, notes = $3, movement_date = $4 WHERE id = $1")
            .bind(id)
            .bind(&updated.reason)
            .bind(&updated.notes)
            .bind(updated.date)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.db).await.is_ok()
    }
}

async fn insert_stock_record_row(conn: &mut PgConnection, record: &StockRecord) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_records (
            id, batch_id, quantity_on_hand, quantity_on_shelf, quantity_reserved,
            location_id, version, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(record.id)
    .bind(record.batch_id)
    .bind(record.quantity_on_hand)
    .bind(record.quantity_on_shelf)
    .bind(record.quantity_reserved)
    .bind(record.location_id)
    .bind(record.version)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            AppError::not_found("Batch")
        }
        _ => map_unique_violation(e, "location_id"),
    })?;
    Ok(())
}
