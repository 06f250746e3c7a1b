//! Postgres-backed ledger store.
//!
//! The append path runs inside an explicit transaction with a row lock on the
//! product (`SELECT ... FOR UPDATE`), so two concurrent movements against the
//! same product serialize rather than lost-update each other. A failed or
//! timed-out transaction rolls back fully: ledger row and balance are written
//! together or not at all.
//!
//! ## Error mapping
//!
//! sqlstate 23505 on the reversal index means a concurrent cancellation won
//! the race and maps to `AlreadyCancelled`; every other database fault
//! surfaces as `LedgerError::Storage`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use stockbook_core::{MovementId, ProductId, UserId};
use stockbook_ledger::{
    LedgerError, Movement, MovementCursor, MovementFilter, MovementPage, MovementType, NewProduct,
    PageRequest, Product,
};

use crate::reports::{DailyTotal, ProductTotal, ReportRange, SalesSummary};

use super::{AppendOutcome, LedgerStore, MovementInsert, StockRepair};

#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small pool suitable for the request-per-invocation model.
    pub async fn connect(database_url: &str) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), LedgerError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::storage(format!("migration failed: {e}")))
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self, new), err)]
    async fn insert_product(&self, new: NewProduct) -> Result<Product, LedgerError> {
        let product = Product {
            id: ProductId::new(),
            name: new.name,
            sku: new.sku,
            price_cents: new.price_cents,
            is_active: true,
            stock_cached: 0,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO products (id, name, sku, price_cents, is_active, stock_cached, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(product.stock_cached)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                LedgerError::validation("a product with this SKU already exists")
            } else {
                map_sqlx_error("insert_product", e)
            }
        })?;

        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product(&self, id: ProductId) -> Result<Option<Product>, LedgerError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product", e))?;

        row.map(|r| product_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_products(&self) -> Result<Vec<Product>, LedgerError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn set_product_active(
        &self,
        id: ProductId,
        active: bool,
    ) -> Result<Product, LedgerError> {
        let row = sqlx::query(&format!(
            "UPDATE products SET is_active = $2 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_product_active", e))?;

        match row {
            Some(r) => product_from_row(&r),
            None => Err(LedgerError::ProductNotFound(id)),
        }
    }

    #[instrument(
        skip(self, insert),
        fields(
            product_id = %insert.product_id,
            movement_type = %insert.movement_type,
            signed_qty = insert.signed_qty,
        ),
        err
    )]
    async fn append_movement(&self, insert: MovementInsert) -> Result<AppendOutcome, LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        // Row lock: the balance read and write below cannot interleave with a
        // concurrent movement against the same product.
        let mut product = lock_product(&mut tx, insert.product_id).await?;
        if !product.is_active {
            return Err(LedgerError::ProductInactive(insert.product_id));
        }

        let new_stock = product.apply_delta(insert.signed_qty)?;

        let movement = Movement {
            id: MovementId::new(),
            product_id: insert.product_id,
            movement_type: insert.movement_type,
            qty: insert.signed_qty,
            unit_price_cents: insert.unit_price_cents,
            note: insert.note,
            reverses: insert.reverses,
            actor_id: insert.actor_id,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO inventory_movements
                (id, product_id, movement_type, qty, unit_price_cents, note,
                 reverses_movement_id, actor_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.product_id.as_uuid())
        .bind(movement.movement_type.as_str())
        .bind(movement.qty)
        .bind(movement.unit_price_cents)
        .bind(&movement.note)
        .bind(movement.reverses.map(|id| *id.as_uuid()))
        .bind(movement.actor_id.as_uuid())
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match (&movement.reverses, is_unique_violation(&e)) {
            (Some(reversed), true) => LedgerError::AlreadyCancelled(*reversed),
            _ => map_sqlx_error("insert_movement", e),
        })?;

        sqlx::query("UPDATE products SET stock_cached = $2 WHERE id = $1")
            .bind(movement.product_id.as_uuid())
            .bind(new_stock)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_stock", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        product.stock_cached = new_stock;
        Ok(AppendOutcome { movement, product })
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, LedgerError> {
        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("movement", e))?;

        row.map(|r| movement_from_row(&r)).transpose()
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    async fn reversal_of(&self, id: MovementId) -> Result<Option<Movement>, LedgerError> {
        let row = sqlx::query(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM inventory_movements WHERE reverses_movement_id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("reversal_of", e))?;

        row.map(|r| movement_from_row(&r)).transpose()
    }

    #[instrument(skip(self, filter, page), err)]
    async fn movements(
        &self,
        filter: &MovementFilter,
        page: &PageRequest,
    ) -> Result<MovementPage, LedgerError> {
        let cursor_ts = page.cursor.map(|c| c.created_at);
        let cursor_id = page.cursor.map(|c| *c.id.as_uuid());

        // Fetch one extra row to detect whether a further page exists.
        let rows = sqlx::query(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM inventory_movements
            WHERE ($1::uuid IS NULL OR product_id = $1)
              AND ($2::text IS NULL OR movement_type = $2)
              AND ($3::uuid IS NULL OR actor_id = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at < $5)
              AND ($6::timestamptz IS NULL OR (created_at, id) < ($6, $7::uuid))
            ORDER BY created_at DESC, id DESC
            LIMIT $8
            "#
        ))
        .bind(filter.product_id.map(|id| *id.as_uuid()))
        .bind(filter.movement_type.map(|t| t.as_str()))
        .bind(filter.actor_id.map(|id| *id.as_uuid()))
        .bind(filter.from)
        .bind(filter.to)
        .bind(cursor_ts)
        .bind(cursor_id)
        .bind(page.limit as i64 + 1)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        let mut movements = rows
            .iter()
            .map(movement_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        let has_more = movements.len() > page.limit as usize;
        movements.truncate(page.limit as usize);
        let next_cursor = if has_more {
            movements.last().map(MovementCursor::after)
        } else {
            None
        };

        Ok(MovementPage {
            movements,
            has_more,
            next_cursor,
        })
    }

    #[instrument(skip(self, range), err)]
    async fn sales_summary(&self, range: &ReportRange) -> Result<SalesSummary, LedgerError> {
        // Sales store -qty, cancellations +qty: SUM(-qty) nets them out.
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(-qty), 0)::bigint AS units_sold,
                COALESCE(SUM(-qty * COALESCE(unit_price_cents, 0)), 0)::bigint AS gross_revenue_cents,
                COUNT(*) FILTER (WHERE movement_type = 'SALE_OFFLINE') AS sales,
                COUNT(*) FILTER (WHERE movement_type = 'CANCEL_SALE') AS cancellations
            FROM inventory_movements
            WHERE movement_type IN ('SALE_OFFLINE', 'CANCEL_SALE')
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("sales_summary", e))?;

        Ok(SalesSummary {
            units_sold: row
                .try_get("units_sold")
                .map_err(|e| map_sqlx_error("sales_summary", e))?,
            gross_revenue_cents: row
                .try_get("gross_revenue_cents")
                .map_err(|e| map_sqlx_error("sales_summary", e))?,
            sales: row
                .try_get("sales")
                .map_err(|e| map_sqlx_error("sales_summary", e))?,
            cancellations: row
                .try_get("cancellations")
                .map_err(|e| map_sqlx_error("sales_summary", e))?,
        })
    }

    #[instrument(skip(self, range), err)]
    async fn daily_totals(&self, range: &ReportRange) -> Result<Vec<DailyTotal>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT
                (created_at AT TIME ZONE 'UTC')::date AS day,
                COALESCE(SUM(-qty), 0)::bigint AS units_sold,
                COALESCE(SUM(-qty * COALESCE(unit_price_cents, 0)), 0)::bigint AS revenue_cents
            FROM inventory_movements
            WHERE movement_type IN ('SALE_OFFLINE', 'CANCEL_SALE')
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("daily_totals", e))?;

        rows.iter()
            .map(|row| {
                Ok(DailyTotal {
                    day: row
                        .try_get("day")
                        .map_err(|e| map_sqlx_error("daily_totals", e))?,
                    units_sold: row
                        .try_get("units_sold")
                        .map_err(|e| map_sqlx_error("daily_totals", e))?,
                    revenue_cents: row
                        .try_get("revenue_cents")
                        .map_err(|e| map_sqlx_error("daily_totals", e))?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, range), err)]
    async fn product_totals(&self, range: &ReportRange) -> Result<Vec<ProductTotal>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT
                m.product_id,
                p.name,
                COALESCE(SUM(-m.qty), 0)::bigint AS units_sold,
                COALESCE(SUM(-m.qty * COALESCE(m.unit_price_cents, 0)), 0)::bigint AS revenue_cents
            FROM inventory_movements m
            JOIN products p ON p.id = m.product_id
            WHERE m.movement_type IN ('SALE_OFFLINE', 'CANCEL_SALE')
              AND ($1::timestamptz IS NULL OR m.created_at >= $1)
              AND ($2::timestamptz IS NULL OR m.created_at < $2)
            GROUP BY m.product_id, p.name
            ORDER BY revenue_cents DESC, m.product_id ASC
            "#,
        )
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("product_totals", e))?;

        rows.iter()
            .map(|row| {
                let product_id: uuid::Uuid = row
                    .try_get("product_id")
                    .map_err(|e| map_sqlx_error("product_totals", e))?;
                Ok(ProductTotal {
                    product_id: ProductId::from_uuid(product_id),
                    name: row
                        .try_get("name")
                        .map_err(|e| map_sqlx_error("product_totals", e))?,
                    units_sold: row
                        .try_get("units_sold")
                        .map_err(|e| map_sqlx_error("product_totals", e))?,
                    revenue_cents: row
                        .try_get("revenue_cents")
                        .map_err(|e| map_sqlx_error("product_totals", e))?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn verify_consistency(&self) -> Result<Vec<StockRepair>, LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        let rows = sqlx::query(
            r#"
            SELECT p.id, p.stock_cached, COALESCE(SUM(m.qty), 0)::bigint AS calculated
            FROM products p
            LEFT JOIN inventory_movements m ON m.product_id = p.id
            GROUP BY p.id, p.stock_cached
            HAVING p.stock_cached <> COALESCE(SUM(m.qty), 0)
            ORDER BY p.id
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("verify_consistency", e))?;

        let mut repairs = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: uuid::Uuid = row
                .try_get("id")
                .map_err(|e| map_sqlx_error("verify_consistency", e))?;
            let cached: i64 = row
                .try_get("stock_cached")
                .map_err(|e| map_sqlx_error("verify_consistency", e))?;
            let calculated: i64 = row
                .try_get("calculated")
                .map_err(|e| map_sqlx_error("verify_consistency", e))?;

            sqlx::query("UPDATE products SET stock_cached = $2 WHERE id = $1")
                .bind(id)
                .bind(calculated)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("verify_consistency", e))?;

            repairs.push(StockRepair {
                product_id: ProductId::from_uuid(id),
                cached,
                calculated,
            });
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(repairs)
    }
}

const PRODUCT_COLUMNS: &str = "id, name, sku, price_cents, is_active, stock_cached, created_at";
const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, qty, unit_price_cents, note, \
                                reverses_movement_id, actor_id, created_at";

async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    id: ProductId,
) -> Result<Product, LedgerError> {
    let row = sqlx::query(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
    ))
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_product", e))?;

    match row {
        Some(r) => product_from_row(&r),
        None => Err(LedgerError::ProductNotFound(id)),
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    LedgerError::storage(format!("{operation}: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

#[derive(Debug)]
struct ProductRow {
    id: uuid::Uuid,
    name: String,
    sku: Option<String>,
    price_cents: Option<i64>,
    is_active: bool,
    stock_cached: i64,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            price_cents: row.try_get("price_cents")?,
            is_active: row.try_get("is_active")?,
            stock_cached: row.try_get("stock_cached")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn product_from_row(row: &sqlx::postgres::PgRow) -> Result<Product, LedgerError> {
    let row = ProductRow::from_row(row)
        .map_err(|e| LedgerError::storage(format!("malformed product row: {e}")))?;
    Ok(Product {
        id: ProductId::from_uuid(row.id),
        name: row.name,
        sku: row.sku,
        price_cents: row.price_cents,
        is_active: row.is_active,
        stock_cached: row.stock_cached,
        created_at: row.created_at,
    })
}

#[derive(Debug)]
struct MovementRow {
    id: uuid::Uuid,
    product_id: uuid::Uuid,
    movement_type: String,
    qty: i64,
    unit_price_cents: Option<i64>,
    note: Option<String>,
    reverses_movement_id: Option<uuid::Uuid>,
    actor_id: uuid::Uuid,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            movement_type: row.try_get("movement_type")?,
            qty: row.try_get("qty")?,
            unit_price_cents: row.try_get("unit_price_cents")?,
            note: row.try_get("note")?,
            reverses_movement_id: row.try_get("reverses_movement_id")?,
            actor_id: row.try_get("actor_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

fn movement_from_row(row: &sqlx::postgres::PgRow) -> Result<Movement, LedgerError> {
    let row = MovementRow::from_row(row)
        .map_err(|e| LedgerError::storage(format!("malformed movement row: {e}")))?;
    let movement_type: MovementType = row
        .movement_type
        .parse()
        .map_err(|e| LedgerError::storage(format!("malformed movement row: {e}")))?;
    Ok(Movement {
        id: MovementId::from_uuid(row.id),
        product_id: ProductId::from_uuid(row.product_id),
        movement_type,
        qty: row.qty,
        unit_price_cents: row.unit_price_cents,
        note: row.note,
        reverses: row.reverses_movement_id.map(MovementId::from_uuid),
        actor_id: UserId::from_uuid(row.actor_id),
        created_at: row.created_at,
    })
}
