//! In-memory ledger store.
//!
//! Intended for tests/dev. A single `RwLock` write guard stands in for the
//! database transaction: the read-balance → check → append → write-balance
//! sequence runs under one guard, so concurrent movements against the same
//! product serialize exactly as they would under the relational store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockbook_core::{MovementId, ProductId};
use stockbook_ledger::{
    LedgerError, Movement, MovementCursor, MovementFilter, MovementPage, MovementType, NewProduct,
    PageRequest, Product,
};

use crate::reports::{DailyTotal, ProductTotal, ReportRange, SalesSummary};

use super::{AppendOutcome, LedgerStore, MovementInsert, StockRepair};

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<ProductId, Product>,
    /// Append-only; never reordered, updated, or truncated.
    movements: Vec<Movement>,
    /// reversed sale id -> cancelling movement id (one reversal per sale).
    reversals: HashMap<MovementId, MovementId>,
}

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, LedgerError> {
        self.inner
            .read()
            .map_err(|_| LedgerError::storage("lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, LedgerError> {
        self.inner
            .write()
            .map_err(|_| LedgerError::storage("lock poisoned"))
    }

    /// Test hook: corrupt a cached balance to exercise the consistency check.
    #[cfg(test)]
    pub(crate) fn force_stock(&self, id: ProductId, stock: i64) {
        if let Ok(mut inner) = self.inner.write() {
            if let Some(p) = inner.products.get_mut(&id) {
                p.stock_cached = stock;
            }
        }
    }
}

/// Now, truncated to the microsecond precision the relational store keeps,
/// so pagination cursors round-trip losslessly on either backend.
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

fn matches_filter(m: &Movement, filter: &MovementFilter) -> bool {
    if let Some(product_id) = filter.product_id {
        if m.product_id != product_id {
            return false;
        }
    }
    if let Some(ty) = filter.movement_type {
        if m.movement_type != ty {
            return false;
        }
    }
    if let Some(actor_id) = filter.actor_id {
        if m.actor_id != actor_id {
            return false;
        }
    }
    if let Some(from) = filter.from {
        if m.created_at < from {
            return false;
        }
    }
    if let Some(to) = filter.to {
        if m.created_at >= to {
            return false;
        }
    }
    true
}

/// Net units/revenue contribution of a movement to sales reporting.
///
/// Sales store negative quantities and cancellations positive ones, so
/// `-qty` yields a positive contribution for a sale and the matching
/// negative contribution for its reversal.
fn sales_contribution(m: &Movement) -> Option<(i64, i64)> {
    match m.movement_type {
        MovementType::SaleOffline | MovementType::CancelSale => {
            let units = -m.qty;
            let revenue = units * m.unit_price_cents.unwrap_or(0);
            Some((units, revenue))
        }
        _ => None,
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_product(&self, new: NewProduct) -> Result<Product, LedgerError> {
        let product = Product {
            id: ProductId::new(),
            name: new.name,
            sku: new.sku,
            price_cents: new.price_cents,
            is_active: true,
            stock_cached: 0,
            created_at: now_micros(),
        };

        let mut inner = self.write()?;
        inner.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>, LedgerError> {
        Ok(self.read()?.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, LedgerError> {
        let inner = self.read()?;
        let mut products: Vec<Product> = inner.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn set_product_active(
        &self,
        id: ProductId,
        active: bool,
    ) -> Result<Product, LedgerError> {
        let mut inner = self.write()?;
        let product = inner
            .products
            .get_mut(&id)
            .ok_or(LedgerError::ProductNotFound(id))?;
        product.is_active = active;
        Ok(product.clone())
    }

    async fn append_movement(&self, insert: MovementInsert) -> Result<AppendOutcome, LedgerError> {
        // One write guard covers the whole read-check-append-update sequence.
        let mut guard = self.write()?;
        let inner = &mut *guard;

        let product = inner
            .products
            .get_mut(&insert.product_id)
            .ok_or(LedgerError::ProductNotFound(insert.product_id))?;
        if !product.is_active {
            return Err(LedgerError::ProductInactive(insert.product_id));
        }

        let new_stock = product.apply_delta(insert.signed_qty)?;

        if let Some(reversed) = insert.reverses {
            if inner.reversals.contains_key(&reversed) {
                return Err(LedgerError::AlreadyCancelled(reversed));
            }
        }

        let movement = Movement {
            id: MovementId::new(),
            product_id: insert.product_id,
            movement_type: insert.movement_type,
            qty: insert.signed_qty,
            unit_price_cents: insert.unit_price_cents,
            note: insert.note,
            reverses: insert.reverses,
            actor_id: insert.actor_id,
            created_at: now_micros(),
        };

        if let Some(reversed) = movement.reverses {
            inner.reversals.insert(reversed, movement.id);
        }
        inner.movements.push(movement.clone());
        product.stock_cached = new_stock;
        let product = product.clone();

        Ok(AppendOutcome { movement, product })
    }

    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, LedgerError> {
        Ok(self.read()?.movements.iter().find(|m| m.id == id).cloned())
    }

    async fn reversal_of(&self, id: MovementId) -> Result<Option<Movement>, LedgerError> {
        let inner = self.read()?;
        let Some(cancel_id) = inner.reversals.get(&id) else {
            return Ok(None);
        };
        Ok(inner.movements.iter().find(|m| m.id == *cancel_id).cloned())
    }

    async fn movements(
        &self,
        filter: &MovementFilter,
        page: &PageRequest,
    ) -> Result<MovementPage, LedgerError> {
        let inner = self.read()?;

        let mut matching: Vec<Movement> = inner
            .movements
            .iter()
            .filter(|m| matches_filter(m, filter))
            .filter(|m| match &page.cursor {
                Some(cursor) => (m.created_at, m.id) < (cursor.created_at, cursor.id),
                None => true,
            })
            .cloned()
            .collect();

        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let has_more = matching.len() > page.limit as usize;
        matching.truncate(page.limit as usize);
        let next_cursor = if has_more {
            matching.last().map(MovementCursor::after)
        } else {
            None
        };

        Ok(MovementPage {
            movements: matching,
            has_more,
            next_cursor,
        })
    }

    async fn sales_summary(&self, range: &ReportRange) -> Result<SalesSummary, LedgerError> {
        let inner = self.read()?;
        let mut summary = SalesSummary::default();

        for m in inner.movements.iter().filter(|m| range.contains(m.created_at)) {
            match m.movement_type {
                MovementType::SaleOffline => summary.sales += 1,
                MovementType::CancelSale => summary.cancellations += 1,
                _ => {}
            }
            if let Some((units, revenue)) = sales_contribution(m) {
                summary.units_sold += units;
                summary.gross_revenue_cents += revenue;
            }
        }

        Ok(summary)
    }

    async fn daily_totals(&self, range: &ReportRange) -> Result<Vec<DailyTotal>, LedgerError> {
        let inner = self.read()?;
        let mut by_day: HashMap<chrono::NaiveDate, (i64, i64)> = HashMap::new();

        for m in inner.movements.iter().filter(|m| range.contains(m.created_at)) {
            if let Some((units, revenue)) = sales_contribution(m) {
                let entry = by_day.entry(m.created_at.date_naive()).or_default();
                entry.0 += units;
                entry.1 += revenue;
            }
        }

        let mut totals: Vec<DailyTotal> = by_day
            .into_iter()
            .map(|(day, (units_sold, revenue_cents))| DailyTotal {
                day,
                units_sold,
                revenue_cents,
            })
            .collect();
        totals.sort_by_key(|t| t.day);
        Ok(totals)
    }

    async fn product_totals(&self, range: &ReportRange) -> Result<Vec<ProductTotal>, LedgerError> {
        let inner = self.read()?;
        let mut by_product: HashMap<ProductId, (i64, i64)> = HashMap::new();

        for m in inner.movements.iter().filter(|m| range.contains(m.created_at)) {
            if let Some((units, revenue)) = sales_contribution(m) {
                let entry = by_product.entry(m.product_id).or_default();
                entry.0 += units;
                entry.1 += revenue;
            }
        }

        let mut totals: Vec<ProductTotal> = by_product
            .into_iter()
            .map(|(product_id, (units_sold, revenue_cents))| ProductTotal {
                product_id,
                name: inner
                    .products
                    .get(&product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                units_sold,
                revenue_cents,
            })
            .collect();
        totals.sort_by(|a, b| {
            b.revenue_cents
                .cmp(&a.revenue_cents)
                .then(a.product_id.cmp(&b.product_id))
        });
        Ok(totals)
    }

    async fn verify_consistency(&self) -> Result<Vec<StockRepair>, LedgerError> {
        let mut inner = self.write()?;

        let mut sums: HashMap<ProductId, i64> = HashMap::new();
        for m in &inner.movements {
            *sums.entry(m.product_id).or_default() += m.qty;
        }

        let mut repairs = Vec::new();
        for (id, product) in inner.products.iter_mut() {
            let calculated = sums.get(id).copied().unwrap_or(0);
            if product.stock_cached != calculated {
                repairs.push(StockRepair {
                    product_id: *id,
                    cached: product.stock_cached,
                    calculated,
                });
                product.stock_cached = calculated;
            }
        }
        repairs.sort_by_key(|r| r.product_id);
        Ok(repairs)
    }
}
