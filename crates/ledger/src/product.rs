use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::ProductId;

use crate::error::LedgerError;

/// A catalog product and its cached stock balance.
///
/// `stock_cached` is a derived value: the ledger is authoritative, and at all
/// times `stock_cached == sum(movement.qty)` over the product's movements.
/// Only the ledger write path mutates it, in the same transaction as the
/// movement insert that causes the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    /// Current list price in cents; snapshotted onto sale-shaped movements.
    pub price_cents: Option<i64>,
    pub is_active: bool,
    pub stock_cached: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Compute the balance after applying a signed delta.
    ///
    /// Rejects any delta that would drive the balance negative; the caller
    /// must apply this inside the same transaction that appends the ledger
    /// row, so the check and the write cannot be separated.
    pub fn apply_delta(&self, delta: i64) -> Result<i64, LedgerError> {
        let new_stock = self.stock_cached + delta;
        if new_stock < 0 {
            return Err(LedgerError::InsufficientStock {
                available: self.stock_cached,
                requested: delta.unsigned_abs() as i64,
            });
        }
        Ok(new_stock)
    }
}

/// Command: add a product to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: Option<i64>,
}

impl NewProduct {
    /// Validate and normalize the command (trimmed, non-empty name).
    pub fn validated(self) -> Result<Self, LedgerError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(LedgerError::validation("product name cannot be empty"));
        }
        Ok(Self { name, ..self })
    }
}
