//! Ledger storage: the transactional unit-of-work boundary.
//!
//! `append_movement` is the only operation that mutates stock, and it is
//! atomic by contract: inside one transaction the implementation re-reads the
//! product's balance, applies the non-negativity rule, inserts the ledger row
//! and writes the new balance. Both writes commit or roll back together; no
//! intermediate state is observable to concurrent readers. Ledger rows are
//! never updated or deleted.

use async_trait::async_trait;

use stockbook_core::{MovementId, ProductId, UserId};
use stockbook_ledger::{
    LedgerError, Movement, MovementFilter, MovementPage, MovementType, NewProduct, PageRequest,
    Product,
};

use crate::reports::{DailyTotal, ProductTotal, ReportRange, SalesSummary};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

/// A fully validated, signed ledger row ready to append.
///
/// The service has already run the role policy, quantity validation and sign
/// derivation; `signed_qty` is the stored value. The store still owns the
/// race-sensitive checks (product existence/activity, non-negativity, the
/// one-reversal-per-sale guard) because only it can run them inside the
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementInsert {
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub signed_qty: i64,
    pub unit_price_cents: Option<i64>,
    pub note: Option<String>,
    pub reverses: Option<MovementId>,
    pub actor_id: UserId,
}

/// Result of a committed append: the new row plus the product after the
/// balance update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    pub movement: Movement,
    pub product: Product,
}

/// One repair performed by the consistency check.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StockRepair {
    pub product_id: ProductId,
    /// Cached balance found before the repair.
    pub cached: i64,
    /// True ledger sum the cache was reset to.
    pub calculated: i64,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    // Products
    async fn insert_product(&self, new: NewProduct) -> Result<Product, LedgerError>;
    async fn product(&self, id: ProductId) -> Result<Option<Product>, LedgerError>;
    async fn list_products(&self) -> Result<Vec<Product>, LedgerError>;
    async fn set_product_active(&self, id: ProductId, active: bool)
    -> Result<Product, LedgerError>;

    // Ledger
    /// Atomically append a ledger row and update the cached balance.
    ///
    /// Errors: `ProductNotFound`, `ProductInactive`, `InsufficientStock`
    /// (nothing written in any of these cases), `AlreadyCancelled` when
    /// `reverses` already has a compensating entry.
    async fn append_movement(&self, insert: MovementInsert) -> Result<AppendOutcome, LedgerError>;
    async fn movement(&self, id: MovementId) -> Result<Option<Movement>, LedgerError>;
    /// The `CANCEL_SALE` entry reversing `id`, if one exists.
    async fn reversal_of(&self, id: MovementId) -> Result<Option<Movement>, LedgerError>;
    /// Cursor-paginated listing, newest first by `(created_at desc, id desc)`.
    async fn movements(
        &self,
        filter: &MovementFilter,
        page: &PageRequest,
    ) -> Result<MovementPage, LedgerError>;

    // Reporting
    async fn sales_summary(&self, range: &ReportRange) -> Result<SalesSummary, LedgerError>;
    async fn daily_totals(&self, range: &ReportRange) -> Result<Vec<DailyTotal>, LedgerError>;
    async fn product_totals(&self, range: &ReportRange) -> Result<Vec<ProductTotal>, LedgerError>;

    // Maintenance
    /// Recompute each product's true ledger sum and overwrite any drifted
    /// cached balance. Returns the repairs performed.
    async fn verify_consistency(&self) -> Result<Vec<StockRepair>, LedgerError>;
}
