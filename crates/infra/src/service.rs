//! The ledger write path.
//!
//! `LedgerService` is the only way movements enter the system. It runs the
//! role policy before anything touches storage, validates and signs the
//! quantity, delegates the atomic append to the store, and records a
//! best-effort audit entry after commit. Cancellation and adjustment are thin
//! specializations of the same path.

use std::sync::Arc;

use serde_json::json;

use stockbook_audit::{AuditEntry, AuditSink};
use stockbook_auth::Role;
use stockbook_core::{MovementId, ProductId, UserId};
use stockbook_ledger::{
    CreateMovement, LedgerError, Movement, MovementFilter, MovementPage, MovementType, NewProduct,
    PageRequest, Product, ensure_allowed, signed_quantity,
};

use crate::reports::{DailyTotal, ProductTotal, ReportRange, SalesSummary};
use crate::store::{AppendOutcome, LedgerStore, MovementInsert, StockRepair};

/// The authenticated actor performing an operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Actor {
    pub actor_id: UserId,
    pub role: Role,
}

/// Product display summary returned with a created movement.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    /// Balance after the movement was applied.
    pub stock_cached: i64,
}

/// Actor display summary returned with a created movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ActorSummary {
    pub id: UserId,
    pub role: Role,
}

/// A committed movement with resolved summaries for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedMovement {
    pub movement: Movement,
    pub product: ProductSummary,
    pub actor: ActorSummary,
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditSink>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    // --- Products -----------------------------------------------------------

    pub async fn create_product(&self, new: NewProduct) -> Result<Product, LedgerError> {
        let new = new.validated()?;
        self.store.insert_product(new).await
    }

    pub async fn product(&self, id: ProductId) -> Result<Product, LedgerError> {
        self.store
            .product(id)
            .await?
            .ok_or(LedgerError::ProductNotFound(id))
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, LedgerError> {
        self.store.list_products().await
    }

    pub async fn set_product_active(
        &self,
        id: ProductId,
        active: bool,
    ) -> Result<Product, LedgerError> {
        self.store.set_product_active(id, active).await
    }

    // --- Ledger write path --------------------------------------------------

    /// Record a stock-affecting event. The single write path for all types.
    pub async fn create_movement(
        &self,
        cmd: CreateMovement,
        actor: Actor,
    ) -> Result<CreatedMovement, LedgerError> {
        // Permission check runs first and fails fast with no storage access,
        // so unauthorized attempts leak nothing about catalog state.
        ensure_allowed(actor.role, cmd.movement_type)?;

        // Every CANCEL_SALE row must reference the sale it reverses; only
        // `cancel_sale` can construct one.
        if cmd.movement_type == MovementType::CancelSale {
            return Err(LedgerError::validation(
                "cancellations must reference a sale; use the cancel-sale operation",
            ));
        }

        if cmd.movement_type == MovementType::Adjustment
            && cmd.note.as_deref().is_none_or(|n| n.trim().is_empty())
        {
            return Err(LedgerError::ReasonRequired);
        }

        let signed_qty = signed_quantity(cmd.movement_type, cmd.quantity)?;

        let product = self.product(cmd.product_id).await?;
        if !product.is_active {
            return Err(LedgerError::ProductInactive(cmd.product_id));
        }

        // Sale-shaped movements snapshot the list price unless the caller
        // supplied one; the snapshot is what reporting reads later.
        let unit_price_cents = cmd.unit_price_cents.or(match cmd.movement_type {
            MovementType::SaleOffline | MovementType::Return => product.price_cents,
            _ => None,
        });

        let outcome = self
            .store
            .append_movement(MovementInsert {
                product_id: cmd.product_id,
                movement_type: cmd.movement_type,
                signed_qty,
                unit_price_cents,
                note: cmd.note,
                reverses: None,
                actor_id: actor.actor_id,
            })
            .await?;

        self.record_audit("ledger.movement.created", &outcome, actor);
        Ok(self.created(outcome, actor))
    }

    /// Reverse exactly one prior offline sale with a compensating entry.
    ///
    /// The original row is never mutated or deleted. The store's unique
    /// reversal constraint closes the race between concurrent cancellations;
    /// the lookup here exists to answer repeat requests with a precise error.
    pub async fn cancel_sale(
        &self,
        movement_id: MovementId,
        actor: Actor,
    ) -> Result<CreatedMovement, LedgerError> {
        ensure_allowed(actor.role, MovementType::CancelSale)?;

        let original = self
            .store
            .movement(movement_id)
            .await?
            .ok_or(LedgerError::MovementNotFound(movement_id))?;

        if original.movement_type != MovementType::SaleOffline {
            return Err(LedgerError::InvalidMovementType {
                movement_id,
                movement_type: original.movement_type,
            });
        }

        if self.store.reversal_of(movement_id).await?.is_some() {
            return Err(LedgerError::AlreadyCancelled(movement_id));
        }

        let outcome = self
            .store
            .append_movement(MovementInsert {
                product_id: original.product_id,
                movement_type: MovementType::CancelSale,
                // The sale stored a negative quantity; the compensating entry
                // restores exactly that magnitude.
                signed_qty: -original.qty,
                unit_price_cents: original.unit_price_cents,
                note: Some(format!("reverses sale {}", original.id)),
                reverses: Some(original.id),
                actor_id: actor.actor_id,
            })
            .await?;

        self.record_audit("ledger.sale.cancelled", &outcome, actor);
        Ok(self.created(outcome, actor))
    }

    /// Directly correct a balance (recount, shrinkage) with justification.
    pub async fn create_adjustment(
        &self,
        product_id: ProductId,
        quantity: i64,
        reason: &str,
        actor: Actor,
    ) -> Result<CreatedMovement, LedgerError> {
        self.create_movement(
            CreateMovement {
                product_id,
                movement_type: MovementType::Adjustment,
                quantity,
                unit_price_cents: None,
                note: Some(reason.to_string()),
            },
            actor,
        )
        .await
    }

    // --- Reads --------------------------------------------------------------

    pub async fn movements(
        &self,
        filter: &MovementFilter,
        page: &PageRequest,
    ) -> Result<MovementPage, LedgerError> {
        self.store.movements(filter, page).await
    }

    pub async fn sales_summary(&self, range: &ReportRange) -> Result<SalesSummary, LedgerError> {
        self.store.sales_summary(range).await
    }

    pub async fn daily_totals(&self, range: &ReportRange) -> Result<Vec<DailyTotal>, LedgerError> {
        self.store.daily_totals(range).await
    }

    pub async fn product_totals(
        &self,
        range: &ReportRange,
    ) -> Result<Vec<ProductTotal>, LedgerError> {
        self.store.product_totals(range).await
    }

    // --- Maintenance --------------------------------------------------------

    /// Detect and repair drift between cached balances and the ledger sum.
    pub async fn verify_consistency(&self) -> Result<Vec<StockRepair>, LedgerError> {
        let repairs = self.store.verify_consistency().await?;
        for repair in &repairs {
            tracing::warn!(
                product_id = %repair.product_id,
                cached = repair.cached,
                calculated = repair.calculated,
                "cached stock diverged from ledger sum; repaired"
            );
        }
        Ok(repairs)
    }

    // --- Internals ----------------------------------------------------------

    fn created(&self, outcome: AppendOutcome, actor: Actor) -> CreatedMovement {
        CreatedMovement {
            movement: outcome.movement,
            product: ProductSummary {
                id: outcome.product.id,
                name: outcome.product.name,
                stock_cached: outcome.product.stock_cached,
            },
            actor: ActorSummary {
                id: actor.actor_id,
                role: actor.role,
            },
        }
    }

    /// Best-effort, post-commit. A sink failure must never roll back or fail
    /// the movement, so it is logged and swallowed here.
    fn record_audit(&self, action: &str, outcome: &AppendOutcome, actor: Actor) {
        let entry = AuditEntry::new(
            actor.actor_id,
            action,
            "inventory_movement",
            outcome.movement.id.to_string(),
            json!({
                "product_id": outcome.movement.product_id,
                "movement_type": outcome.movement.movement_type,
                "qty": outcome.movement.qty,
                "unit_price_cents": outcome.movement.unit_price_cents,
                "note": outcome.movement.note,
                "stock_after": outcome.product.stock_cached,
            }),
        );

        if let Err(e) = self.audit.record(entry) {
            tracing::warn!(error = %e, "audit sink rejected entry; continuing");
        }
    }
}
