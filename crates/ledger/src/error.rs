//! Ledger error taxonomy.
//!
//! Every variant is a deterministic business failure with an actionable
//! message; the enclosing transaction must roll back fully when one is
//! raised. `Storage` is the one infrastructure escape hatch, used by store
//! implementations to surface faults through the same service boundary.

use thiserror::Error;

use stockbook_auth::Role;
use stockbook_core::{MovementId, ProductId};

use crate::movement::MovementType;

/// Result type used across the ledger write/read paths.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller referenced a product that does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Movements may not be created against inactive products.
    #[error("product {0} is inactive and cannot receive movements")]
    ProductInactive(ProductId),

    /// The actor's role is not permitted to create this movement type.
    #[error("role {role} is not permitted to create {movement_type} movements")]
    PermissionDenied {
        role: Role,
        movement_type: MovementType,
    },

    /// The requested outbound quantity would drive the balance negative.
    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    /// Cancellation target does not exist.
    #[error("movement {0} not found")]
    MovementNotFound(MovementId),

    /// Cancellation target is not an offline sale.
    #[error("movement {movement_id} has type {movement_type}; only SALE_OFFLINE movements can be cancelled")]
    InvalidMovementType {
        movement_id: MovementId,
        movement_type: MovementType,
    },

    /// The sale already has a compensating entry.
    #[error("sale {0} has already been cancelled")]
    AlreadyCancelled(MovementId),

    /// Adjustment submitted without justification text.
    #[error("adjustments require a non-empty reason")]
    ReasonRequired,

    /// Quantity failed the sign-policy preconditions.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Input failed validation (supplemental fields, e.g. product name).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Storage-layer fault surfaced through the service boundary.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
