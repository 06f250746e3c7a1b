use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockbook_core::{MovementId, ProductId, UserId};

use crate::error::LedgerError;

/// The closed set of stock-affecting event kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    /// Over-the-counter sale; outbound.
    SaleOffline,
    /// Customer return; inbound.
    Return,
    /// Compensating entry reversing a prior sale; inbound.
    CancelSale,
    /// Shrinkage, breakage, theft; outbound.
    Loss,
    /// Free-form signed correction with a mandatory reason.
    Adjustment,
}

/// How the stored sign of a movement's quantity is derived from the caller's
/// input.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SignPolicy {
    /// Caller supplies a positive quantity; stored negated.
    Outbound,
    /// Caller supplies a positive quantity; stored as-is.
    Inbound,
    /// Caller supplies a non-zero signed quantity; stored unchanged.
    Signed,
}

impl MovementType {
    pub const ALL: [MovementType; 5] = [
        MovementType::SaleOffline,
        MovementType::Return,
        MovementType::CancelSale,
        MovementType::Loss,
        MovementType::Adjustment,
    ];

    /// Sign convention for this movement type.
    ///
    /// A total table over the closed enum: adding a variant without deciding
    /// its direction fails to compile.
    pub fn sign_policy(self) -> SignPolicy {
        match self {
            MovementType::SaleOffline | MovementType::Loss => SignPolicy::Outbound,
            MovementType::Return | MovementType::CancelSale => SignPolicy::Inbound,
            MovementType::Adjustment => SignPolicy::Signed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::SaleOffline => "SALE_OFFLINE",
            MovementType::Return => "RETURN",
            MovementType::CancelSale => "CANCEL_SALE",
            MovementType::Loss => "LOSS",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A movement-type string did not name a known type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown movement type: {0}")]
pub struct UnknownMovementType(pub String);

impl FromStr for MovementType {
    type Err = UnknownMovementType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMovementType(s.to_string()))
    }
}

/// Derive the stored (signed) quantity from the caller's input.
///
/// Outbound types store `-qty`, inbound types store `+qty`; both require a
/// positive input. Adjustments pass the caller's signed value through and
/// only reject zero.
pub fn signed_quantity(movement_type: MovementType, qty: i64) -> Result<i64, LedgerError> {
    match movement_type.sign_policy() {
        SignPolicy::Outbound => {
            if qty <= 0 {
                return Err(LedgerError::invalid_quantity(format!(
                    "{movement_type} quantity must be a positive integer, got {qty}"
                )));
            }
            Ok(-qty)
        }
        SignPolicy::Inbound => {
            if qty <= 0 {
                return Err(LedgerError::invalid_quantity(format!(
                    "{movement_type} quantity must be a positive integer, got {qty}"
                )));
            }
            Ok(qty)
        }
        SignPolicy::Signed => {
            if qty == 0 {
                return Err(LedgerError::invalid_quantity(
                    "adjustment quantity must be non-zero",
                ));
            }
            Ok(qty)
        }
    }
}

/// One ledger entry. Immutable once created; the ledger is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub movement_type: MovementType,
    /// Stored signed quantity (outbound negative, inbound positive).
    pub qty: i64,
    /// Per-unit price snapshot at the time of the movement, in cents.
    pub unit_price_cents: Option<i64>,
    pub note: Option<String>,
    /// For `CANCEL_SALE` entries: the sale this entry reverses.
    pub reverses: Option<MovementId>,
    pub actor_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Command: record a stock-affecting event against a product.
///
/// `quantity` follows the caller-side convention: positive for all types
/// except `ADJUSTMENT`, where it is the signed delta itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMovement {
    pub product_id: ProductId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub unit_price_cents: Option<i64>,
    pub note: Option<String>,
}

/// Filter criteria for movement listings. All fields are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub product_id: Option<ProductId>,
    pub movement_type: Option<MovementType>,
    pub actor_id: Option<UserId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Keyset cursor for movement listings.
///
/// Listings are ordered newest first by `(created_at desc, id desc)`; the
/// cursor names the last row of the previous page. Encoded on the wire as
/// `<micros-since-epoch>:<movement-uuid>`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MovementCursor {
    pub created_at: DateTime<Utc>,
    pub id: MovementId,
}

impl MovementCursor {
    pub fn after(movement: &Movement) -> Self {
        Self {
            created_at: movement.created_at,
            id: movement.id,
        }
    }
}

impl core::fmt::Display for MovementCursor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.created_at.timestamp_micros(), self.id)
    }
}

/// A cursor string failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid cursor: {0}")]
pub struct CursorParseError(String);

impl FromStr for MovementCursor {
    type Err = CursorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (micros, id) = s
            .split_once(':')
            .ok_or_else(|| CursorParseError(s.to_string()))?;
        let micros: i64 = micros
            .parse()
            .map_err(|_| CursorParseError(s.to_string()))?;
        let created_at = DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| CursorParseError(s.to_string()))?;
        let id: MovementId = id.parse().map_err(|_| CursorParseError(s.to_string()))?;
        Ok(Self { created_at, id })
    }
}

/// Page bounds for movement listings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<MovementCursor>,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 500;

    pub fn new(cursor: Option<MovementCursor>, limit: Option<u32>) -> Self {
        Self {
            cursor,
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of a movement listing, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementPage {
    pub movements: Vec<Movement>,
    pub has_more: bool,
    pub next_cursor: Option<MovementCursor>,
}
