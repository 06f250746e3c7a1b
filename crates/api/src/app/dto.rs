use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use stockbook_infra::CreatedMovement;
use stockbook_ledger::{Movement, MovementPage, Product};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: Option<String>,
    pub price_cents: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    pub product_id: String,
    pub movement_type: String,
    pub qty: i64,
    pub unit_price_cents: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustmentRequest {
    pub qty: i64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ListMovementsQuery {
    pub product_id: Option<String>,
    pub movement_type: Option<String>,
    pub actor_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ReportRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn product_to_json(p: &Product) -> JsonValue {
    json!({
        "id": p.id,
        "name": p.name,
        "sku": p.sku,
        "price_cents": p.price_cents,
        "is_active": p.is_active,
        "stock_cached": p.stock_cached,
        "created_at": p.created_at,
    })
}

pub fn movement_to_json(m: &Movement) -> JsonValue {
    json!({
        "id": m.id,
        "product_id": m.product_id,
        "movement_type": m.movement_type,
        "qty": m.qty,
        "unit_price_cents": m.unit_price_cents,
        "note": m.note,
        "reverses_movement_id": m.reverses,
        "actor_id": m.actor_id,
        "created_at": m.created_at,
    })
}

pub fn created_movement_to_json(c: &CreatedMovement) -> JsonValue {
    json!({
        "movement": movement_to_json(&c.movement),
        "product": {
            "id": c.product.id,
            "name": c.product.name,
            "stock_cached": c.product.stock_cached,
        },
        "actor": {
            "id": c.actor.id,
            "role": c.actor.role,
        },
    })
}

pub fn movement_page_to_json(page: &MovementPage) -> JsonValue {
    json!({
        "movements": page.movements.iter().map(movement_to_json).collect::<Vec<_>>(),
        "has_more": page.has_more,
        "next_cursor": page.next_cursor.map(|c| c.to_string()),
    })
}
