use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use stockbook_core::{MovementId, ProductId, UserId};
use stockbook_ledger::{
    CreateMovement, MovementCursor, MovementFilter, MovementType, PageRequest,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_movement).get(list_movements))
        .route("/:id/cancel", post(cancel_sale))
}

pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<dto::CreateMovementRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match body.product_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    let movement_type: MovementType = match body.movement_type.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_movement_type",
                "movement_type must be one of: SALE_OFFLINE, RETURN, CANCEL_SALE, LOSS, ADJUSTMENT",
            );
        }
    };

    let cmd = CreateMovement {
        product_id,
        movement_type,
        quantity: body.qty,
        unit_price_cents: body.unit_price_cents,
        note: body.note,
    };

    match services.ledger.create_movement(cmd, actor.actor()).await {
        Ok(created) => (
            StatusCode::CREATED,
            Json(dto::created_movement_to_json(&created)),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ListMovementsQuery>,
) -> axum::response::Response {
    let product_id: Option<ProductId> = match query.product_id.as_deref().map(str::parse) {
        Some(Ok(v)) => Some(v),
        Some(Err(_)) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
        None => None,
    };

    let movement_type: Option<MovementType> = match query.movement_type.as_deref().map(str::parse) {
        Some(Ok(v)) => Some(v),
        Some(Err(_)) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_movement_type",
                "unknown movement_type filter",
            );
        }
        None => None,
    };

    let actor_id: Option<UserId> = match query.actor_id.as_deref().map(str::parse) {
        Some(Ok(v)) => Some(v),
        Some(Err(_)) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid actor id");
        }
        None => None,
    };

    let cursor: Option<MovementCursor> = match query.cursor.as_deref().map(str::parse) {
        Some(Ok(v)) => Some(v),
        Some(Err(_)) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_cursor",
                "cursor is malformed; pass the next_cursor of a previous page",
            );
        }
        None => None,
    };

    let filter = MovementFilter {
        product_id,
        movement_type,
        actor_id,
        from: query.from,
        to: query.to,
    };
    let page = PageRequest::new(cursor, query.limit);

    match services.ledger.movements(&filter, &page).await {
        Ok(page) => (StatusCode::OK, Json(dto::movement_page_to_json(&page))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Owner-only compensating entry for a prior offline sale.
pub async fn cancel_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: MovementId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid movement id",
            );
        }
    };

    match services.ledger.cancel_sale(id, actor.actor()).await {
        Ok(created) => (
            StatusCode::CREATED,
            Json(dto::created_movement_to_json(&created)),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
