use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockbook_infra::ReportRange;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/summary", get(summary))
        .route("/daily", get(daily))
        .route("/products", get(by_product))
}

fn range(query: &dto::ReportRangeQuery) -> ReportRange {
    ReportRange {
        from: query.from,
        to: query.to,
    }
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<dto::ReportRangeQuery>,
) -> axum::response::Response {
    if !actor.is_owner() {
        return errors::owner_only();
    }

    match services.ledger.sales_summary(&range(&query)).await {
        Ok(summary) => (StatusCode::OK, Json(serde_json::json!(summary))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn daily(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<dto::ReportRangeQuery>,
) -> axum::response::Response {
    if !actor.is_owner() {
        return errors::owner_only();
    }

    match services.ledger.daily_totals(&range(&query)).await {
        Ok(days) => {
            (StatusCode::OK, Json(serde_json::json!({ "days": days }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn by_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Query(query): Query<dto::ReportRangeQuery>,
) -> axum::response::Response {
    if !actor.is_owner() {
        return errors::owner_only();
    }

    match services.ledger.product_totals(&range(&query)).await {
        Ok(products) => (
            StatusCode::OK,
            Json(serde_json::json!({ "products": products })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
