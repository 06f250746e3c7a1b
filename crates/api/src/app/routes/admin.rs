use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::post,
};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new().route("/consistency-check", post(consistency_check))
}

/// Recompute every product's ledger sum and repair drifted cached balances.
///
/// Maintenance endpoint, not part of the online write path.
pub async fn consistency_check(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    if !actor.is_owner() {
        return errors::owner_only();
    }

    match services.ledger.verify_consistency().await {
        Ok(repairs) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "repaired": repairs.len(),
                "repairs": repairs,
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
