use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::context::ActorContext;

pub async fn health() -> axum::response::Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

pub async fn whoami(Extension(actor): Extension<ActorContext>) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "actor_id": actor.actor_id(),
            "role": actor.role(),
        })),
    )
        .into_response()
}
