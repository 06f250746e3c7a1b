use axum::{Router, routing::get};

pub mod admin;
pub mod movements;
pub mod products;
pub mod reports;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/products", products::router())
        .nest("/movements", movements::router())
        .nest("/reports", reports::router())
        .nest("/admin", admin::router())
}
