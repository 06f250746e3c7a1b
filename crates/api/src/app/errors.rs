use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockbook_ledger::LedgerError;

/// Map a ledger error to a structured HTTP response.
///
/// Every body is `{ "error": <code>, "message": <actionable text> }`; the
/// message comes from the error's `Display` so the UI can show it verbatim.
pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    let message = err.to_string();
    let (status, code) = match &err {
        LedgerError::ProductNotFound(_) | LedgerError::MovementNotFound(_) => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        LedgerError::PermissionDenied { .. } => (StatusCode::FORBIDDEN, "forbidden"),
        LedgerError::AlreadyCancelled(_) => (StatusCode::CONFLICT, "already_cancelled"),
        LedgerError::ProductInactive(_) => (StatusCode::UNPROCESSABLE_ENTITY, "product_inactive"),
        LedgerError::InsufficientStock { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock")
        }
        LedgerError::InvalidMovementType { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_movement_type")
        }
        LedgerError::ReasonRequired => (StatusCode::BAD_REQUEST, "reason_required"),
        LedgerError::InvalidQuantity(_) => (StatusCode::BAD_REQUEST, "invalid_quantity"),
        LedgerError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        LedgerError::Storage(_) => {
            tracing::error!(error = %err, "storage failure");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "an internal storage error occurred",
            );
        }
    };

    json_error(status, code, message)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 403 for routes gated on the owner role at the API boundary.
pub fn owner_only() -> axum::response::Response {
    json_error(
        StatusCode::FORBIDDEN,
        "forbidden",
        "this operation requires the OWNER role",
    )
}
