use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use stockbook_core::UserId;

/// One audit record: who did what to which entity.
///
/// `meta` carries operation-specific detail (quantities, notes, balances) as
/// free-form JSON so the trail stays useful without schema churn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub actor_id: UserId,
    /// Dotted action name, e.g. "ledger.movement.created".
    pub action: String,
    /// Entity kind, e.g. "inventory_movement".
    pub entity: String,
    pub entity_id: String,
    pub meta: JsonValue,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        actor_id: UserId,
        action: impl Into<String>,
        entity: impl Into<String>,
        entity_id: impl Into<String>,
        meta: JsonValue,
    ) -> Self {
        Self {
            actor_id,
            action: action.into(),
            entity: entity.into(),
            entity_id: entity_id.into(),
            meta,
            recorded_at: Utc::now(),
        }
    }
}
