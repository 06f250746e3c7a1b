//! Audit sink backed by structured logging.

use crate::entry::AuditEntry;
use crate::sink::{AuditError, AuditSink};

/// Emits each entry as a structured `tracing` event under the `audit` target.
///
/// The default production sink: the trail rides the existing log pipeline and
/// can be filtered with `RUST_LOG=audit=info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            actor_id = %entry.actor_id,
            action = %entry.action,
            entity = %entry.entity,
            entity_id = %entry.entity_id,
            meta = %entry.meta,
            "audit entry"
        );
        Ok(())
    }
}
