//! In-memory audit sink for tests/dev.

use std::sync::Mutex;

use crate::entry::AuditEntry;
use crate::sink::{AuditError, AuditSink};

/// Collects entries in memory; inspectable from tests.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AuditError::Unavailable("lock poisoned".to_string()))?;
        entries.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stockbook_core::UserId;

    #[test]
    fn records_are_inspectable_in_order() {
        let sink = InMemoryAuditSink::new();
        let actor = UserId::new();

        sink.record(AuditEntry::new(
            actor,
            "ledger.movement.created",
            "inventory_movement",
            "m-1",
            json!({"qty": -3}),
        ))
        .unwrap();
        sink.record(AuditEntry::new(
            actor,
            "ledger.movement.created",
            "inventory_movement",
            "m-2",
            json!({"qty": 3}),
        ))
        .unwrap();

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entity_id, "m-1");
        assert_eq!(entries[1].entity_id, "m-2");
        assert_eq!(entries[0].meta["qty"], -3);
    }
}
