use std::sync::Arc;

use thiserror::Error;

use crate::entry::AuditEntry;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// The sink could not accept the entry (lock poisoned, transport down).
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for audit entries.
///
/// Contract: `record` is called after the primary transaction has committed,
/// and the caller treats a returned error as log-and-continue. Sinks must not
/// panic and must not block for long; they sit on the request path.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        (**self).record(entry)
    }
}
