//! `stockbook-audit` — best-effort audit trail.
//!
//! Audit logging is an observability side effect, not a correctness
//! invariant: entries are recorded *after* the primary transaction commits,
//! and a sink failure must never fail or roll back the operation that
//! produced it. Callers log and swallow [`AuditError`]s.

pub mod entry;
pub mod log;
pub mod memory;
pub mod sink;

pub use entry::AuditEntry;
pub use log::TracingAuditSink;
pub use memory::InMemoryAuditSink;
pub use sink::{AuditError, AuditSink};
