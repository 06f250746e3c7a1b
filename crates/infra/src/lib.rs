//! Infrastructure layer: storage backends and the ledger write path.
//!
//! The [`store::LedgerStore`] trait is the transactional unit-of-work
//! boundary: the read-balance → check → append-row → write-balance sequence
//! executes inside one store call and is never split across calls.
//! [`service::LedgerService`] composes the role policy, validation, sign
//! derivation, the store, and the post-commit audit sink into the single
//! write path every caller goes through.

pub mod reports;
pub mod service;
pub mod store;

mod integration_tests;

pub use reports::{DailyTotal, ProductTotal, ReportRange, SalesSummary};
pub use service::{Actor, ActorSummary, CreatedMovement, LedgerService, ProductSummary};
pub use store::{
    AppendOutcome, InMemoryLedgerStore, LedgerStore, MovementInsert, PostgresLedgerStore,
    StockRepair,
};
