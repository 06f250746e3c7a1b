use std::sync::Arc;

use stockbook_audit::{AuditSink, TracingAuditSink};
use stockbook_infra::{InMemoryLedgerStore, LedgerService, LedgerStore, PostgresLedgerStore};

/// Application services shared across handlers.
pub struct AppServices {
    pub ledger: LedgerService,
}

impl AppServices {
    pub fn in_memory() -> Self {
        let store: Arc<dyn LedgerStore> = Arc::new(InMemoryLedgerStore::new());
        Self::with_store(store)
    }

    pub fn with_store(store: Arc<dyn LedgerStore>) -> Self {
        let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink::new());
        Self {
            ledger: LedgerService::new(store, audit),
        }
    }
}

/// Wire the backend from the environment.
///
/// `USE_PERSISTENT_STORE=true` selects Postgres (requires `DATABASE_URL`,
/// runs embedded migrations); anything else gets the in-memory store.
pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORE")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set when USE_PERSISTENT_STORE=true");

        let store = PostgresLedgerStore::connect(&database_url)
            .await
            .expect("failed to connect to Postgres");
        store.migrate().await.expect("failed to run migrations");

        tracing::info!("using Postgres ledger store");
        AppServices::with_store(Arc::new(store))
    } else {
        tracing::info!("using in-memory ledger store");
        AppServices::in_memory()
    }
}
