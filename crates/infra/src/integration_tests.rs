//! Integration tests for the ledger write path against the in-memory store.
//!
//! Tests: LedgerService → LedgerStore → cached balance + audit sink.
//!
//! Verifies:
//! - the cached balance always equals the signed ledger sum
//! - rejected movements write nothing (row absent, balance unchanged)
//! - cancellation is exact and single-shot
//! - the role policy denies before storage is touched
//! - audit failures never fail the movement

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stockbook_audit::{AuditEntry, AuditError, AuditSink, InMemoryAuditSink};
    use stockbook_auth::Role;
    use stockbook_core::{MovementId, ProductId, UserId};
    use stockbook_ledger::{
        CreateMovement, LedgerError, MovementFilter, MovementType, NewProduct, PageRequest,
        Product,
    };

    use crate::reports::ReportRange;
    use crate::service::{Actor, LedgerService};
    use crate::store::{InMemoryLedgerStore, LedgerStore};

    fn staff() -> Actor {
        Actor {
            actor_id: UserId::new(),
            role: Role::Staff,
        }
    }

    fn owner() -> Actor {
        Actor {
            actor_id: UserId::new(),
            role: Role::Owner,
        }
    }

    fn setup() -> (LedgerService, Arc<InMemoryLedgerStore>, Arc<InMemoryAuditSink>) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let service = LedgerService::new(store.clone(), audit.clone());
        (service, store, audit)
    }

    async fn seeded_product(service: &LedgerService, initial_stock: i64) -> Product {
        let product = service
            .create_product(NewProduct {
                name: "House Blend 250g".to_string(),
                sku: Some("BLND-250".to_string()),
                price_cents: Some(1200),
            })
            .await
            .unwrap();

        if initial_stock != 0 {
            service
                .create_adjustment(product.id, initial_stock, "opening count", owner())
                .await
                .unwrap();
        }

        service.product(product.id).await.unwrap()
    }

    fn sale(product_id: ProductId, qty: i64) -> CreateMovement {
        CreateMovement {
            product_id,
            movement_type: MovementType::SaleOffline,
            quantity: qty,
            unit_price_cents: None,
            note: None,
        }
    }

    async fn ledger_sum(store: &InMemoryLedgerStore, product_id: ProductId) -> i64 {
        let page = store
            .movements(
                &MovementFilter {
                    product_id: Some(product_id),
                    ..Default::default()
                },
                &PageRequest::new(None, Some(PageRequest::MAX_LIMIT)),
            )
            .await
            .unwrap();
        assert!(!page.has_more, "test ledger exceeded one page");
        page.movements.iter().map(|m| m.qty).sum()
    }

    #[tokio::test]
    async fn sale_reduces_balance_and_stores_negative_qty() {
        let (service, store, _) = setup();
        let product = seeded_product(&service, 10).await;

        let created = service
            .create_movement(sale(product.id, 3), staff())
            .await
            .unwrap();

        assert_eq!(created.movement.qty, -3);
        assert_eq!(created.movement.movement_type, MovementType::SaleOffline);
        // Price snapshot defaults to the product's list price.
        assert_eq!(created.movement.unit_price_cents, Some(1200));
        assert_eq!(created.product.stock_cached, 7);
        assert_eq!(service.product(product.id).await.unwrap().stock_cached, 7);
        assert_eq!(ledger_sum(&store, product.id).await, 7);
    }

    #[tokio::test]
    async fn overdraw_is_rejected_in_full_and_rejection_is_idempotent() {
        let (service, store, _) = setup();
        let product = seeded_product(&service, 7).await;

        for _ in 0..2 {
            let err = service
                .create_movement(sale(product.id, 20), staff())
                .await
                .unwrap_err();
            assert_eq!(
                err,
                LedgerError::InsufficientStock {
                    available: 7,
                    requested: 20,
                }
            );
            assert_eq!(service.product(product.id).await.unwrap().stock_cached, 7);
        }

        // Only the opening adjustment is in the ledger.
        let page = store
            .movements(
                &MovementFilter {
                    product_id: Some(product.id),
                    ..Default::default()
                },
                &PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.movements.len(), 1);
    }

    #[tokio::test]
    async fn balance_matches_ledger_sum_across_mixed_sequence() {
        let (service, store, _) = setup();
        let product = seeded_product(&service, 50).await;

        service
            .create_movement(sale(product.id, 5), staff())
            .await
            .unwrap();
        service
            .create_movement(
                CreateMovement {
                    product_id: product.id,
                    movement_type: MovementType::Return,
                    quantity: 2,
                    unit_price_cents: Some(1100),
                    note: Some("creased box".to_string()),
                },
                staff(),
            )
            .await
            .unwrap();
        service
            .create_movement(
                CreateMovement {
                    product_id: product.id,
                    movement_type: MovementType::Loss,
                    quantity: 4,
                    unit_price_cents: None,
                    note: Some("water damage".to_string()),
                },
                owner(),
            )
            .await
            .unwrap();
        service
            .create_adjustment(product.id, -3, "recount", owner())
            .await
            .unwrap();

        let product = service.product(product.id).await.unwrap();
        assert_eq!(product.stock_cached, 50 - 5 + 2 - 4 - 3);
        assert_eq!(ledger_sum(&store, product.id).await, product.stock_cached);
    }

    #[tokio::test]
    async fn cancellation_restores_balance_and_cannot_repeat() {
        let (service, _, _) = setup();
        let product = seeded_product(&service, 10).await;

        let sale_created = service
            .create_movement(sale(product.id, 3), staff())
            .await
            .unwrap();
        assert_eq!(sale_created.product.stock_cached, 7);

        let cancel = service
            .cancel_sale(sale_created.movement.id, owner())
            .await
            .unwrap();
        assert_eq!(cancel.movement.movement_type, MovementType::CancelSale);
        assert_eq!(cancel.movement.qty, 3);
        assert_eq!(cancel.movement.reverses, Some(sale_created.movement.id));
        assert_eq!(
            cancel.movement.unit_price_cents,
            sale_created.movement.unit_price_cents
        );
        assert_eq!(cancel.product.stock_cached, 10);

        let err = service
            .cancel_sale(sale_created.movement.id, owner())
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::AlreadyCancelled(sale_created.movement.id));
        assert_eq!(service.product(product.id).await.unwrap().stock_cached, 10);
    }

    #[tokio::test]
    async fn cancellation_rejects_missing_and_non_sale_targets() {
        let (service, _, _) = setup();
        let product = seeded_product(&service, 10).await;

        let missing = MovementId::new();
        assert_eq!(
            service.cancel_sale(missing, owner()).await.unwrap_err(),
            LedgerError::MovementNotFound(missing)
        );

        let adjustment = service
            .create_adjustment(product.id, -1, "recount", owner())
            .await
            .unwrap();
        let err = service
            .cancel_sale(adjustment.movement.id, owner())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidMovementType {
                movement_id: adjustment.movement.id,
                movement_type: MovementType::Adjustment,
            }
        );
    }

    #[tokio::test]
    async fn adjustment_requires_a_reason() {
        let (service, _, _) = setup();
        let product = seeded_product(&service, 10).await;

        service
            .create_adjustment(product.id, -2, "breakage", owner())
            .await
            .unwrap();
        assert_eq!(service.product(product.id).await.unwrap().stock_cached, 8);

        for reason in ["", "   "] {
            let err = service
                .create_adjustment(product.id, -2, reason, owner())
                .await
                .unwrap_err();
            assert_eq!(err, LedgerError::ReasonRequired);
        }
        assert_eq!(service.product(product.id).await.unwrap().stock_cached, 8);
    }

    #[tokio::test]
    async fn staff_is_denied_owner_only_types_with_no_row_written() {
        let (service, store, _) = setup();
        let product = seeded_product(&service, 10).await;

        for ty in [
            MovementType::Adjustment,
            MovementType::Loss,
            MovementType::CancelSale,
        ] {
            let err = service
                .create_movement(
                    CreateMovement {
                        product_id: product.id,
                        movement_type: ty,
                        quantity: 5,
                        unit_price_cents: None,
                        note: Some("should never land".to_string()),
                    },
                    staff(),
                )
                .await
                .unwrap_err();
            assert_eq!(
                err,
                LedgerError::PermissionDenied {
                    role: Role::Staff,
                    movement_type: ty,
                }
            );
        }

        assert_eq!(service.product(product.id).await.unwrap().stock_cached, 10);
        assert_eq!(ledger_sum(&store, product.id).await, 10);
    }

    #[tokio::test]
    async fn inactive_products_reject_movements() {
        let (service, _, _) = setup();
        let product = seeded_product(&service, 10).await;

        service.set_product_active(product.id, false).await.unwrap();
        let err = service
            .create_movement(sale(product.id, 1), staff())
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::ProductInactive(product.id));

        service.set_product_active(product.id, true).await.unwrap();
        assert!(service.create_movement(sale(product.id, 1), staff()).await.is_ok());
    }

    #[tokio::test]
    async fn free_floating_cancel_sale_is_rejected_even_for_owner() {
        let (service, store, _) = setup();
        let product = seeded_product(&service, 10).await;

        let err = service
            .create_movement(
                CreateMovement {
                    product_id: product.id,
                    movement_type: MovementType::CancelSale,
                    quantity: 2,
                    unit_price_cents: None,
                    note: None,
                },
                owner(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(ledger_sum(&store, product.id).await, 10);
    }

    #[tokio::test]
    async fn unknown_product_is_reported_before_any_write() {
        let (service, _, _) = setup();
        let missing = ProductId::new();
        let err = service
            .create_movement(sale(missing, 1), staff())
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::ProductNotFound(missing));
    }

    #[tokio::test]
    async fn listing_pages_newest_first_without_overlap() {
        let (service, _, _) = setup();
        let product = seeded_product(&service, 100).await;

        for _ in 0..7 {
            service
                .create_movement(sale(product.id, 1), staff())
                .await
                .unwrap();
        }

        let filter = MovementFilter {
            product_id: Some(product.id),
            movement_type: Some(MovementType::SaleOffline),
            ..Default::default()
        };

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = service
                .movements(&filter, &PageRequest::new(cursor, Some(3)))
                .await
                .unwrap();
            seen.extend(page.movements.iter().map(|m| m.id));
            for pair in page.movements.windows(2) {
                assert!(
                    (pair[0].created_at, pair[0].id) > (pair[1].created_at, pair[1].id),
                    "page not ordered newest first"
                );
            }
            if !page.has_more {
                break;
            }
            cursor = page.next_cursor;
        }

        assert_eq!(seen.len(), 7);
        let mut dedup = seen.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), 7, "pages overlapped");
    }

    #[tokio::test]
    async fn listing_filters_by_actor_and_type() {
        let (service, _, _) = setup();
        let product = seeded_product(&service, 20).await;
        let till_one = staff();
        let till_two = staff();

        service
            .create_movement(sale(product.id, 1), till_one)
            .await
            .unwrap();
        service
            .create_movement(sale(product.id, 2), till_two)
            .await
            .unwrap();

        let page = service
            .movements(
                &MovementFilter {
                    actor_id: Some(till_one.actor_id),
                    ..Default::default()
                },
                &PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.movements.len(), 1);
        assert_eq!(page.movements[0].actor_id, till_one.actor_id);

        let page = service
            .movements(
                &MovementFilter {
                    movement_type: Some(MovementType::Adjustment),
                    ..Default::default()
                },
                &PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.movements.len(), 1, "only the opening count");
    }

    #[tokio::test]
    async fn reports_net_out_cancellations() {
        let (service, _, _) = setup();
        let product = seeded_product(&service, 50).await;

        service
            .create_movement(sale(product.id, 3), staff())
            .await
            .unwrap();
        let second = service
            .create_movement(sale(product.id, 2), staff())
            .await
            .unwrap();
        service
            .cancel_sale(second.movement.id, owner())
            .await
            .unwrap();

        let summary = service
            .sales_summary(&ReportRange::default())
            .await
            .unwrap();
        assert_eq!(summary.sales, 2);
        assert_eq!(summary.cancellations, 1);
        assert_eq!(summary.units_sold, 3);
        assert_eq!(summary.gross_revenue_cents, 3 * 1200);

        let daily = service.daily_totals(&ReportRange::default()).await.unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].units_sold, 3);
        assert_eq!(daily[0].revenue_cents, 3 * 1200);

        let by_product = service
            .product_totals(&ReportRange::default())
            .await
            .unwrap();
        assert_eq!(by_product.len(), 1);
        assert_eq!(by_product[0].product_id, product.id);
        assert_eq!(by_product[0].units_sold, 3);
    }

    #[tokio::test]
    async fn consistency_check_repairs_drifted_balances() {
        let (service, store, _) = setup();
        let product = seeded_product(&service, 10).await;
        service
            .create_movement(sale(product.id, 4), staff())
            .await
            .unwrap();

        // No drift: nothing to repair.
        assert!(service.verify_consistency().await.unwrap().is_empty());

        store.force_stock(product.id, 99);
        let repairs = service.verify_consistency().await.unwrap();
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].product_id, product.id);
        assert_eq!(repairs[0].cached, 99);
        assert_eq!(repairs[0].calculated, 6);
        assert_eq!(service.product(product.id).await.unwrap().stock_cached, 6);

        // Second run finds nothing.
        assert!(service.verify_consistency().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_movements_are_audited_and_failures_are_not() {
        let (service, _, audit) = setup();
        let product = seeded_product(&service, 5).await;

        service
            .create_movement(sale(product.id, 2), staff())
            .await
            .unwrap();
        let _ = service
            .create_movement(sale(product.id, 50), staff())
            .await
            .unwrap_err();

        let entries = audit.entries();
        // Opening adjustment + one successful sale.
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, "ledger.movement.created");
        assert_eq!(entries[1].meta["qty"], -2);
        assert_eq!(entries[1].meta["stock_after"], 3);
    }

    /// Sink that always fails; the movement must still commit.
    struct BrokenSink;

    impl AuditSink for BrokenSink {
        fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
            Err(AuditError::Unavailable("wired to fail".to_string()))
        }
    }

    #[tokio::test]
    async fn audit_failure_never_rolls_back_the_movement() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let service = LedgerService::new(store.clone(), Arc::new(BrokenSink));

        let product = service
            .create_product(NewProduct {
                name: "Gift Card".to_string(),
                sku: None,
                price_cents: Some(2500),
            })
            .await
            .unwrap();
        service
            .create_adjustment(product.id, 3, "opening count", owner())
            .await
            .unwrap();

        let created = service
            .create_movement(sale(product.id, 1), staff())
            .await
            .unwrap();
        assert_eq!(created.product.stock_cached, 2);
        assert_eq!(service.product(product.id).await.unwrap().stock_cached, 2);
    }
}
