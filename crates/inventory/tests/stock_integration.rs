//! Integration tests for the inventory services.
//!
//! These tests run the services against the in-memory ledger store and cover
//! stock arithmetic, atomicity under injected faults, and serialization of
//! concurrent movements on the same product.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use inventory::{
    CatalogService, CreateProduct, InventoryError, RecordTransaction, RegisterUser, StockService,
    UserService,
};
use ledger_store::{
    FailPoint, InMemoryLedgerStore, LedgerStore, Money, Product, ProductId, TransactionKind,
    UnitOfWork, User, UserId,
};

/// Helper to create a store holding one product and one user
async fn setup(quantity: i64) -> (InMemoryLedgerStore, Product, User) {
    let store = InMemoryLedgerStore::new();
    let product = CatalogService::new(store.clone())
        .create_product(
            CreateProduct::new("Widget", Money::from_cents(1000)).with_quantity(quantity),
        )
        .await
        .unwrap();
    let user = UserService::new(store.clone())
        .register(RegisterUser {
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password: "s3cret".to_string(),
            role_id: None,
        })
        .await
        .unwrap();
    (store, product, user)
}

async fn quantity_of(store: &InMemoryLedgerStore, product_id: ProductId) -> i64 {
    store
        .get_product(product_id)
        .await
        .unwrap()
        .unwrap()
        .quantity
}

mod movements {
    use super::*;

    #[tokio::test]
    async fn outbound_within_stock_decrements() {
        let (store, product, user) = setup(10).await;
        let service = StockService::new(store.clone());

        let change = service
            .record(RecordTransaction::outbound(product.id, user.id, 4))
            .await
            .unwrap();

        assert_eq!(change.stock_after, 6);
        assert_eq!(change.transaction.kind, TransactionKind::Outbound);
        assert_eq!(change.transaction.quantity, 4);
        assert_eq!(change.transaction.product_id, product.id);
        assert_eq!(change.transaction.user_id, user.id);
        assert_eq!(quantity_of(&store, product.id).await, 6);

        let rows = store.transactions_for_product(product.id).await.unwrap();
        assert_eq!(rows, vec![change.transaction]);
    }

    #[tokio::test]
    async fn inbound_adds() {
        let (store, product, user) = setup(2).await;
        let service = StockService::new(store.clone());

        let change = service
            .record(RecordTransaction::inbound(product.id, user.id, 8))
            .await
            .unwrap();

        assert_eq!(change.stock_after, 10);
        assert_eq!(quantity_of(&store, product.id).await, 10);
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_state_unchanged() {
        let (store, product, user) = setup(3).await;
        let service = StockService::new(store.clone());

        let result = service
            .record(RecordTransaction::outbound(product.id, user.id, 5))
            .await;

        match result {
            Err(InventoryError::InsufficientStock {
                product_id,
                available,
                requested,
            }) => {
                assert_eq!(product_id, product.id);
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(quantity_of(&store, product.id).await, 3);
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let (store, _, user) = setup(3).await;
        let service = StockService::new(store.clone());

        let result = service
            .record(RecordTransaction::inbound(ProductId::new(), user.id, 1))
            .await;

        assert!(matches!(
            result,
            Err(InventoryError::NotFound { entity: "product", .. })
        ));
    }

    #[tokio::test]
    async fn unknown_user_aborts_the_unit() {
        let (store, product, _) = setup(3).await;
        let service = StockService::new(store.clone());

        let result = service
            .record(RecordTransaction::inbound(product.id, UserId::new(), 1))
            .await;

        assert!(matches!(
            result,
            Err(InventoryError::NotFound { entity: "user", .. })
        ));
        assert_eq!(quantity_of(&store, product.id).await, 3);
        assert_eq!(store.transaction_count().await, 0);
    }
}

mod atomicity {
    use super::*;

    #[tokio::test]
    async fn failure_after_lock_leaves_state_unchanged() {
        for point in [
            FailPoint::WriteQuantity,
            FailPoint::AppendTransaction,
            FailPoint::Commit,
        ] {
            let (store, product, user) = setup(10).await;
            let service = StockService::new(store.clone());
            store.fail_next(point);

            let result = service
                .record(RecordTransaction::outbound(product.id, user.id, 4))
                .await;

            assert!(
                matches!(result, Err(InventoryError::TransactionFailed(_))),
                "{point:?}: {result:?}"
            );
            assert_eq!(quantity_of(&store, product.id).await, 10);
            assert_eq!(store.transaction_count().await, 0);

            // The row lock was released with the aborted unit.
            let change = service
                .record(RecordTransaction::outbound(product.id, user.id, 4))
                .await
                .unwrap();
            assert_eq!(change.stock_after, 6);
        }
    }

    #[tokio::test]
    async fn cancelled_request_releases_its_lock() {
        let (store, product, user) = setup(10).await;
        let service = Arc::new(StockService::new(store.clone()));

        let mut holder = store.begin_unit().await.unwrap();
        holder.lock_product_for_update(product.id).await.unwrap();

        let waiting = {
            let service = Arc::clone(&service);
            let request = RecordTransaction::outbound(product.id, user.id, 1);
            tokio::spawn(async move { service.record(request).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());
        holder.abort().await.unwrap();

        let change = service
            .record(RecordTransaction::outbound(product.id, user.id, 1))
            .await
            .unwrap();
        assert_eq!(change.stock_after, 9);
        assert_eq!(store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn unreachable_store_reprovisions() {
        let (store, product, user) = setup(10).await;
        let service = StockService::new(store.clone());
        store.set_available(false);

        let result = service
            .record(RecordTransaction::inbound(product.id, user.id, 1))
            .await;

        assert!(matches!(result, Err(InventoryError::ServiceUnavailable(_))));
        assert_eq!(store.reprovision_count(), 1);

        store.set_available(true);
        service
            .record(RecordTransaction::inbound(product.id, user.id, 1))
            .await
            .unwrap();
        assert_eq!(quantity_of(&store, product.id).await, 11);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn outbounds_that_fit_all_succeed() {
        let (store, product, user) = setup(100).await;
        let service = Arc::new(StockService::new(store.clone()));

        let tasks = (0..40).map(|_| {
            let service = Arc::clone(&service);
            let request = RecordTransaction::outbound(product.id, user.id, 2);
            tokio::spawn(async move { service.record(request).await })
        });
        let results = join_all(tasks).await;

        assert!(results.into_iter().all(|r| r.unwrap().is_ok()));
        assert_eq!(quantity_of(&store, product.id).await, 20);
        assert_eq!(store.transaction_count().await, 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn oversubscribed_outbounds_never_go_negative() {
        let (store, product, user) = setup(10).await;
        let service = Arc::new(StockService::new(store.clone()));

        let tasks = (0..5).map(|_| {
            let service = Arc::clone(&service);
            let request = RecordTransaction::outbound(product.id, user.id, 3);
            tokio::spawn(async move { service.record(request).await })
        });
        let results: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        let insufficient = results
            .iter()
            .filter(|r| matches!(r, Err(InventoryError::InsufficientStock { .. })))
            .count();

        assert_eq!(succeeded, 3);
        assert_eq!(insufficient, 2);
        assert_eq!(quantity_of(&store, product.id).await, 1);
        assert_eq!(store.transaction_count().await, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn different_products_proceed_independently() {
        let (store, first, user) = setup(5).await;
        let second = CatalogService::new(store.clone())
            .create_product(CreateProduct::new("Gadget", Money::zero()).with_quantity(5))
            .await
            .unwrap();
        let service = Arc::new(StockService::new(store.clone()));

        // Holding the first product's lock must not block the second.
        let mut holder = store.begin_unit().await.unwrap();
        holder.lock_product_for_update(first.id).await.unwrap();

        let change = tokio::time::timeout(
            Duration::from_secs(1),
            service.record(RecordTransaction::outbound(second.id, user.id, 5)),
        )
        .await
        .expect("second product was blocked")
        .unwrap();
        assert_eq!(change.stock_after, 0);

        holder.abort().await.unwrap();
    }
}

mod registration {
    use super::*;

    #[tokio::test]
    async fn duplicate_email_keeps_first_user() {
        let (store, _, first) = setup(0).await;
        let users = UserService::new(store.clone());

        let result = users
            .register(RegisterUser {
                name: "Impostor".to_string(),
                email: "ana@example.com".to_string(),
                password: "other".to_string(),
                role_id: Some(1),
            })
            .await;

        assert!(matches!(result, Err(InventoryError::DuplicateKey { .. })));
        let kept = users.get_user(first.id).await.unwrap();
        assert_eq!(kept.name, "Ana");
        assert_eq!(kept.role_id, 3);
    }
}
