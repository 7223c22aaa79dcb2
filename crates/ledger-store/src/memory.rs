use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedSemaphorePermit, RwLock, Semaphore};

use crate::model::KNOWN_ROLES;
use crate::{
    Clock, LedgerEntry, NewProduct, NewTransaction, NewUser, Product, ProductId, Result,
    StoreError, SystemClock, Transaction, TransactionId, User, UserId,
    store::{LedgerStore, UnitOfWork},
};

const DEFAULT_MAX_CONNECTIONS: usize = 20;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Points at which the in-memory store can be told to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    BeginUnit,
    LockProduct,
    WriteQuantity,
    AppendTransaction,
    Commit,
}

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    users: HashMap<UserId, User>,
    transactions: Vec<Transaction>,
}

struct Shared {
    tables: RwLock<Tables>,
    /// One mutex per product row; holding the guard is holding `FOR UPDATE`.
    row_locks: StdMutex<HashMap<ProductId, Arc<Mutex<()>>>>,
    connections: Arc<Semaphore>,
    acquire_timeout: Duration,
    clock: Arc<dyn Clock>,
    faults: StdMutex<HashSet<FailPoint>>,
    available: AtomicBool,
    reprovisions: AtomicU64,
}

impl Shared {
    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn trip(&self, point: FailPoint) -> Result<()> {
        let armed = self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&point);
        if armed {
            tracing::debug!(?point, "injecting storage fault");
            Err(StoreError::InjectedFault(point))
        } else {
            Ok(())
        }
    }

    fn row_lock(&self, product_id: ProductId) -> Arc<Mutex<()>> {
        self.row_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(product_id)
            .or_default()
            .clone()
    }

    /// Drops the lock entry for `product_id` unless another unit holds or
    /// awaits it.
    fn prune_row_lock(&self, product_id: ProductId) {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&product_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&product_id);
        }
    }

    async fn acquire(self: &Arc<Self>) -> Result<OwnedSemaphorePermit> {
        self.check_available()?;
        let permit =
            tokio::time::timeout(self.acquire_timeout, self.connections.clone().acquire_owned())
                .await;
        match permit {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(StoreError::Unavailable(
                "connection pool closed".to_string(),
            )),
            Err(_) => Err(StoreError::PoolTimedOut),
        }
    }
}

/// In-memory ledger store implementation for testing and local runs.
///
/// Mirrors the PostgreSQL implementation: a semaphore bounds concurrent
/// "connections", each product row has its own lock for `FOR UPDATE`
/// semantics, and unit writes are staged and applied under a single write
/// lock at commit.
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store that stamps transactions with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, DEFAULT_MAX_CONNECTIONS, DEFAULT_ACQUIRE_TIMEOUT)
    }

    /// Creates an empty store with an explicit connection bound.
    pub fn with_limits(
        clock: Arc<dyn Clock>,
        max_connections: usize,
        acquire_timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(Tables::default()),
                row_locks: StdMutex::new(HashMap::new()),
                connections: Arc::new(Semaphore::new(max_connections)),
                acquire_timeout,
                clock,
                faults: StdMutex::new(HashSet::new()),
                available: AtomicBool::new(true),
                reprovisions: AtomicU64::new(0),
            }),
        }
    }

    /// Makes the next operation reaching `point` fail with `InjectedFault`.
    pub fn fail_next(&self, point: FailPoint) {
        self.shared
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point);
    }

    /// Simulates the store becoming unreachable (or reachable again).
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Number of times [`LedgerStore::reprovision`] was called.
    pub fn reprovision_count(&self) -> u64 {
        self.shared.reprovisions.load(Ordering::SeqCst)
    }

    /// Total number of committed transactions.
    pub async fn transaction_count(&self) -> usize {
        self.shared.tables.read().await.transactions.len()
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Unit of work over [`InMemoryLedgerStore`].
pub struct InMemoryUnit {
    shared: Arc<Shared>,
    _connection: OwnedSemaphorePermit,
    locks: HashMap<ProductId, OwnedMutexGuard<()>>,
    quantities: HashMap<ProductId, i64>,
    pending: Vec<(TransactionId, NewTransaction)>,
}

#[async_trait]
impl UnitOfWork for InMemoryUnit {
    async fn lock_product_for_update(&mut self, product_id: ProductId) -> Result<Product> {
        self.shared.trip(FailPoint::LockProduct)?;

        if !self.locks.contains_key(&product_id) {
            let guard = self.shared.row_lock(product_id).lock_owned().await;
            self.locks.insert(product_id, guard);
        }

        let product = self
            .shared
            .tables
            .read()
            .await
            .products
            .get(&product_id)
            .cloned();

        match product {
            Some(mut product) => {
                if let Some(staged) = self.quantities.get(&product_id) {
                    product.quantity = *staged;
                }
                Ok(product)
            }
            None => {
                drop(self.locks.remove(&product_id));
                self.shared.prune_row_lock(product_id);
                Err(StoreError::ProductNotFound(product_id))
            }
        }
    }

    async fn write_product_quantity(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()> {
        self.shared.trip(FailPoint::WriteQuantity)?;
        if !self.locks.contains_key(&product_id) {
            return Err(StoreError::LockNotHeld(product_id));
        }
        self.quantities.insert(product_id, quantity);
        Ok(())
    }

    async fn append_transaction(&mut self, transaction: NewTransaction) -> Result<TransactionId> {
        self.shared.trip(FailPoint::AppendTransaction)?;
        {
            let tables = self.shared.tables.read().await;
            if !tables.products.contains_key(&transaction.product_id) {
                return Err(StoreError::ProductNotFound(transaction.product_id));
            }
            if !tables.users.contains_key(&transaction.user_id) {
                return Err(StoreError::UserNotFound(transaction.user_id));
            }
        }
        let id = TransactionId::new();
        self.pending.push((id, transaction));
        Ok(id)
    }

    async fn commit(mut self) -> Result<Vec<Transaction>> {
        let shared = Arc::clone(&self.shared);
        shared.check_available()?;
        shared.trip(FailPoint::Commit)?;

        let committed_at = shared.clock.now();
        let mut tables = shared.tables.write().await;

        for (product_id, quantity) in self.quantities.drain() {
            if let Some(product) = tables.products.get_mut(&product_id) {
                product.quantity = quantity;
            }
        }

        let committed: Vec<Transaction> = self
            .pending
            .drain(..)
            .map(|(id, t)| Transaction {
                id,
                kind: t.kind,
                quantity: t.quantity,
                product_id: t.product_id,
                user_id: t.user_id,
                created_at: committed_at,
            })
            .collect();
        tables.transactions.extend(committed.iter().cloned());

        // Writes are visible before the row locks held by `self` are released.
        drop(tables);
        Ok(committed)
    }

    async fn abort(self) -> Result<()> {
        tracing::debug!(
            locked_rows = self.locks.len(),
            discarded = self.pending.len(),
            "unit aborted"
        );
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Unit = InMemoryUnit;

    async fn begin_unit(&self) -> Result<InMemoryUnit> {
        let connection = self.shared.acquire().await?;
        self.shared.trip(FailPoint::BeginUnit)?;
        Ok(InMemoryUnit {
            shared: Arc::clone(&self.shared),
            _connection: connection,
            locks: HashMap::new(),
            quantities: HashMap::new(),
            pending: Vec::new(),
        })
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let _connection = self.shared.acquire().await?;
        let mut tables = self.shared.tables.write().await;

        if tables.products.values().any(|p| p.name == product.name) {
            return Err(StoreError::Duplicate {
                constraint: "products_name_key".to_string(),
            });
        }

        let row = Product {
            id: ProductId::new(),
            name: product.name,
            description: product.description,
            unit_price: product.unit_price,
            quantity: product.quantity,
        };
        tables.products.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let _connection = self.shared.acquire().await?;
        if !KNOWN_ROLES.contains(&user.role_id) {
            return Err(StoreError::RoleNotFound(user.role_id));
        }

        let mut tables = self.shared.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate {
                constraint: "users_email_key".to_string(),
            });
        }

        let row = User {
            id: UserId::new(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role_id: user.role_id,
        };
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let _connection = self.shared.acquire().await?;
        Ok(self
            .shared
            .tables
            .read()
            .await
            .products
            .get(&product_id)
            .cloned())
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let _connection = self.shared.acquire().await?;
        Ok(self.shared.tables.read().await.users.get(&user_id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let _connection = self.shared.acquire().await?;
        let tables = self.shared.tables.read().await;
        let mut products: Vec<_> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn products_below(&self, threshold: i64) -> Result<Vec<Product>> {
        let _connection = self.shared.acquire().await?;
        let tables = self.shared.tables.read().await;
        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| p.quantity < threshold)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.quantity.cmp(&b.quantity).then(a.name.cmp(&b.name)));
        Ok(products)
    }

    async fn ledger_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>> {
        let _connection = self.shared.acquire().await?;
        let tables = self.shared.tables.read().await;
        let mut entries: Vec<_> = tables
            .transactions
            .iter()
            .filter(|t| t.created_at >= start && t.created_at < end)
            .filter_map(|t| {
                tables.products.get(&t.product_id).map(|p| LedgerEntry {
                    product_id: p.id,
                    product_name: p.name.clone(),
                    unit_price: p.unit_price,
                    kind: t.kind,
                    quantity: t.quantity,
                    created_at: t.created_at,
                })
            })
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn transactions_for_product(&self, product_id: ProductId) -> Result<Vec<Transaction>> {
        let _connection = self.shared.acquire().await?;
        let tables = self.shared.tables.read().await;
        Ok(tables
            .transactions
            .iter()
            .filter(|t| t.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn reprovision(&self) -> Result<()> {
        let generation = self.shared.reprovisions.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::warn!(generation, "re-provisioning in-memory connection pool");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{FixedClock, Money, TransactionKind};

    async fn seed(store: &InMemoryLedgerStore, quantity: i64) -> (Product, User) {
        let product = store
            .insert_product(NewProduct {
                name: "Widget".to_string(),
                description: None,
                unit_price: Money::from_cents(1000),
                quantity,
            })
            .await
            .unwrap();
        let user = store
            .insert_user(NewUser {
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                password_hash: "hash".to_string(),
                role_id: 3,
            })
            .await
            .unwrap();
        (product, user)
    }

    fn outbound(product: &Product, user: &User, quantity: i64) -> NewTransaction {
        NewTransaction {
            kind: TransactionKind::Outbound,
            quantity,
            product_id: product.id,
            user_id: user.id,
        }
    }

    #[tokio::test]
    async fn commit_applies_writes_and_transactions() {
        let store = InMemoryLedgerStore::new();
        let (product, user) = seed(&store, 10).await;

        let mut unit = store.begin_unit().await.unwrap();
        let locked = unit.lock_product_for_update(product.id).await.unwrap();
        assert_eq!(locked.quantity, 10);
        unit.write_product_quantity(product.id, 7).await.unwrap();
        unit.append_transaction(outbound(&product, &user, 3))
            .await
            .unwrap();
        let committed = unit.commit().await.unwrap();

        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].quantity, 3);
        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 7);
        assert_eq!(store.transaction_count().await, 1);
    }

    #[tokio::test]
    async fn abort_discards_writes() {
        let store = InMemoryLedgerStore::new();
        let (product, user) = seed(&store, 10).await;

        let mut unit = store.begin_unit().await.unwrap();
        unit.lock_product_for_update(product.id).await.unwrap();
        unit.write_product_quantity(product.id, 1).await.unwrap();
        unit.append_transaction(outbound(&product, &user, 9))
            .await
            .unwrap();
        unit.abort().await.unwrap();

        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 10);
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn dropping_a_unit_aborts_it_and_releases_the_lock() {
        let store = InMemoryLedgerStore::new();
        let (product, _) = seed(&store, 10).await;

        {
            let mut unit = store.begin_unit().await.unwrap();
            unit.lock_product_for_update(product.id).await.unwrap();
            unit.write_product_quantity(product.id, 0).await.unwrap();
        }

        let mut unit = store.begin_unit().await.unwrap();
        let locked = tokio::time::timeout(
            Duration::from_secs(1),
            unit.lock_product_for_update(product.id),
        )
        .await
        .expect("lock should be free after drop")
        .unwrap();
        assert_eq!(locked.quantity, 10);
    }

    #[tokio::test]
    async fn lock_blocks_second_unit_until_commit() {
        let store = InMemoryLedgerStore::new();
        let (product, _) = seed(&store, 10).await;

        let mut first = store.begin_unit().await.unwrap();
        first.lock_product_for_update(product.id).await.unwrap();

        let contender = store.clone();
        let product_id = product.id;
        let waiter = tokio::spawn(async move {
            let mut second = contender.begin_unit().await.unwrap();
            second.lock_product_for_update(product_id).await.unwrap()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.write_product_quantity(product.id, 4).await.unwrap();
        first.commit().await.unwrap();

        let seen = waiter.await.unwrap();
        assert_eq!(seen.quantity, 4);
    }

    #[tokio::test]
    async fn lock_missing_product_fails() {
        let store = InMemoryLedgerStore::new();
        let mut unit = store.begin_unit().await.unwrap();
        let missing = ProductId::new();

        let result = unit.lock_product_for_update(missing).await;
        assert!(matches!(result, Err(StoreError::ProductNotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn missing_products_leave_no_row_locks_behind() {
        let store = InMemoryLedgerStore::new();
        let (product, _) = seed(&store, 10).await;
        let mut unit = store.begin_unit().await.unwrap();

        for _ in 0..1000 {
            let result = unit.lock_product_for_update(ProductId::new()).await;
            assert!(matches!(result, Err(StoreError::ProductNotFound(_))));
        }
        unit.lock_product_for_update(product.id).await.unwrap();

        let row_locks = store.shared.row_locks.lock().unwrap();
        assert_eq!(row_locks.len(), 1);
        assert!(row_locks.contains_key(&product.id));
    }

    #[tokio::test]
    async fn write_without_lock_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let (product, _) = seed(&store, 10).await;
        let mut unit = store.begin_unit().await.unwrap();

        let result = unit.write_product_quantity(product.id, 1).await;
        assert!(matches!(result, Err(StoreError::LockNotHeld(_))));
    }

    #[tokio::test]
    async fn append_rejects_unknown_user() {
        let store = InMemoryLedgerStore::new();
        let (product, _) = seed(&store, 10).await;
        let mut unit = store.begin_unit().await.unwrap();
        unit.lock_product_for_update(product.id).await.unwrap();

        let result = unit
            .append_transaction(NewTransaction {
                kind: TransactionKind::Inbound,
                quantity: 1,
                product_id: product.id,
                user_id: UserId::new(),
            })
            .await;
        assert!(matches!(result, Err(StoreError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn injected_fault_fires_once() {
        let store = InMemoryLedgerStore::new();
        let (product, _) = seed(&store, 10).await;
        store.fail_next(FailPoint::LockProduct);

        let mut unit = store.begin_unit().await.unwrap();
        let first = unit.lock_product_for_update(product.id).await;
        assert!(matches!(
            first,
            Err(StoreError::InjectedFault(FailPoint::LockProduct))
        ));
        assert!(unit.lock_product_for_update(product.id).await.is_ok());
    }

    #[tokio::test]
    async fn begin_unit_times_out_when_pool_is_exhausted() {
        let store =
            InMemoryLedgerStore::with_limits(Arc::new(SystemClock), 1, Duration::from_millis(20));
        let _held = store.begin_unit().await.unwrap();

        let result = store.begin_unit().await;
        assert!(matches!(result, Err(StoreError::PoolTimedOut)));
    }

    #[tokio::test]
    async fn unavailable_store_rejects_operations() {
        let store = InMemoryLedgerStore::new();
        store.set_available(false);

        let err = store.list_products().await.unwrap_err();
        assert!(err.is_unavailable());

        store.set_available(true);
        assert!(store.list_products().await.is_ok());
    }

    #[tokio::test]
    async fn unique_constraints() {
        let store = InMemoryLedgerStore::new();
        seed(&store, 1).await;

        let dup_product = store
            .insert_product(NewProduct {
                name: "Widget".to_string(),
                description: None,
                unit_price: Money::zero(),
                quantity: 0,
            })
            .await;
        assert!(matches!(
            dup_product,
            Err(StoreError::Duplicate { ref constraint }) if constraint == "products_name_key"
        ));

        let dup_user = store
            .insert_user(NewUser {
                name: "Other".to_string(),
                email: "ana@example.com".to_string(),
                password_hash: "x".to_string(),
                role_id: 3,
            })
            .await;
        assert!(matches!(dup_user, Err(StoreError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn unknown_role_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let result = store
            .insert_user(NewUser {
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                password_hash: "x".to_string(),
                role_id: 42,
            })
            .await;
        assert!(matches!(result, Err(StoreError::RoleNotFound(42))));
    }

    #[tokio::test]
    async fn products_below_is_sorted_ascending() {
        let store = InMemoryLedgerStore::new();
        for (name, quantity) in [("A", 5), ("B", 15), ("C", 9)] {
            store
                .insert_product(NewProduct {
                    name: name.to_string(),
                    description: None,
                    unit_price: Money::zero(),
                    quantity,
                })
                .await
                .unwrap();
        }

        let low = store.products_below(10).await.unwrap();
        let names: Vec<_> = low.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn ledger_entries_use_half_open_window() {
        let start = Utc::now();
        let clock = Arc::new(FixedClock::new(start));
        let store = InMemoryLedgerStore::with_clock(clock.clone());
        let (product, user) = seed(&store, 10).await;

        for offset in [0, 1, 2] {
            clock.set(start + ChronoDuration::hours(offset));
            let mut unit = store.begin_unit().await.unwrap();
            unit.lock_product_for_update(product.id).await.unwrap();
            unit.append_transaction(outbound(&product, &user, 1))
                .await
                .unwrap();
            unit.commit().await.unwrap();
        }

        let entries = store
            .ledger_entries(start, start + ChronoDuration::hours(2))
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].product_name, "Widget");
        assert_eq!(entries[0].created_at, start);
    }

    #[tokio::test]
    async fn transactions_are_stamped_at_commit() {
        let appended_at = Utc::now();
        let clock = Arc::new(FixedClock::new(appended_at));
        let store = InMemoryLedgerStore::with_clock(clock.clone());
        let (product, user) = seed(&store, 10).await;

        let mut unit = store.begin_unit().await.unwrap();
        unit.lock_product_for_update(product.id).await.unwrap();
        unit.append_transaction(outbound(&product, &user, 1))
            .await
            .unwrap();
        let committed_at = appended_at + ChronoDuration::seconds(30);
        clock.set(committed_at);
        let committed = unit.commit().await.unwrap();

        assert_eq!(committed[0].created_at, committed_at);
    }

    #[tokio::test]
    async fn reprovision_is_counted() {
        let store = InMemoryLedgerStore::new();
        store.reprovision().await.unwrap();
        store.reprovision().await.unwrap();
        assert_eq!(store.reprovision_count(), 2);
    }
}
