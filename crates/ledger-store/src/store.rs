use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    LedgerEntry, NewProduct, NewTransaction, NewUser, Product, ProductId, Result, StoreError,
    Transaction, TransactionId, User, UserId,
};

/// A bounded sequence of store operations that commits or aborts atomically.
///
/// A unit holds one pooled connection for its whole lifetime. Dropping a unit
/// without calling [`UnitOfWork::commit`] aborts it: staged writes are
/// discarded and every row lock it holds is released.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Locks a product row and returns its current state.
    ///
    /// Any other unit calling this for the same product waits until this unit
    /// commits or aborts. Fails with `ProductNotFound` if the row is absent.
    async fn lock_product_for_update(&mut self, product_id: ProductId) -> Result<Product>;

    /// Replaces the stock quantity of a product locked by this unit.
    async fn write_product_quantity(&mut self, product_id: ProductId, quantity: i64)
    -> Result<()>;

    /// Appends a transaction row. PostgreSQL stamps it with the wall clock at
    /// insert; the in-memory store stamps it with its `Clock` at commit. Both
    /// fall inside the unit's lifetime.
    async fn append_transaction(&mut self, transaction: NewTransaction) -> Result<TransactionId>;

    /// Makes every write of this unit visible, returning the appended transactions.
    async fn commit(self) -> Result<Vec<Transaction>>;

    /// Discards every write of this unit.
    async fn abort(self) -> Result<()>;
}

/// Durable storage for products, users and the transaction ledger.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Unit: UnitOfWork + 'static;

    /// Opens a unit of work, waiting at most the configured acquire timeout
    /// for a free connection.
    async fn begin_unit(&self) -> Result<Self::Unit>;

    /// Inserts a product. Fails with `Duplicate` if the name is taken.
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    /// Inserts a user. Fails with `Duplicate` if the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Lists every product ordered by name.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Products whose quantity is strictly below `threshold`, ascending by
    /// quantity (ties broken by name).
    async fn products_below(&self, threshold: i64) -> Result<Vec<Product>>;

    /// Committed transactions with `start <= created_at < end`, joined with
    /// their product, oldest first.
    async fn ledger_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>>;

    /// Lists the committed transactions of one product, oldest first.
    async fn transactions_for_product(&self, product_id: ProductId) -> Result<Vec<Transaction>>;

    /// Replaces the underlying connection pool after an availability failure.
    async fn reprovision(&self) -> Result<()> {
        Ok(())
    }

    /// Reacts to a failed operation: an unreachable store gets a fresh pool.
    async fn handle_failure(&self, err: &StoreError) {
        if !err.is_unavailable() {
            return;
        }
        if let Err(reprovision_err) = self.reprovision().await {
            tracing::error!(error = %reprovision_err, "failed to re-provision connection pool");
        }
    }
}
