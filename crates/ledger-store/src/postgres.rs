use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    LedgerEntry, Money, NewProduct, NewTransaction, NewUser, PoolSupervisor, Product, ProductId,
    Result, StoreError, Transaction, TransactionId, TransactionKind, User, UserId,
    store::{LedgerStore, UnitOfWork},
};

const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, quantity";
const TRANSACTION_COLUMNS: &str = "id, kind, quantity, product_id, user_id, created_at";

/// PostgreSQL-backed ledger store implementation.
#[derive(Clone)]
pub struct PgLedgerStore {
    supervisor: Arc<PoolSupervisor>,
}

impl PgLedgerStore {
    /// Creates a new PostgreSQL ledger store.
    pub fn new(supervisor: Arc<PoolSupervisor>) -> Self {
        Self { supervisor }
    }

    /// Gets a reference to the pool supervisor.
    pub fn supervisor(&self) -> &Arc<PoolSupervisor> {
        &self.supervisor
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.supervisor.pool())
            .await?;
        Ok(())
    }
}

/// Maps a driver error onto the store taxonomy.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some("23505")
    {
        return StoreError::Duplicate {
            constraint: db_err.constraint().unwrap_or("unknown").to_string(),
        };
    }
    match err {
        sqlx::Error::PoolTimedOut => StoreError::PoolTimedOut,
        e @ (sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_)) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Database(other),
    }
}

/// Name of the foreign key a statement violated, if that is why it failed.
fn violated_foreign_key(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
            db_err.constraint()
        }
        _ => None,
    }
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        unit_price: Money::from_cents(row.try_get("price_cents")?),
        quantity: row.try_get("quantity")?,
    })
}

fn parse_kind(raw: &str) -> Result<TransactionKind> {
    raw.parse()
        .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction> {
    let kind: String = row.try_get("kind")?;
    Ok(Transaction {
        id: TransactionId::from_uuid(row.try_get("id")?),
        kind: parse_kind(&kind)?,
        quantity: row.try_get("quantity")?,
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_user(row: &PgRow) -> Result<User> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role_id: row.try_get("role_id")?,
    })
}

/// Unit of work backed by a PostgreSQL transaction.
///
/// Dropping it without committing rolls the transaction back.
pub struct PgUnit {
    tx: sqlx::Transaction<'static, Postgres>,
    appended: Vec<Transaction>,
}

#[async_trait]
impl UnitOfWork for PgUnit {
    async fn lock_product_for_update(&mut self, product_id: ProductId) -> Result<Product> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(classify)?;

        match row {
            Some(row) => row_to_product(&row),
            None => Err(StoreError::ProductNotFound(product_id)),
        }
    }

    async fn write_product_quantity(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<()> {
        let updated = sqlx::query("UPDATE products SET quantity = $1 WHERE id = $2")
            .bind(quantity)
            .bind(product_id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(product_id));
        }
        Ok(())
    }

    async fn append_transaction(&mut self, transaction: NewTransaction) -> Result<TransactionId> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO transactions (id, kind, quantity, product_id, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5, clock_timestamp())
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(transaction.kind.as_str())
        .bind(transaction.quantity)
        .bind(transaction.product_id.as_uuid())
        .bind(transaction.user_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| match violated_foreign_key(&e) {
            Some("transactions_user_id_fkey") => StoreError::UserNotFound(transaction.user_id),
            Some("transactions_product_id_fkey") => {
                StoreError::ProductNotFound(transaction.product_id)
            }
            _ => classify(e),
        })?;

        let committed = row_to_transaction(&row)?;
        let id = committed.id;
        self.appended.push(committed);
        Ok(id)
    }

    async fn commit(self) -> Result<Vec<Transaction>> {
        self.tx.commit().await.map_err(classify)?;
        Ok(self.appended)
    }

    async fn abort(self) -> Result<()> {
        self.tx.rollback().await.map_err(classify)
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    type Unit = PgUnit;

    async fn begin_unit(&self) -> Result<PgUnit> {
        let tx = self.supervisor.pool().begin().await.map_err(classify)?;
        Ok(PgUnit {
            tx,
            appended: Vec::new(),
        })
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, description, price_cents, quantity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price.cents())
        .bind(product.quantity)
        .fetch_one(&self.supervisor.pool())
        .await
        .map_err(classify)?;

        row_to_product(&row)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, password_hash, role_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role_id)
        .fetch_one(&self.supervisor.pool())
        .await
        .map_err(|e| match violated_foreign_key(&e) {
            Some("users_role_id_fkey") => StoreError::RoleNotFound(user.role_id),
            _ => classify(e),
        })?;

        row_to_user(&row)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(product_id.as_uuid())
        .fetch_optional(&self.supervisor.pool())
        .await
        .map_err(classify)?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, role_id FROM users WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.supervisor.pool())
        .await
        .map_err(classify)?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name ASC"
        ))
        .fetch_all(&self.supervisor.pool())
        .await
        .map_err(classify)?;

        rows.iter().map(row_to_product).collect()
    }

    async fn products_below(&self, threshold: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE quantity < $1
            ORDER BY quantity ASC, name ASC
            "#
        ))
        .bind(threshold)
        .fetch_all(&self.supervisor.pool())
        .await
        .map_err(classify)?;

        rows.iter().map(row_to_product).collect()
    }

    async fn ledger_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT t.kind, t.quantity, t.created_at,
                   p.id AS product_id, p.name AS product_name, p.price_cents
            FROM transactions t
            JOIN products p ON p.id = t.product_id
            WHERE t.created_at >= $1 AND t.created_at < $2
            ORDER BY t.created_at ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.supervisor.pool())
        .await
        .map_err(classify)?;

        rows.iter()
            .map(|row| {
                let kind: String = row.try_get("kind")?;
                Ok(LedgerEntry {
                    product_id: ProductId::from_uuid(row.try_get("product_id")?),
                    product_name: row.try_get("product_name")?,
                    unit_price: Money::from_cents(row.try_get("price_cents")?),
                    kind: parse_kind(&kind)?,
                    quantity: row.try_get("quantity")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn transactions_for_product(&self, product_id: ProductId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM transactions
            WHERE product_id = $1
            ORDER BY created_at ASC
            "#
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&self.supervisor.pool())
        .await
        .map_err(classify)?;

        rows.iter().map(row_to_transaction).collect()
    }

    async fn reprovision(&self) -> Result<()> {
        self.supervisor.reprovision()
    }
}
