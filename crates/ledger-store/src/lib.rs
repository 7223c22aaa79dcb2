//! Durable storage for the inventory ledger.
//!
//! This crate provides:
//! - The `LedgerStore` and `UnitOfWork` traits
//! - An in-memory implementation with row locks and fault injection for tests
//! - A PostgreSQL implementation on top of sqlx
//! - Connection provisioning with startup retries and pool replacement

pub mod clock;
pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod provision;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use common::{Money, ProductId, TransactionId, UserId};
pub use error::{Result, StoreError};
pub use memory::{FailPoint, InMemoryLedgerStore};
pub use model::{
    DEFAULT_ROLE_ID, LedgerEntry, NewProduct, NewTransaction, NewUser, Product, Transaction,
    TransactionKind, User,
};
pub use postgres::PgLedgerStore;
pub use provision::{DatabaseConfig, PoolSupervisor, RetryPolicy};
pub use store::{LedgerStore, UnitOfWork};
