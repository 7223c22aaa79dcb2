use thiserror::Error;

use crate::memory::FailPoint;
use crate::{ProductId, UserId};

/// Errors that can occur when interacting with the ledger store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The referenced user does not exist.
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// The referenced role does not exist.
    #[error("Role not found: {0}")]
    RoleNotFound(i32),

    /// A unique constraint was violated.
    #[error("Duplicate key violates unique constraint {constraint}")]
    Duplicate { constraint: String },

    /// A unit of work tried to write a product row it has not locked.
    #[error("Product {0} must be locked before it is written")]
    LockNotHeld(ProductId),

    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// No connection became free within the acquire timeout.
    #[error("Timed out waiting for a store connection")]
    PoolTimedOut,

    /// A failure injected by the in-memory store.
    #[error("Injected storage fault at {0:?}")]
    InjectedFault(FailPoint),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true when the failure means the store itself is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::PoolTimedOut)
    }
}

/// Result type for ledger store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
