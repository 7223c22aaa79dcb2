//! Inventory error types.

use ledger_store::{ProductId, StoreError};
use thiserror::Error;

/// Errors surfaced by the inventory services.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The request was rejected before touching the store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An outbound movement would drive stock below zero.
    #[error("insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// A unique value (product name, user email) is already taken.
    #[error("duplicate key: {constraint}")]
    DuplicateKey { constraint: String },

    /// The store failed while a unit of work was open.
    #[error("transaction failed: {0}")]
    TransactionFailed(#[source] StoreError),

    /// The store could not be reached.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(#[source] StoreError),

    /// Password hashing failed.
    #[error("credential error: {0}")]
    Credential(String),
}

impl InventoryError {
    /// Label used for the rejection counter.
    pub fn reason(&self) -> &'static str {
        match self {
            InventoryError::InvalidInput(_) => "invalid_input",
            InventoryError::NotFound { .. } => "not_found",
            InventoryError::InsufficientStock { .. } => "insufficient_stock",
            InventoryError::DuplicateKey { .. } => "duplicate_key",
            InventoryError::TransactionFailed(_) => "transaction_failed",
            InventoryError::ServiceUnavailable(_) => "service_unavailable",
            InventoryError::Credential(_) => "credential",
        }
    }

    /// The storage failure behind this error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            InventoryError::TransactionFailed(e) | InventoryError::ServiceUnavailable(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for InventoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => InventoryError::NotFound {
                entity: "product",
                id: id.to_string(),
            },
            StoreError::UserNotFound(id) => InventoryError::NotFound {
                entity: "user",
                id: id.to_string(),
            },
            StoreError::RoleNotFound(id) => InventoryError::NotFound {
                entity: "role",
                id: id.to_string(),
            },
            StoreError::Duplicate { constraint } => InventoryError::DuplicateKey { constraint },
            e if e.is_unavailable() => InventoryError::ServiceUnavailable(e),
            e => InventoryError::TransactionFailed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use ledger_store::{FailPoint, UserId};

    use super::*;

    #[test]
    fn missing_rows_become_not_found() {
        let id = UserId::new();
        let err = InventoryError::from(StoreError::UserNotFound(id));
        assert!(matches!(err, InventoryError::NotFound { entity: "user", .. }));
        assert_eq!(err.reason(), "not_found");
        assert!(err.store_error().is_none());
    }

    #[test]
    fn unavailable_store_keeps_its_source() {
        let err = InventoryError::from(StoreError::PoolTimedOut);
        assert!(matches!(err, InventoryError::ServiceUnavailable(_)));
        assert!(err.store_error().is_some_and(StoreError::is_unavailable));
    }

    #[test]
    fn other_store_failures_fail_the_transaction() {
        let err = InventoryError::from(StoreError::InjectedFault(FailPoint::Commit));
        assert_eq!(err.reason(), "transaction_failed");
    }
}
