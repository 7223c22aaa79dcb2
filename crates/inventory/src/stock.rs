//! Stock mutation engine.
//!
//! [`StockService::record`] is the only path that changes a product's stock
//! level. Each call runs inside one unit of work: the product row is locked,
//! the new level is computed and checked, the level is written and the
//! transaction row appended, then the unit commits. Any failure aborts the
//! unit, so either both writes persist or neither does.

use std::time::Instant;

use ledger_store::{
    LedgerStore, NewTransaction, ProductId, Transaction, TransactionId, TransactionKind,
    UnitOfWork, UserId,
};
use serde::Serialize;

use crate::InventoryError;

/// A request to move stock in or out of a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTransaction {
    pub kind: TransactionKind,
    pub quantity: i64,
    pub product_id: ProductId,
    pub user_id: UserId,
}

impl RecordTransaction {
    pub fn inbound(product_id: ProductId, user_id: UserId, quantity: i64) -> Self {
        Self {
            kind: TransactionKind::Inbound,
            quantity,
            product_id,
            user_id,
        }
    }

    pub fn outbound(product_id: ProductId, user_id: UserId, quantity: i64) -> Self {
        Self {
            kind: TransactionKind::Outbound,
            quantity,
            product_id,
            user_id,
        }
    }
}

/// Outcome of a committed stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub transaction: Transaction,
    /// Stock level of the product right after the movement.
    pub stock_after: i64,
}

/// Service applying stock movements atomically.
pub struct StockService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> StockService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Records one stock movement.
    ///
    /// Fails with `InvalidInput` for a non-positive quantity, `NotFound` for an
    /// unknown product or user, `InsufficientStock` when an outbound movement
    /// exceeds the current level, `ServiceUnavailable` when the store cannot
    /// be reached and `TransactionFailed` for any other storage failure.
    #[tracing::instrument(
        skip(self, request),
        fields(kind = %request.kind, quantity = request.quantity, product_id = %request.product_id)
    )]
    pub async fn record(&self, request: RecordTransaction) -> Result<StockChange, InventoryError> {
        if request.quantity <= 0 {
            let err = InventoryError::InvalidInput(format!(
                "quantity must be a positive integer, got {}",
                request.quantity
            ));
            reject(&err);
            return Err(err);
        }

        let started = Instant::now();
        let result = self.apply(&request).await;
        metrics::histogram!("inventory_unit_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(change) => {
                metrics::counter!("inventory_transactions_total", "kind" => request.kind.as_str())
                    .increment(1);
                tracing::info!(
                    transaction_id = %change.transaction.id,
                    stock_after = change.stock_after,
                    "stock movement committed"
                );
                Ok(change)
            }
            Err(err) => {
                if let Some(store_err) = err.store_error() {
                    self.store.handle_failure(store_err).await;
                }
                reject(&err);
                Err(err)
            }
        }
    }

    async fn apply(&self, request: &RecordTransaction) -> Result<StockChange, InventoryError> {
        let mut unit = self.store.begin_unit().await?;

        let (stock_after, transaction_id) = match stage(&mut unit, request).await {
            Ok(staged) => staged,
            Err(err) => {
                if let Err(abort_err) = unit.abort().await {
                    tracing::warn!(error = %abort_err, "failed to abort unit of work");
                }
                return Err(err);
            }
        };

        let committed = unit.commit().await?;
        let transaction = committed
            .into_iter()
            .find(|t| t.id == transaction_id)
            .ok_or_else(|| InventoryError::NotFound {
                entity: "transaction",
                id: transaction_id.to_string(),
            })?;

        Ok(StockChange {
            transaction,
            stock_after,
        })
    }
}

/// Locks the product, checks the new level and stages both writes.
async fn stage<U: UnitOfWork>(
    unit: &mut U,
    request: &RecordTransaction,
) -> Result<(i64, TransactionId), InventoryError> {
    let product = unit.lock_product_for_update(request.product_id).await?;

    let stock_after = request
        .kind
        .apply(product.quantity, request.quantity)
        .ok_or_else(|| {
            InventoryError::InvalidInput(format!(
                "quantity {} overflows the stock level of product {}",
                request.quantity, request.product_id
            ))
        })?;

    if stock_after < 0 {
        return Err(InventoryError::InsufficientStock {
            product_id: request.product_id,
            available: product.quantity,
            requested: request.quantity,
        });
    }

    unit.write_product_quantity(request.product_id, stock_after)
        .await?;
    let transaction_id = unit
        .append_transaction(NewTransaction {
            kind: request.kind,
            quantity: request.quantity,
            product_id: request.product_id,
            user_id: request.user_id,
        })
        .await?;

    Ok((stock_after, transaction_id))
}

fn reject(err: &InventoryError) {
    metrics::counter!("inventory_transactions_rejected_total", "reason" => err.reason())
        .increment(1);
    tracing::warn!(error = %err, "stock movement rejected");
}
