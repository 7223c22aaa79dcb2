use ledger_store::Product;
use serde::Serialize;

/// Threshold used when the caller does not give one.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

/// Products whose stock is strictly below `threshold`, lowest stock first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LowStockReport {
    pub threshold: i64,
    pub products: Vec<Product>,
}
