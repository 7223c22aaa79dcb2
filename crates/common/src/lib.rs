//! Shared identifiers and value types for the inventory ledger.

pub mod ids;
pub mod money;

pub use ids::{ProductId, TransactionId, UserId};
pub use money::Money;
