//! Inventory services on top of the ledger store.
//!
//! This crate provides:
//! - `StockService`, the only path that changes stock levels
//! - `CatalogService` for creating and listing products
//! - `UserService` for registering users with hashed credentials

pub mod catalog;
pub mod credential;
pub mod error;
pub mod stock;
pub mod users;

pub use catalog::{CatalogService, CreateProduct};
pub use credential::{Argon2Hasher, CredentialHasher};
pub use error::InventoryError;
pub use stock::{RecordTransaction, StockChange, StockService};
pub use users::{RegisterUser, UserService};
