//! Rows owned by the ledger store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Money, ProductId, TransactionId, UserId};

/// Role assigned to users that register without one (least privileged).
pub const DEFAULT_ROLE_ID: i32 = 3;

/// Roles seeded by the schema.
pub const KNOWN_ROLES: [i32; 3] = [1, 2, 3];

/// Direction of a stock movement.
///
/// Serialized with the names used on the wire (`entrada` / `salida`); the
/// English names are accepted on input as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "entrada", alias = "inbound")]
    Inbound,
    #[serde(rename = "salida", alias = "outbound")]
    Outbound,
}

impl TransactionKind {
    /// Stored representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Inbound => "entrada",
            TransactionKind::Outbound => "salida",
        }
    }

    /// Applies a movement of `quantity` units to `current` stock.
    ///
    /// Returns `None` on arithmetic overflow. The result may be negative; the
    /// caller decides whether that is acceptable.
    pub fn apply(&self, current: i64, quantity: i64) -> Option<i64> {
        match self {
            TransactionKind::Inbound => current.checked_add(quantity),
            TransactionKind::Outbound => current.checked_sub(quantity),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entrada" | "inbound" => Ok(TransactionKind::Inbound),
            "salida" | "outbound" => Ok(TransactionKind::Outbound),
            other => Err(format!("unknown transaction kind '{other}'")),
        }
    }
}

/// A product and its current stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
}

/// Values for a product insert.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Money,
    pub quantity: i64,
}

/// A committed stock movement. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub quantity: i64,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Values for a transaction append inside a unit of work.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub quantity: i64,
    pub product_id: ProductId,
    pub user_id: UserId,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_id: i32,
}

/// Values for a user insert. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i32,
}

/// A committed transaction joined with the product it moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub kind: TransactionKind,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Value of the movement at the product's current unit price.
    pub fn value(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}
