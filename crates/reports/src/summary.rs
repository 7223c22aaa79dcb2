//! Per-product value totals over ledger entries.

use std::collections::BTreeMap;

use ledger_store::{LedgerEntry, Money, ProductId, TransactionKind};
use serde::Serialize;

/// Value moved in and out of one product within a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub product_id: ProductId,
    pub product_name: String,
    pub inbound_value: Money,
    pub outbound_value: Money,
    /// `inbound_value - outbound_value`.
    pub profit: Money,
}

/// Folds entries into one row per product, ordered by product name.
///
/// Values use each product's unit price as carried by the entry. Products
/// without entries do not appear.
pub fn summarize(entries: &[LedgerEntry]) -> Vec<ProductSummary> {
    let mut rows: BTreeMap<(&str, ProductId), (Money, Money)> = BTreeMap::new();

    for entry in entries {
        let (inbound, outbound) = rows
            .entry((entry.product_name.as_str(), entry.product_id))
            .or_default();
        match entry.kind {
            TransactionKind::Inbound => *inbound += entry.value(),
            TransactionKind::Outbound => *outbound += entry.value(),
        }
    }

    rows.into_iter()
        .map(|((name, product_id), (inbound_value, outbound_value))| ProductSummary {
            product_id,
            product_name: name.to_string(),
            inbound_value,
            outbound_value,
            profit: inbound_value - outbound_value,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn entry(product_id: ProductId, name: &str, kind: TransactionKind, qty: i64) -> LedgerEntry {
        LedgerEntry {
            product_id,
            product_name: name.to_string(),
            unit_price: Money::from_cents(1000),
            kind,
            quantity: qty,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn totals_per_product() {
        let widget = ProductId::new();
        let entries = vec![
            entry(widget, "Widget", TransactionKind::Inbound, 3),
            entry(widget, "Widget", TransactionKind::Outbound, 1),
        ];

        let rows = summarize(&entries);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].inbound_value, Money::from_cents(3000));
        assert_eq!(rows[0].outbound_value, Money::from_cents(1000));
        assert_eq!(rows[0].profit, Money::from_cents(2000));
    }

    #[test]
    fn rows_are_ordered_by_name() {
        let entries = vec![
            entry(ProductId::new(), "Zeta", TransactionKind::Inbound, 1),
            entry(ProductId::new(), "Alpha", TransactionKind::Outbound, 2),
        ];

        let rows = summarize(&entries);
        let names: Vec<_> = rows.iter().map(|r| r.product_name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
        assert_eq!(rows[0].profit, Money::from_cents(-2000));
    }

    #[test]
    fn empty_ledger_gives_empty_report() {
        assert!(summarize(&[]).is_empty());
    }
}
