//! Product catalog.

use ledger_store::{LedgerStore, Money, NewProduct, Product, ProductId};

use crate::InventoryError;

/// Values for a new product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProduct {
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Money,
    /// Initial stock level; zero when absent.
    pub quantity: Option<i64>,
}

impl CreateProduct {
    pub fn new(name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            name: name.into(),
            description: None,
            unit_price,
            quantity: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = Some(quantity);
        self
    }
}

/// Service for creating and reading products.
///
/// Stock levels set here are initial values only; later changes go through
/// [`crate::StockService`].
pub struct CatalogService<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> CatalogService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a product with a unique name.
    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(&self, request: CreateProduct) -> Result<Product, InventoryError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(InventoryError::InvalidInput(
                "product name is required".to_string(),
            ));
        }
        if request.unit_price.is_negative() {
            return Err(InventoryError::InvalidInput(
                "price must not be negative".to_string(),
            ));
        }
        let quantity = request.quantity.unwrap_or(0);
        if quantity < 0 {
            return Err(InventoryError::InvalidInput(
                "initial quantity must not be negative".to_string(),
            ));
        }

        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let product = self
            .store
            .insert_product(NewProduct {
                name: name.to_string(),
                description,
                unit_price: request.unit_price,
                quantity,
            })
            .await;

        match product {
            Ok(product) => {
                tracing::info!(product_id = %product.id, "product created");
                Ok(product)
            }
            Err(err) => {
                self.store.handle_failure(&err).await;
                Err(err.into())
            }
        }
    }

    /// Lists every product ordered by name.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, InventoryError> {
        match self.store.list_products().await {
            Ok(products) => Ok(products),
            Err(err) => {
                self.store.handle_failure(&err).await;
                Err(err.into())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, InventoryError> {
        match self.store.get_product(product_id).await {
            Ok(Some(product)) => Ok(product),
            Ok(None) => Err(InventoryError::NotFound {
                entity: "product",
                id: product_id.to_string(),
            }),
            Err(err) => {
                self.store.handle_failure(&err).await;
                Err(err.into())
            }
        }
    }
}
