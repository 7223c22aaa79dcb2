//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use inventory::CreateProduct;
use ledger_store::{LedgerStore, Money, Product, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    #[serde(default)]
    pub nombre: String,
    pub descripcion: Option<String>,
    pub precio: Option<f64>,
    pub cantidad: Option<i64>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub precio: f64,
    pub cantidad: i64,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            nombre: product.name,
            descripcion: product.description,
            precio: product.unit_price.as_decimal(),
            cantidad: product.quantity,
        }
    }
}

#[derive(Serialize)]
pub struct ProductListResponse {
    pub success: bool,
    pub productos: Vec<ProductView>,
}

#[derive(Serialize)]
pub struct ProductCreatedResponse {
    pub success: bool,
    pub producto: ProductView,
}

// -- Handlers --

/// GET /productos: every product ordered by name.
#[tracing::instrument(skip(state))]
pub async fn list<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let products = state
        .catalog
        .list_products()
        .await
        .map_err(|e| state.fail(e).context("Error al obtener productos"))?;

    Ok(Json(ProductListResponse {
        success: true,
        productos: products.into_iter().map(ProductView::from).collect(),
    }))
}

/// POST /productos: create a product with an initial stock level.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductCreatedResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| state.fail(super::malformed(e)))?;

    let precio = req
        .precio
        .ok_or_else(|| ApiError::bad_request("Datos inválidos: precio es requerido"))?;
    let unit_price = Money::from_decimal(precio)
        .ok_or_else(|| ApiError::bad_request("Datos inválidos: precio no es un número válido"))?;

    let product = state
        .catalog
        .create_product(CreateProduct {
            name: req.nombre,
            description: req.descripcion,
            unit_price,
            quantity: req.cantidad,
        })
        .await
        .map_err(|e| state.fail(e).context("Error al crear producto"))?;

    Ok((
        StatusCode::CREATED,
        Json(ProductCreatedResponse {
            success: true,
            producto: product.into(),
        }),
    ))
}
