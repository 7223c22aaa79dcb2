//! Low-stock and calendar report endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use ledger_store::{LedgerStore, ProductId};
use reports::{ProductSummary, ReportWindow};
use serde::{Deserialize, Serialize};

use super::products::ProductView;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LowStockQuery {
    pub min: Option<i64>,
}

#[derive(Serialize)]
pub struct LowStockResponse {
    pub success: bool,
    pub productos: Vec<ProductView>,
    pub umbral: i64,
}

#[derive(Debug, Serialize)]
pub struct ReportRow {
    pub producto_id: ProductId,
    pub producto: String,
    pub total_entrada: f64,
    pub total_salida: f64,
    pub ganancia: f64,
}

impl From<ProductSummary> for ReportRow {
    fn from(row: ProductSummary) -> Self {
        Self {
            producto_id: row.product_id,
            producto: row.product_name,
            total_entrada: row.inbound_value.as_decimal(),
            total_salida: row.outbound_value.as_decimal(),
            ganancia: row.profit.as_decimal(),
        }
    }
}

#[derive(Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub reporte: Vec<ReportRow>,
}

/// GET /stock-bajo?min=N: products with stock strictly below `N` (default 10).
#[tracing::instrument(skip(state, query))]
pub async fn low_stock<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<LowStockQuery>, QueryRejection>,
) -> Result<Json<LowStockResponse>, ApiError> {
    let Query(query) = query.map_err(|e| state.fail(super::malformed_query(e)))?;

    let report = state
        .reports
        .low_stock(query.min)
        .await
        .map_err(|e| state.fail(e).context("Error al obtener productos con stock bajo"))?;

    Ok(Json(LowStockResponse {
        success: true,
        productos: report.products.into_iter().map(ProductView::from).collect(),
        umbral: report.threshold,
    }))
}

/// GET /reporte-diario: value moved per product today.
pub async fn daily<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<ReportResponse>, ApiError> {
    window(&state, ReportWindow::Day).await
}

/// GET /reporte-mensual: value moved per product this calendar month.
pub async fn monthly<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<ReportResponse>, ApiError> {
    window(&state, ReportWindow::Month).await
}

#[tracing::instrument(skip(state))]
async fn window<S: LedgerStore + 'static>(
    state: &AppState<S>,
    window: ReportWindow,
) -> Result<Json<ReportResponse>, ApiError> {
    let report = state
        .reports
        .window_report(window)
        .await
        .map_err(|e| state.fail(e))?;

    Ok(Json(ReportResponse {
        success: true,
        reporte: report.rows.into_iter().map(ReportRow::from).collect(),
    }))
}
