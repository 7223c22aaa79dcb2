//! Service index.

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct IndexResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: &'static [&'static str],
}

const ENDPOINTS: &[&str] = &[
    "GET /health",
    "GET /metrics",
    "GET /productos",
    "POST /productos",
    "POST /registrar",
    "POST /transacciones",
    "GET /stock-bajo?min=N",
    "GET /reporte-diario",
    "GET /reporte-mensual",
];

/// GET /: lists the available endpoints.
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS,
    })
}
