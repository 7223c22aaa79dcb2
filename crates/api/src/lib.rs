//! HTTP API server for the inventory ledger.
//!
//! Provides JSON endpoints for the product catalog, user registration, stock
//! movements and reports, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use ledger_store::LedgerStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: LedgerStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/", get(routes::index::index))
        .route("/health", get(routes::health::check))
        .route(
            "/productos",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route("/registrar", post(routes::users::register::<S>))
        .route("/transacciones", post(routes::transactions::record::<S>))
        .route("/stock-bajo", get(routes::reports::low_stock::<S>))
        .route("/reporte-diario", get(routes::reports::daily::<S>))
        .route("/reporte-mensual", get(routes::reports::monthly::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
