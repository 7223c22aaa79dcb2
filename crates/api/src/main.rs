//! API server entry point.

use std::process::ExitCode;
use std::sync::Arc;

use api::config::{Config, StoreBackend};
use api::{AppState, telemetry};
use ledger_store::{DatabaseConfig, InMemoryLedgerStore, LedgerStore, PgLedgerStore, PoolSupervisor};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Serves the API over `store` until a shutdown signal arrives.
async fn serve<S: LedgerStore + Clone + 'static>(
    config: &Config,
    store: S,
    metrics_handle: PrometheusHandle,
) -> ExitCode {
    let state = Arc::new(AppState::new(store, config.diagnostics));
    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind address");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, backend = ?config.store_backend, "starting API server");

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %err, "server error");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    // 2. Initialize tracing
    telemetry::init_tracing(&config);

    // 3. Install Prometheus metrics recorder
    let metrics_handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(err) => {
            tracing::error!(error = %err, "failed to install Prometheus recorder");
            return ExitCode::FAILURE;
        }
    };
    telemetry::describe_metrics();

    // 4. Provision the store and serve
    let code = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("using the in-memory store; data is lost on exit");
            serve(&config, InMemoryLedgerStore::new(), metrics_handle).await
        }
        StoreBackend::Postgres => {
            let database = DatabaseConfig::from_env();
            tracing::info!(?database, "connecting to PostgreSQL");

            let supervisor = match PoolSupervisor::bootstrap(database).await {
                Ok(supervisor) => Arc::new(supervisor),
                Err(err) => {
                    tracing::error!(error = %err, "database unreachable, exiting");
                    return ExitCode::FAILURE;
                }
            };
            let store = PgLedgerStore::new(Arc::clone(&supervisor));

            if config.run_migrations
                && let Err(err) = store.run_migrations().await
            {
                tracing::error!(error = %err, "migrations failed, exiting");
                supervisor.close().await;
                return ExitCode::FAILURE;
            }

            let code = serve(&config, store, metrics_handle).await;
            supervisor.close().await;
            code
        }
    };

    tracing::info!("server shut down gracefully");
    code
}
