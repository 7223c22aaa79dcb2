//! Tracing and metrics setup.

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`; an unparsable directive falls back to `info`.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (pretty, json) = match config.log_format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}

/// Registers help text for the metrics emitted by the services.
pub fn describe_metrics() {
    describe_counter!(
        "inventory_transactions_total",
        "Committed stock movements by kind"
    );
    describe_counter!(
        "inventory_transactions_rejected_total",
        "Stock movements rejected or failed, by reason"
    );
    describe_histogram!(
        "inventory_unit_duration_seconds",
        Unit::Seconds,
        "Time spent inside a stock movement unit of work"
    );
    describe_counter!("reports_generated_total", "Reports built, by report type");
    describe_counter!(
        "ledger_pool_reprovisions_total",
        "Connection pool replacements after availability failures"
    );
}
