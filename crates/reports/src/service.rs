use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use ledger_store::{Clock, LedgerStore, SystemClock};
use serde::Serialize;

use crate::{
    DEFAULT_LOW_STOCK_THRESHOLD, LowStockReport, ProductSummary, ReportError, ReportWindow,
    summarize,
};

/// Value totals for one calendar window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowReport {
    pub window: ReportWindow,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rows: Vec<ProductSummary>,
}

/// Service building low-stock and window reports.
pub struct ReportService<S: LedgerStore> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: LedgerStore> ReportService<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Products with stock strictly below `threshold` (10 when absent),
    /// ascending by quantity.
    #[tracing::instrument(skip(self))]
    pub async fn low_stock(&self, threshold: Option<i64>) -> Result<LowStockReport, ReportError> {
        let threshold = threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);

        let products = self
            .store
            .products_below(threshold)
            .await
            .map_err(ReportError::from);
        let products = self.settle(products).await?;

        metrics::counter!("reports_generated_total", "report" => "low_stock").increment(1);
        tracing::debug!(threshold, count = products.len(), "low-stock scan complete");
        Ok(LowStockReport {
            threshold,
            products,
        })
    }

    /// Report for the current calendar day or month in server-local time.
    pub async fn window_report(&self, window: ReportWindow) -> Result<WindowReport, ReportError> {
        self.window_report_in(window, &Local).await
    }

    /// Report for the calendar window containing the clock's current time in `tz`.
    #[tracing::instrument(skip(self, tz))]
    pub async fn window_report_in<Tz: TimeZone>(
        &self,
        window: ReportWindow,
        tz: &Tz,
    ) -> Result<WindowReport, ReportError> {
        let (start, end) = window.bounds_in(self.clock.now(), tz)?;

        let entries = self
            .store
            .ledger_entries(start, end)
            .await
            .map_err(ReportError::from);
        let entries = self.settle(entries).await?;
        let rows = summarize(&entries);

        metrics::counter!("reports_generated_total", "report" => window.as_str()).increment(1);
        tracing::debug!(%start, %end, entries = entries.len(), rows = rows.len(), "window report built");
        Ok(WindowReport {
            window,
            start,
            end,
            rows,
        })
    }

    async fn settle<T>(&self, result: Result<T, ReportError>) -> Result<T, ReportError> {
        if let Err(err) = &result
            && let Some(store_err) = err.store_error()
        {
            self.store.handle_failure(store_err).await;
        }
        result
    }
}
