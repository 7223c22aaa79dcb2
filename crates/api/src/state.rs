use std::sync::Arc;

use inventory::{CatalogService, StockService, UserService};
use ledger_store::{Clock, LedgerStore, SystemClock};
use reports::ReportService;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: LedgerStore> {
    pub catalog: CatalogService<S>,
    pub users: UserService<S>,
    pub stock: StockService<S>,
    pub reports: ReportService<S>,
    /// Keep failure details in error bodies.
    pub diagnostics: bool,
}

impl<S: LedgerStore + Clone> AppState<S> {
    pub fn new(store: S, diagnostics: bool) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), diagnostics)
    }

    /// Builds the state with an explicit clock for report windows.
    pub fn with_clock(store: S, clock: Arc<dyn Clock>, diagnostics: bool) -> Self {
        Self {
            catalog: CatalogService::new(store.clone()),
            users: UserService::new(store.clone()),
            stock: StockService::new(store.clone()),
            reports: ReportService::with_clock(store, clock),
            diagnostics,
        }
    }
}

impl<S: LedgerStore> AppState<S> {
    /// Converts a service failure into a response, dropping its details
    /// outside diagnostic mode.
    pub fn fail(&self, err: impl Into<ApiError>) -> ApiError {
        let err = err.into();
        if self.diagnostics {
            err
        } else {
            err.without_details()
        }
    }
}
