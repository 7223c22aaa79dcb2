//! Read-only reports over the inventory ledger.
//!
//! Reports take no locks and may observe a mix of before and after states of
//! concurrent stock movements.

pub mod error;
pub mod low_stock;
pub mod service;
pub mod summary;
pub mod window;

pub use error::ReportError;
pub use low_stock::{DEFAULT_LOW_STOCK_THRESHOLD, LowStockReport};
pub use service::{ReportService, WindowReport};
pub use summary::{ProductSummary, summarize};
pub use window::ReportWindow;
