use ledger_store::StoreError;
use thiserror::Error;

/// Errors that can occur while building a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(#[source] StoreError),

    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
}

impl ReportError {
    /// The storage failure behind this error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ReportError::ServiceUnavailable(e) | ReportError::Storage(e) => Some(e),
            ReportError::InvalidInput(_) => None,
        }
    }
}

impl From<StoreError> for ReportError {
    fn from(err: StoreError) -> Self {
        if err.is_unavailable() {
            ReportError::ServiceUnavailable(err)
        } else {
            ReportError::Storage(err)
        }
    }
}
