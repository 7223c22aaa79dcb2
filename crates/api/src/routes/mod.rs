pub mod health;
pub mod index;
pub mod metrics;
pub mod products;
pub mod reports;
pub mod transactions;
pub mod users;

use axum::extract::rejection::{JsonRejection, QueryRejection};

use crate::error::ApiError;

/// A body that is not valid JSON for the endpoint.
pub(crate) fn malformed(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request("JSON inválido").with_details(rejection.body_text())
}

/// A query string that does not parse.
pub(crate) fn malformed_query(rejection: QueryRejection) -> ApiError {
    ApiError::bad_request("Parámetros inválidos").with_details(rejection.body_text())
}
