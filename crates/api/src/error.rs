//! API error types with HTTP response mapping.
//!
//! Every failure is rendered as `{success: false, error, details?, disponible?}`.
//! `details` carries the underlying failure and is only kept when the server
//! runs in diagnostic mode (see [`crate::state::AppState::fail`]).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::InventoryError;
use reports::ReportError;
use serde::Serialize;

/// API-level error that maps to an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
    available: Option<i64>,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disponible: Option<i64>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            available: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn with_details(mut self, details: impl ToString) -> Self {
        self.details = Some(details.to_string());
        self
    }

    /// Replaces the message of a server-side failure; client errors keep theirs.
    pub fn context(mut self, message: impl Into<String>) -> Self {
        if self.status == StatusCode::INTERNAL_SERVER_ERROR {
            self.message = message.into();
        }
        self
    }

    pub fn without_details(mut self) -> Self {
        self.details = None;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, details = ?self.details, "request failed");
        }

        let body = ErrorBody {
            success: false,
            error: self.message,
            details: self.details,
            disponible: self.available,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        let details = err.to_string();
        let api_error = match &err {
            InventoryError::InvalidInput(msg) => {
                ApiError::bad_request(format!("Datos inválidos: {msg}"))
            }
            InventoryError::NotFound { entity, .. } => {
                let message = match *entity {
                    "product" => "Producto no encontrado".to_string(),
                    "user" => "Usuario no encontrado".to_string(),
                    "role" => "Rol no encontrado".to_string(),
                    other => format!("No encontrado: {other}"),
                };
                ApiError::new(StatusCode::NOT_FOUND, message)
            }
            InventoryError::InsufficientStock { available, .. } => ApiError {
                available: Some(*available),
                ..ApiError::bad_request(format!("Stock insuficiente. Disponible: {available}"))
            },
            InventoryError::DuplicateKey { constraint } => {
                let message = if constraint.contains("email") {
                    "El email ya existe"
                } else if constraint.contains("name") {
                    "Producto ya existe"
                } else {
                    "Registro duplicado"
                };
                ApiError::new(StatusCode::CONFLICT, message)
            }
            InventoryError::TransactionFailed(_) | InventoryError::Credential(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error en la transacción")
            }
            InventoryError::ServiceUnavailable(_) => unavailable(),
        };
        api_error.with_details(details)
    }
}

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        let details = err.to_string();
        let api_error = match &err {
            ReportError::InvalidInput(msg) => ApiError::bad_request(format!("Datos inválidos: {msg}")),
            ReportError::ServiceUnavailable(_) => unavailable(),
            ReportError::Storage(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error al generar el reporte")
            }
        };
        api_error.with_details(details)
    }
}

fn unavailable() -> ApiError {
    ApiError::new(
        StatusCode::SERVICE_UNAVAILABLE,
        "Servicio no disponible. Intente nuevamente.",
    )
}
