//! Stock movement endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use inventory::{RecordTransaction, StockChange};
use ledger_store::{LedgerStore, ProductId, TransactionId, TransactionKind, UserId};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct TransactionRequest {
    pub tipo: TransactionKind,
    pub cantidad: i64,
    pub producto_id: ProductId,
    pub usuario_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: TransactionId,
    pub tipo: TransactionKind,
    pub cantidad: i64,
    pub producto_id: ProductId,
    pub usuario_id: UserId,
    pub fecha: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct TransactionCreatedResponse {
    pub success: bool,
    pub transaccion: TransactionView,
    pub stock_actual: i64,
}

impl From<StockChange> for TransactionCreatedResponse {
    fn from(change: StockChange) -> Self {
        let t = change.transaction;
        Self {
            success: true,
            transaccion: TransactionView {
                id: t.id,
                tipo: t.kind,
                cantidad: t.quantity,
                producto_id: t.product_id,
                usuario_id: t.user_id,
                fecha: t.created_at,
            },
            stock_actual: change.stock_after,
        }
    }
}

/// POST /transacciones: move stock in (`entrada`) or out (`salida`).
#[tracing::instrument(skip(state, payload))]
pub async fn record<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionCreatedResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| state.fail(super::malformed(e)))?;

    let change = state
        .stock
        .record(RecordTransaction {
            kind: req.tipo,
            quantity: req.cantidad,
            product_id: req.producto_id,
            user_id: req.usuario_id,
        })
        .await
        .map_err(|e| state.fail(e))?;

    Ok((StatusCode::CREATED, Json(change.into())))
}
