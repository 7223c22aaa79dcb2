//! User registration endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use inventory::RegisterUser;
use ledger_store::{LedgerStore, User, UserId};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role_id: Option<i32>,
}

/// A user as returned to clients; the credential never leaves the server.
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub nombre: String,
    pub email: String,
    pub role_id: i32,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            nombre: user.name,
            email: user.email,
            role_id: user.role_id,
        }
    }
}

#[derive(Serialize)]
pub struct UserCreatedResponse {
    pub success: bool,
    pub usuario: UserView,
}

/// POST /registrar: register a user with a hashed password.
#[tracing::instrument(skip(state, payload))]
pub async fn register<S: LedgerStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserCreatedResponse>), ApiError> {
    let Json(req) = payload.map_err(|e| state.fail(super::malformed(e)))?;

    let user = state
        .users
        .register(RegisterUser {
            name: req.nombre,
            email: req.email,
            password: req.password,
            role_id: req.role_id,
        })
        .await
        .map_err(|e| state.fail(e).context("Error al registrar usuario"))?;

    Ok((
        StatusCode::CREATED,
        Json(UserCreatedResponse {
            success: true,
            usuario: user.into(),
        }),
    ))
}
