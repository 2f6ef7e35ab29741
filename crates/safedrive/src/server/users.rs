//! Account operation handler.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::error::Error;
use crate::users::{OperationReply, UserOperation};

use super::{ApiError, AppState};

pub(super) async fn operations(
    State(state): State<AppState>,
    payload: Result<Json<UserOperation>, JsonRejection>,
) -> Result<Json<OperationReply>, ApiError> {
    let Json(operation) = payload.map_err(|rejection| ApiError::invalid_json(&rejection))?;
    let store = state
        .users
        .lock()
        .map_err(|_| Error::internal("user store lock poisoned"))?;
    let reply = operation.execute(&store)?;
    Ok(Json(reply))
}
