//! Sensor snapshot handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::pipeline::{IngestOutcome, PrototypeView};
use crate::reading::Readings;

use super::{ApiError, AppState, Envelope};

pub(super) async fn current(
    State(state): State<AppState>,
) -> Result<Json<Envelope<PrototypeView>>, ApiError> {
    let view = state.prototype.current().await?;
    Ok(Envelope::ok(view))
}

pub(super) async fn ingest(
    State(state): State<AppState>,
    payload: Result<Json<Readings>, JsonRejection>,
) -> Result<Json<Envelope<IngestOutcome>>, ApiError> {
    let Json(update) = payload.map_err(|rejection| ApiError::invalid_json(&rejection))?;
    let outcome = state.prototype.ingest(update).await?;
    Ok(Envelope::with_message(
        "Prototype data updated successfully",
        outcome,
    ))
}
