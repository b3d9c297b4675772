use axum::{
    extract::{Path, State},
    routing::{patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::AppState;
use crate::error::Result;
use crate::models::SensorAssignment;
use crate::sensors;
use crate::session::Session;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/sensors/{record_id}/thresholds", patch(set_thresholds))
        .route("/sensors/{record_id}/toggle", post(toggle))
}

/// Threshold form values: strings as typed, numbers, or null.
///
/// Both fields are required. An empty string or null clears that bound;
/// a body omitting either field is rejected before any store call.
#[derive(Debug, Deserialize)]
pub struct ThresholdBody {
    min: Value,
    max: Value,
}

async fn set_thresholds(
    State(state): State<AppState>,
    session: Session,
    Path(record_id): Path<String>,
    Json(body): Json<ThresholdBody>,
) -> Result<Json<SensorAssignment>> {
    // ---
    info!("PATCH /sensors/{}/thresholds", record_id);
    let updated = sensors::set_threshold(
        &state.store,
        &session,
        &state.in_flight,
        &record_id,
        &body.min,
        &body.max,
    )
    .await?;
    Ok(Json(updated))
}

async fn toggle(
    State(state): State<AppState>,
    session: Session,
    Path(record_id): Path<String>,
) -> Result<Json<SensorAssignment>> {
    // ---
    info!("POST /sensors/{}/toggle", record_id);
    let updated =
        sensors::toggle_sensor_active(&state.store, &session, &state.in_flight, &record_id)
            .await?;
    Ok(Json(updated))
}
