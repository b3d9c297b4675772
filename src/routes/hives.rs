use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::AppState;
use crate::engine::{self, HiveStatus};
use crate::error::Result;
use crate::models::{type_catalog, Hive, Notification, Reading, RecordId};
use crate::session::Session;
use crate::weather::Weather;

// ---

/// Readings returned for the hive chart.
const CHART_READINGS: usize = 30;

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/hives/{arn_id}", get(handler))
}

#[derive(Debug, Serialize)]
pub struct HiveReport {
    pub hive: Hive,
    pub fill_state: &'static str,
    pub status: HiveStatus,
    pub recent_readings: Vec<Reading>,
    pub notifications: Vec<Notification>,
    pub weather: Option<Weather>,
}

async fn handler(
    State(state): State<AppState>,
    session: Session,
    Path(arn_id): Path<String>,
) -> Result<Json<HiveReport>> {
    // ---
    info!("GET /hives/{} - Loading hive", arn_id);
    let hive_id = RecordId::from(arn_id.as_str());

    // Step 1: the hive itself; absence ends the page
    let hive = state.store.find_hive(&session, &hive_id).await?;

    // Step 2: sensor assignments and their measurement types
    debug!("GET /hives/{} - Step 2", hive_id);
    let assignments = state.store.assignments_for_hive(&session, &hive_id).await?;

    let mut type_ids: Vec<RecordId> = Vec::new();
    for id in assignments.iter().filter_map(|a| a.type_id.clone()) {
        if !type_ids.contains(&id) {
            type_ids.push(id);
        }
    }
    let types = match state.store.measurement_types(&session, &type_ids).await {
        Ok(types) => types,
        Err(e) => {
            warn!("Measurement types unavailable for hive {}: {}", hive_id, e);
            Vec::new()
        }
    };
    let catalog = type_catalog(&types);

    // Step 3: readings, newest first, labelled with their measurement type
    debug!("GET /hives/{} - Step 3", hive_id);
    let sensor_ids: Vec<RecordId> = assignments
        .iter()
        .filter_map(|a| a.sensor_id.clone())
        .collect();
    let mut readings = state
        .store
        .readings_for_sensors(&session, &sensor_ids)
        .await?;
    engine::sort_newest_first(&mut readings);
    engine::enrich_readings(&mut readings, &assignments, &catalog);

    // Step 4: resolution and alarm
    let status = engine::evaluate_hive(&assignments, &catalog, &readings);
    info!(
        "GET /hives/{} - {} assignments, {} readings, alarm={:?}",
        hive_id,
        assignments.len(),
        readings.len(),
        status.alarm
    );

    // Step 5: secondary panels; failures here never fail the page
    let (notifications, weather) = tokio::join!(
        hive_notifications(&state, &session, &hive_id),
        apiary_weather(&state, &session, &hive),
    );

    readings.truncate(CHART_READINGS);
    Ok(Json(HiveReport {
        fill_state: hive.fill_state(),
        hive,
        status,
        recent_readings: readings,
        notifications,
        weather,
    }))
}

/// Notifications addressed to the hive, else all notifications.
async fn hive_notifications(
    state: &AppState,
    session: &Session,
    hive_id: &RecordId,
) -> Vec<Notification> {
    // ---
    match state.store.notifications_for_hive(session, hive_id).await {
        Ok(list) if !list.is_empty() => return list,
        Ok(_) => debug!("No notifications for hive {}, showing all", hive_id),
        Err(e) => warn!("Hive notifications query failed, showing all: {}", e),
    }

    state.store.notifications(session).await.unwrap_or_else(|e| {
        warn!("Notifications unavailable: {}", e);
        Vec::new()
    })
}

async fn apiary_weather(state: &AppState, session: &Session, hive: &Hive) -> Option<Weather> {
    // ---
    let apiary_id = hive.apiary_id.as_ref()?;
    let apiary = match state.store.find_apiary(session, apiary_id).await {
        Ok(apiary) => apiary,
        Err(e) => {
            warn!("Apiary {} unavailable for weather: {}", apiary_id, e);
            return None;
        }
    };

    match state.weather.current(apiary.coordinates?).await {
        Ok(weather) => Some(weather),
        Err(e) => {
            warn!("Weather unavailable for apiary {}: {}", apiary_id, e);
            None
        }
    }
}
