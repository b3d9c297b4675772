use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::AppState;
use crate::error::{AppError, Result};
use crate::models::{Apiary, Coordinates, Hive, Notification, RecordId};
use crate::session::Session;
use crate::weather::Weather;

// ---

/// Map center used when no apiary has coordinates.
pub const DEFAULT_MAP_CENTER: Coordinates = Coordinates {
    lat: 43.385117,
    lon: 12.203588,
};

/// Notifications shown on the home page.
const HOME_NOTIFICATION_LIMIT: usize = 50;

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/apiaries", get(overview))
        .route("/apiaries/{api_id}", get(detail))
        .route("/apiaries/{api_id}/weather", get(weather))
}

#[derive(Debug, Serialize)]
struct Overview {
    apiaries: Vec<Apiary>,
    with_coordinates: usize,
    map_center: Coordinates,
    notifications: Vec<Notification>,
}

#[derive(Debug, Serialize)]
struct ApiaryDetail {
    apiary: Apiary,
    hives: Vec<Hive>,
    notifications: Vec<Notification>,
}

/// First apiary with coordinates, else the default center.
fn map_center(apiaries: &[Apiary]) -> Coordinates {
    apiaries
        .iter()
        .find_map(|a| a.coordinates)
        .unwrap_or(DEFAULT_MAP_CENTER)
}

async fn overview(State(state): State<AppState>, session: Session) -> Result<Json<Overview>> {
    // ---
    info!("GET /apiaries");

    let (apiaries, mut notifications) = tokio::try_join!(
        state.store.list_apiaries(&session),
        state.store.notifications(&session),
    )?;
    notifications.truncate(HOME_NOTIFICATION_LIMIT);

    let with_coordinates = apiaries.iter().filter(|a| a.coordinates.is_some()).count();
    debug!(
        "Apiaries with coordinates: {} / {}",
        with_coordinates,
        apiaries.len()
    );

    Ok(Json(Overview {
        map_center: map_center(&apiaries),
        with_coordinates,
        apiaries,
        notifications,
    }))
}

async fn detail(
    State(state): State<AppState>,
    session: Session,
    Path(api_id): Path<String>,
) -> Result<Json<ApiaryDetail>> {
    // ---
    info!("GET /apiaries/{}", api_id);
    let api_id = RecordId::from(api_id.as_str());

    let apiary = state.store.find_apiary(&session, &api_id).await?;
    let hives = state.store.hives_for_apiary(&session, &api_id).await?;

    // Notifications are secondary here; a failure leaves the list empty.
    let notifications = match state.store.notifications(&session).await {
        Ok(n) => n,
        Err(e) => {
            warn!("Notifications unavailable for apiary {}: {}", api_id, e);
            Vec::new()
        }
    };

    Ok(Json(ApiaryDetail {
        apiary,
        hives,
        notifications,
    }))
}

async fn weather(
    State(state): State<AppState>,
    session: Session,
    Path(api_id): Path<String>,
) -> Result<Json<Weather>> {
    // ---
    info!("GET /apiaries/{}/weather", api_id);
    let api_id = RecordId::from(api_id.as_str());

    let apiary = state.store.find_apiary(&session, &api_id).await?;
    let at = apiary
        .coordinates
        .ok_or_else(|| AppError::NotFound(format!("coordinates of apiary {api_id}")))?;

    Ok(Json(state.weather.current(at).await?))
}
