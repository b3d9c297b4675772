use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::error::Result;
use crate::session::{self, Session};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/login", post(handler))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    api_key: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    status: &'static str,
}

/// Check key format locally, then ask the store whether it accepts the key.
async fn handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    // ---
    let key = req.api_key.trim();
    session::validate_key_format(key)?;

    let session = Session::new(key);
    state.store.ping(&session).await?;

    info!("POST /login - key accepted: {:?}", session);
    Ok(Json(LoginResponse { status: "ok" }))
}
