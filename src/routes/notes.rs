use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::error::{AppError, Result};
use crate::models::RecordId;
use crate::notes::Note;
use crate::session::Session;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route(
        "/apiaries/{api_id}/hives/{arn_id}/note",
        get(get_note).put(put_note),
    )
}

#[derive(Debug, Deserialize)]
pub struct NoteBody {
    body: String,
    /// Version the client last saw; omitted to overwrite unconditionally.
    expected_version: Option<i64>,
}

fn note_key(api_id: &str, arn_id: &str) -> (RecordId, RecordId) {
    (RecordId::from(api_id), RecordId::from(arn_id))
}

// Notes are local, but still only for logged-in clients.
async fn get_note(
    State(state): State<AppState>,
    _session: Session,
    Path((api_id, arn_id)): Path<(String, String)>,
) -> Result<Json<Note>> {
    // ---
    let (apiary, hive) = note_key(&api_id, &arn_id);
    state
        .notes
        .get(&apiary, &hive)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("note for apiary {apiary}, hive {hive}")))
}

async fn put_note(
    State(state): State<AppState>,
    _session: Session,
    Path((api_id, arn_id)): Path<(String, String)>,
    Json(req): Json<NoteBody>,
) -> Result<Json<Note>> {
    // ---
    let (apiary, hive) = note_key(&api_id, &arn_id);
    let note = state
        .notes
        .put(&apiary, &hive, &req.body, req.expected_version)
        .await?;
    info!(
        "PUT note apiary={} hive={} version={}",
        apiary, hive, note.version
    );
    Ok(Json(note))
}
