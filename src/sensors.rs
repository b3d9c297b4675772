//! Mutations on sensor assignments: threshold edits and enable/disable.
//!
//! Both are partial updates of one assignment record. Input is validated
//! before any network effect and a write for the same record must not
//! already be in flight. The assignment is loaded, patched, and the local
//! copy returned to the caller changes only after the store confirms.

use serde_json::{Map, Value};
use tracing::info;

use crate::adapter::SENSOR_ACTIVE;
use crate::engine;
use crate::error::{AppError, Result};
use crate::guard::InFlight;
use crate::models::SensorAssignment;
use crate::session::Session;
use crate::store::RestDbClient;

// ---

/// Accept only plain store record ids: ASCII letters, digits, `-` and `_`.
pub fn validate_record_id(record_id: &str) -> Result<()> {
    // ---
    let plain = !record_id.is_empty()
        && record_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if plain {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "invalid sensor assignment id {record_id:?}"
        )))
    }
}

/// Set or clear the min/max thresholds of assignment `record_id`.
///
/// Empty or null input clears a bound. Non-numeric input and min > max are
/// rejected without contacting the store.
pub async fn set_threshold(
    store: &RestDbClient,
    session: &Session,
    in_flight: &InFlight,
    record_id: &str,
    new_min: &Value,
    new_max: &Value,
) -> Result<SensorAssignment> {
    // ---
    validate_record_id(record_id)?;
    let patch = engine::validate_thresholds(new_min, new_max)?;

    let _guard = in_flight.acquire(record_id)?;
    let mut assignment = store.get_assignment(session, record_id).await?;
    store
        .patch_assignment(session, record_id, &patch.to_document())
        .await?;

    patch.apply(&mut assignment);
    info!(
        "Thresholds of {} set to min={:?} max={:?}",
        record_id, patch.min, patch.max
    );
    Ok(assignment)
}

/// Flip the active flag of assignment `record_id`.
///
/// Writes back to whichever field the flag was read from, or the canonical
/// field when the record had none.
pub async fn toggle_sensor_active(
    store: &RestDbClient,
    session: &Session,
    in_flight: &InFlight,
    record_id: &str,
) -> Result<SensorAssignment> {
    // ---
    validate_record_id(record_id)?;
    let _guard = in_flight.acquire(record_id)?;
    let mut assignment = store.get_assignment(session, record_id).await?;

    let field = assignment.active_field.unwrap_or(SENSOR_ACTIVE[0]);
    let next = !assignment.active;

    let mut doc = Map::new();
    doc.insert(field.to_string(), Value::Bool(next));
    store
        .patch_assignment(session, record_id, &Value::Object(doc))
        .await?;

    assignment.active = next;
    assignment.active_field = Some(field);
    info!(
        "Sensor assignment {} {}",
        record_id,
        if next { "enabled" } else { "disabled" }
    );
    Ok(assignment)
}
