//! Sensor resolution and alarm engine.
//!
//! Given a hive's sensor assignments, the measurement-type catalog and its
//! readings, decides which assignment serves each monitored kind, what the
//! latest value is, whether it breaches the configured thresholds, and the
//! hive's aggregate alarm state. Everything here is pure: absence of a
//! sensor or a value is a normal outcome, never an error.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::adapter::{self, SENSOR_MAX, SENSOR_MIN};
use crate::error::{AppError, Result};
use crate::models::{
    AlarmState, MeasurementKind, RawValue, Reading, SensorAssignment, TypeCatalog,
};

// ---

/// Label of the assignment's measurement type, via the catalog.
fn catalog_label<'c>(assignment: &SensorAssignment, catalog: &'c TypeCatalog) -> Option<&'c str> {
    assignment
        .type_id
        .as_ref()
        .and_then(|id| catalog.get(id))
        .map(String::as_str)
}

/// Assignments whose catalog label names `kind`, in store order.
///
/// The active flag is not consulted: a disabled assignment still resolves.
fn catalog_matches<'a>(
    kind: MeasurementKind,
    assignments: &'a [SensorAssignment],
    catalog: &TypeCatalog,
) -> Vec<&'a SensorAssignment> {
    assignments
        .iter()
        .filter(|a| catalog_label(a, catalog).is_some_and(|label| kind.matches(label)))
        .collect()
}

/// Find the assignment serving `kind` for one hive.
///
/// Primary path: the first assignment whose catalog label contains the
/// kind's needle. Fallback: the first reading whose denormalized label
/// matches, then the assignment with that reading's sensor id.
pub fn resolve_sensor_for_kind<'a>(
    kind: MeasurementKind,
    assignments: &'a [SensorAssignment],
    catalog: &TypeCatalog,
    readings: &[Reading],
) -> Option<&'a SensorAssignment> {
    // ---
    if let Some(&direct) = catalog_matches(kind, assignments, catalog).first() {
        return Some(direct);
    }

    let reading = readings
        .iter()
        .find(|r| r.type_label.as_deref().is_some_and(|label| kind.matches(label)))?;
    let sensor_id = reading.sensor_id.as_ref()?;

    assignments
        .iter()
        .find(|a| a.sensor_id.as_ref() == Some(sensor_id))
}

/// Raw value of the first reading, in encounter order, labelled with `kind`.
///
/// Does not sort; callers wanting recency pass readings newest-first.
pub fn latest_value_for_kind(kind: MeasurementKind, readings: &[Reading]) -> Option<&RawValue> {
    // ---
    readings
        .iter()
        .find(|r| r.type_label.as_deref().is_some_and(|label| kind.matches(label)))
        .and_then(|r| r.value.as_ref())
}

/// Whether `value` falls outside the sensor's thresholds.
///
/// Missing value, unparsable value, missing sensor and unset bounds never
/// breach. Bounds are exclusive: a value equal to min or max is fine.
pub fn is_breached(value: Option<&RawValue>, sensor: Option<&SensorAssignment>) -> bool {
    // ---
    let (Some(value), Some(sensor)) = (value.and_then(RawValue::to_number), sensor) else {
        return false;
    };

    if sensor.min.is_some_and(|min| value < min) {
        return true;
    }
    sensor.max.is_some_and(|max| value > max)
}

pub fn hive_alarm_state(weight: bool, temperature: bool, humidity: bool) -> AlarmState {
    // ---
    if weight || temperature || humidity {
        AlarmState::Alarm
    } else {
        AlarmState::Ok
    }
}

/// Copy each reading's measurement-type label from its assignment.
///
/// Readings already carrying a label keep it. Sensor ids compare in their
/// normalized string form.
pub fn enrich_readings(
    readings: &mut [Reading],
    assignments: &[SensorAssignment],
    catalog: &TypeCatalog,
) {
    // ---
    for reading in readings.iter_mut().filter(|r| r.type_label.is_none()) {
        let Some(sensor_id) = reading.sensor_id.as_ref() else {
            continue;
        };
        reading.type_label = assignments
            .iter()
            .find(|a| a.sensor_id.as_ref() == Some(sensor_id))
            .and_then(|a| catalog_label(a, catalog))
            .filter(|label| !label.is_empty())
            .map(str::to_string);
    }
}

/// Stable sort newest-first; readings without a parseable timestamp go last.
pub fn sort_newest_first(readings: &mut [Reading]) {
    // ---
    readings.sort_by(|a, b| {
        let ta = a.recorded_at.as_ref().and_then(|t| t.utc);
        let tb = b.recorded_at.as_ref().and_then(|t| t.utc);
        tb.cmp(&ta)
    });
}

// --- thresholds

/// Validated threshold pair; `None` clears the bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPatch {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ThresholdPatch {
    /// Partial-update document touching exactly the two threshold fields.
    pub fn to_document(&self) -> Value {
        // ---
        let mut doc = Map::new();
        doc.insert(SENSOR_MIN.to_string(), json!(self.min));
        doc.insert(SENSOR_MAX.to_string(), json!(self.max));
        Value::Object(doc)
    }

    pub fn apply(&self, assignment: &mut SensorAssignment) {
        assignment.min = self.min;
        assignment.max = self.max;
    }
}

/// One threshold bound as typed by the user: null or empty clears it.
fn parse_bound(name: &str, input: &Value) -> Result<Option<f64>> {
    // ---
    match input {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => adapter::parse_decimal(s)
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("{name} is not a number: '{s}'"))),
        Value::Number(n) => n
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("{name} is not a finite number"))),
        other => Err(AppError::Validation(format!(
            "{name} must be a number or a string, got {other}"
        ))),
    }
}

/// Validate a threshold edit before anything touches the network.
pub fn validate_thresholds(min: &Value, max: &Value) -> Result<ThresholdPatch> {
    // ---
    let min = parse_bound("min", min)?;
    let max = parse_bound("max", max)?;

    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(AppError::Validation(format!(
                "min greater than max ({lo} > {hi})"
            )));
        }
    }

    Ok(ThresholdPatch { min, max })
}

// --- hive evaluation

#[derive(Debug, Clone, Serialize)]
pub struct KindStatus {
    pub kind: MeasurementKind,
    pub sensor: Option<SensorAssignment>,
    pub latest: Option<RawValue>,
    pub value: Option<f64>,
    pub breached: bool,
}

/// Configuration problem found while resolving sensors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigIssue {
    pub kind: MeasurementKind,
    pub record_ids: Vec<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HiveStatus {
    pub kinds: Vec<KindStatus>,
    pub alarm: AlarmState,
    pub issues: Vec<ConfigIssue>,
}

impl HiveStatus {
    pub fn kind(&self, kind: MeasurementKind) -> Option<&KindStatus> {
        self.kinds.iter().find(|k| k.kind == kind)
    }
}

/// Assignments matching `kind` through the catalog, when more than one.
///
/// Candidates come in the order the resolver walks them, so the first
/// record id is the one actually used.
pub fn duplicate_kind(
    kind: MeasurementKind,
    assignments: &[SensorAssignment],
    catalog: &TypeCatalog,
) -> Option<ConfigIssue> {
    // ---
    let matching = catalog_matches(kind, assignments, catalog);
    if matching.len() < 2 {
        return None;
    }

    let record_ids: Vec<String> = matching
        .iter()
        .map(|a| a.record_id.clone().unwrap_or_else(|| "?".to_string()))
        .collect();
    let active = matching.iter().filter(|a| a.active).count();
    let hive = matching[0]
        .hive_id
        .as_ref()
        .map(|h| h.to_string())
        .unwrap_or_else(|| "?".to_string());

    Some(ConfigIssue {
        kind,
        message: format!(
            "duplicate sensor kind '{}' on hive {}: {} assignments ({} active), using {}",
            kind.needle(),
            hive,
            matching.len(),
            active,
            record_ids[0]
        ),
        record_ids,
    })
}

/// Resolve all monitored kinds and derive the hive's alarm state.
pub fn evaluate_hive(
    assignments: &[SensorAssignment],
    catalog: &TypeCatalog,
    readings: &[Reading],
) -> HiveStatus {
    // ---
    let mut issues = Vec::new();
    let kinds: Vec<KindStatus> = MeasurementKind::ALL
        .iter()
        .map(|&kind| {
            if let Some(issue) = duplicate_kind(kind, assignments, catalog) {
                tracing::warn!("{}", issue.message);
                issues.push(issue);
            }

            let sensor = resolve_sensor_for_kind(kind, assignments, catalog, readings);
            let latest = latest_value_for_kind(kind, readings);
            let breached = is_breached(latest, sensor);

            KindStatus {
                kind,
                sensor: sensor.cloned(),
                value: latest.and_then(RawValue::to_number),
                latest: latest.cloned(),
                breached,
            }
        })
        .collect();

    let breach_of = |kind: MeasurementKind| kinds.iter().any(|k| k.kind == kind && k.breached);
    let alarm = hive_alarm_state(
        breach_of(MeasurementKind::Weight),
        breach_of(MeasurementKind::Temperature),
        breach_of(MeasurementKind::Humidity),
    );

    HiveStatus {
        kinds,
        alarm,
        issues,
    }
}
