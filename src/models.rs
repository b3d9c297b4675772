//! Normalized data models for the apiary dashboard.
//!
//! Remote documents are loosely shaped; [`crate::adapter`] maps them into
//! these types so the engine and routes only ever see one shape. Fields are
//! optional exactly where the upstream schema is inconsistent.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapter;

// ---

/// Identifier normalized to its string form, so `7` and `"7"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric form, when the identifier is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for RecordId {
    fn from(v: i64) -> Self {
        RecordId(v.to_string())
    }
}

impl From<&str> for RecordId {
    fn from(v: &str) -> Self {
        RecordId(v.trim().to_string())
    }
}

/// A reading or threshold value exactly as the store sent it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Numeric value, accepting `,` as decimal separator.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) if n.is_finite() => Some(*n),
            RawValue::Number(_) => None,
            RawValue::Text(s) => adapter::parse_decimal(s),
        }
    }
}

/// Timestamp as sent, plus its UTC instant when it parses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timestamp {
    pub raw: String,
    pub utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Apiary {
    pub id: Option<RecordId>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hive {
    pub id: Option<RecordId>,
    pub apiary_id: Option<RecordId>,
    pub installed_on: Option<String>,
    pub full: bool,
    pub mac_address: Option<String>,
    pub name: Option<String>,
}

impl Hive {
    /// Fill state shown on the hive page.
    pub fn fill_state(&self) -> &'static str {
        if self.full {
            "OK"
        } else {
            "NON OK"
        }
    }
}

/// Binding of a hive to a sensor instance and its measurement type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorAssignment {
    /// Opaque store record id, required for partial updates.
    pub record_id: Option<String>,
    pub sensor_id: Option<RecordId>,
    pub hive_id: Option<RecordId>,
    pub type_id: Option<RecordId>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub active: bool,
    /// Field name the active flag was read from, if any.
    #[serde(skip)]
    pub active_field: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementType {
    pub id: Option<RecordId>,
    pub label: String,
}

/// Measurement-type id to label.
pub type TypeCatalog = HashMap<RecordId, String>;

pub fn type_catalog(types: &[MeasurementType]) -> TypeCatalog {
    // ---
    types
        .iter()
        .filter_map(|t| t.id.clone().map(|id| (id, t.label.clone())))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub record_id: Option<String>,
    pub sensor_id: Option<RecordId>,
    pub value: Option<RawValue>,
    pub recorded_at: Option<Timestamp>,
    /// Denormalized measurement-type label copied from the assignment.
    pub type_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub record_id: Option<String>,
    pub hive_id: Option<RecordId>,
    pub title: String,
    pub description: String,
    pub created_at: Option<Timestamp>,
}

/// The three kinds this system monitors and alarms on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    Weight,
    Temperature,
    Humidity,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 3] = [
        MeasurementKind::Weight,
        MeasurementKind::Temperature,
        MeasurementKind::Humidity,
    ];

    /// Lower-case substring matched against measurement-type labels.
    pub fn needle(self) -> &'static str {
        match self {
            MeasurementKind::Weight => "peso",
            MeasurementKind::Temperature => "temperatura",
            MeasurementKind::Humidity => "umid",
        }
    }

    /// Case-insensitive containment of the needle in `label`.
    pub fn matches(self, label: &str) -> bool {
        label.to_lowercase().contains(self.needle())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmState {
    Ok,
    Alarm,
}
