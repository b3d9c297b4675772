//! Schema adapter: raw store documents into normalized models.
//!
//! The store's schema is external and inconsistent across records. Every
//! "which field holds this concept" decision lives here, as an ordered list
//! of field names (or accessor functions) per concept. The first entry that
//! yields a usable value wins. Nothing outside this module reads raw
//! document fields.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::models::{
    Apiary, Coordinates, Hive, MeasurementType, Notification, RawValue, Reading, RecordId,
    SensorAssignment, Timestamp,
};

// ---

pub const RECORD_ID: &[&str] = &["_id"];

pub const APIARY_ID: &[&str] = &["api_id"];
pub const APIARY_NAME: &[&str] = &["api_nome", "nome", "name"];
pub const APIARY_PLACE: &[&str] = &["api_luogo", "luogo"];
pub const APIARY_LAT: &[&str] = &["api_lat", "lat", "latitude"];
pub const APIARY_LON: &[&str] = &["api_lon", "api_lng", "lon", "lng", "longitude"];
pub const APIARY_NESTED: &[&str] = &["location", "api_location", "posizione"];
pub const NESTED_LAT: &[&str] = &["lat", "latitude"];
pub const NESTED_LON: &[&str] = &["lng", "lon", "longitude"];
pub const GEOJSON_PAIR: &[&str] = &["coordinates", "api_coordinates"];

pub const HIVE_ID: &[&str] = &["arn_id"];
pub const HIVE_APIARY: &[&str] = &["arn_api_id"];
pub const HIVE_INSTALLED: &[&str] = &["arn_dataInst"];
pub const HIVE_FULL: &[&str] = &["arn_piena"];
pub const HIVE_MAC: &[&str] = &["arn_MacAddress", "arn_mac"];
pub const HIVE_NAME: &[&str] = &["arn_nome", "nome"];

pub const SENSOR_ID: &[&str] = &["sea_id"];
pub const SENSOR_HIVE: &[&str] = &["sea_arn_id"];
pub const SENSOR_TYPE: &[&str] = &["sea_tip_id"];
pub const SENSOR_MIN: &str = "sea_min";
pub const SENSOR_MAX: &str = "sea_max";
pub const SENSOR_ACTIVE: &[&str] = &[
    "sea_attivo",
    "sea_active",
    "sea_enabled",
    "attivo",
    "active",
    "enabled",
];

pub const TYPE_ID: &[&str] = &["tip_id"];
pub const TYPE_LABEL: &[&str] = &["tip_tipologia", "tipologia"];

pub const READING_SENSOR: &[&str] = &["ril_sea_id"];
pub const READING_VALUE: &[&str] = &["ril_dato"];
pub const READING_TIME: &[&str] = &["ril_dataOra"];
pub const READING_LABEL: &[&str] = &["_tipo"];

pub const NOTIFICATION_TITLE: &[&str] = &["not_titolo", "titolo", "title"];
pub const NOTIFICATION_DESC: &[&str] = &[
    "not_desc",
    "not_dex",
    "not_testo",
    "not_message",
    "messaggio",
    "message",
    "desc",
];
pub const NOTIFICATION_TIME: &[&str] = &["not_dataOra", "not_data", "_created", "created"];
pub const NOTIFICATION_HIVE: &[&str] = &["not_arn_id"];

const DEFAULT_NOTIFICATION_TITLE: &str = "Notifica";

/// Coordinate extraction strategies, tried in order.
pub const COORDINATE_ACCESSORS: [fn(&Value) -> Option<Coordinates>; 3] =
    [flat_coordinates, nested_coordinates, geojson_coordinates];

// ---

/// First field whose value maps through `f` to `Some`.
pub fn first_mapped<'a, T>(
    doc: &'a Value,
    fields: &[&'static str],
    f: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    // ---
    fields.iter().filter_map(|k| doc.get(*k)).find_map(f)
}

/// Parse a decimal number written with either `.` or `,` as separator.
pub fn parse_decimal(s: &str) -> Option<f64> {
    // ---
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Number from a JSON number or numeric string. Null, empty and garbage are `None`.
pub fn number(v: &Value) -> Option<f64> {
    // ---
    match v {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Identifier from a JSON number or non-empty string.
pub fn record_id(v: &Value) -> Option<RecordId> {
    // ---
    match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(RecordId::from(i))
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                        RecordId::from(f as i64)
                    } else {
                        RecordId(f.to_string())
                    }
                })
            }
        }
        Value::String(s) if !s.trim().is_empty() => Some(RecordId::from(s.as_str())),
        _ => None,
    }
}

pub fn text(v: &Value) -> Option<String> {
    // ---
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn flag(v: &Value) -> Option<bool> {
    // ---
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "si" | "sì" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn raw_value(v: &Value) -> Option<RawValue> {
    // ---
    match v {
        Value::Number(n) => n.as_f64().map(RawValue::Number),
        Value::String(s) => Some(RawValue::Text(s.clone())),
        _ => None,
    }
}

/// Timestamp from RFC 3339 text, a naive date-time taken as UTC, or epoch millis.
pub fn timestamp(v: &Value) -> Option<Timestamp> {
    // ---
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(Timestamp {
            raw: s.clone(),
            utc: parse_datetime(s),
        }),
        Value::Number(n) => n.as_i64().map(|ms| Timestamp {
            raw: ms.to_string(),
            utc: DateTime::from_timestamp_millis(ms),
        }),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // ---
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

// --- coordinates

fn pair(lat: Option<f64>, lon: Option<f64>) -> Option<Coordinates> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
        _ => None,
    }
}

/// Flat `api_lat` / `api_lon` style fields.
pub fn flat_coordinates(doc: &Value) -> Option<Coordinates> {
    // ---
    pair(
        first_mapped(doc, APIARY_LAT, number),
        first_mapped(doc, APIARY_LON, number),
    )
}

/// Nested `location: { lat, lng }` style object.
pub fn nested_coordinates(doc: &Value) -> Option<Coordinates> {
    // ---
    APIARY_NESTED
        .iter()
        .filter_map(|k| doc.get(*k).filter(|v| v.is_object()))
        .find_map(|obj| {
            pair(
                first_mapped(obj, NESTED_LAT, number),
                first_mapped(obj, NESTED_LON, number),
            )
        })
}

/// GeoJSON-style `[lon, lat]` pair, top level or inside the nested object.
pub fn geojson_coordinates(doc: &Value) -> Option<Coordinates> {
    // ---
    let from_array = |v: &Value| -> Option<Coordinates> {
        let arr = v.as_array()?;
        if arr.len() < 2 {
            return None;
        }
        pair(number(&arr[1]), number(&arr[0]))
    };

    APIARY_NESTED
        .iter()
        .filter_map(|k| doc.get(*k).filter(|v| v.is_object()))
        .find_map(|obj| first_mapped(obj, GEOJSON_PAIR, from_array))
        .or_else(|| first_mapped(doc, GEOJSON_PAIR, from_array))
}

pub fn coordinates(doc: &Value) -> Option<Coordinates> {
    COORDINATE_ACCESSORS.iter().find_map(|accessor| accessor(doc))
}

// --- entities

pub fn apiary(doc: &Value) -> Apiary {
    // ---
    Apiary {
        id: first_mapped(doc, APIARY_ID, record_id),
        name: first_mapped(doc, APIARY_NAME, text),
        location: first_mapped(doc, APIARY_PLACE, text),
        coordinates: coordinates(doc),
    }
}

pub fn hive(doc: &Value) -> Hive {
    // ---
    Hive {
        id: first_mapped(doc, HIVE_ID, record_id),
        apiary_id: first_mapped(doc, HIVE_APIARY, record_id),
        installed_on: first_mapped(doc, HIVE_INSTALLED, text),
        full: first_mapped(doc, HIVE_FULL, flag).unwrap_or(false),
        mac_address: first_mapped(doc, HIVE_MAC, text),
        name: first_mapped(doc, HIVE_NAME, text),
    }
}

pub fn sensor_assignment(doc: &Value) -> SensorAssignment {
    // ---
    let active_entry = SENSOR_ACTIVE
        .iter()
        .find_map(|k| doc.get(*k).and_then(flag).map(|b| (*k, b)));

    SensorAssignment {
        record_id: first_mapped(doc, RECORD_ID, text),
        sensor_id: first_mapped(doc, SENSOR_ID, record_id),
        hive_id: first_mapped(doc, SENSOR_HIVE, record_id),
        type_id: first_mapped(doc, SENSOR_TYPE, record_id),
        min: doc.get(SENSOR_MIN).and_then(number),
        max: doc.get(SENSOR_MAX).and_then(number),
        active: active_entry.map(|(_, b)| b).unwrap_or(true),
        active_field: active_entry.map(|(k, _)| k),
    }
}

pub fn measurement_type(doc: &Value) -> MeasurementType {
    // ---
    MeasurementType {
        id: first_mapped(doc, TYPE_ID, record_id),
        label: first_mapped(doc, TYPE_LABEL, text).unwrap_or_default(),
    }
}

pub fn reading(doc: &Value) -> Reading {
    // ---
    Reading {
        record_id: first_mapped(doc, RECORD_ID, text),
        sensor_id: first_mapped(doc, READING_SENSOR, record_id),
        value: first_mapped(doc, READING_VALUE, raw_value),
        recorded_at: first_mapped(doc, READING_TIME, timestamp),
        type_label: first_mapped(doc, READING_LABEL, text),
    }
}

pub fn notification(doc: &Value) -> Notification {
    // ---
    Notification {
        record_id: first_mapped(doc, RECORD_ID, text),
        hive_id: first_mapped(doc, NOTIFICATION_HIVE, record_id),
        title: first_mapped(doc, NOTIFICATION_TITLE, text)
            .unwrap_or_else(|| DEFAULT_NOTIFICATION_TITLE.to_string()),
        description: first_mapped(doc, NOTIFICATION_DESC, text).unwrap_or_default(),
        created_at: first_mapped(doc, NOTIFICATION_TIME, timestamp),
    }
}
