//! Client for the hosted REST document store.
//!
//! Collections are queried with a JSON filter embedded in the `q` query
//! parameter and an API key in the `x-apikey` header. Updates use partial
//! document semantics (`PATCH`): only the supplied fields change. Every
//! call carries the caller's [`Session`]; the client itself holds no key.
//!
//! Reads are retried once on transport errors; writes are never retried.

use reqwest::{Client, Method, RequestBuilder, Url};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::adapter;
use crate::error::{AppError, Result};
use crate::models::{
    Apiary, Hive, MeasurementType, Notification, Reading, RecordId, SensorAssignment,
};
use crate::session::{Session, API_KEY_HEADER};

// ---

pub const COL_APIARIES: &str = "apiari";
pub const COL_HIVES: &str = "arnie";
pub const COL_ASSIGNMENTS: &str = "sensoriarnia";
pub const COL_TYPES: &str = "tipirilevazione";
pub const COL_READINGS: &str = "rilevazioni";
pub const COL_NOTIFICATIONS: &str = "notifiche";

const READ_ATTEMPTS: u32 = 2;

/// Newest-first by creation time, as the store spells it.
const SORT_NEWEST_CREATED: &str = "-_created";

/// Query parameters of one collection read.
#[derive(Debug, Default)]
struct Query {
    filter: Option<Value>,
    hints: Option<Value>,
    sort: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct RestDbClient {
    http: Client,
    base_url: String,
}

/// Both the numeric and string forms of an identifier, for tolerant matching.
fn id_forms(id: &RecordId) -> Vec<Value> {
    // ---
    match id.as_i64() {
        Some(n) => vec![json!(n), json!(id.as_str())],
        None => vec![json!(id.as_str())],
    }
}

/// `{"$or": [{field: 7}, {field: "7"}]}`
pub fn id_filter(field: &str, id: &RecordId) -> Value {
    // ---
    let alternatives: Vec<Value> = id_forms(id)
        .into_iter()
        .map(|v| {
            let mut clause = serde_json::Map::new();
            clause.insert(field.to_string(), v);
            Value::Object(clause)
        })
        .collect();
    json!({ "$or": alternatives })
}

/// `{field: {"$in": [...]}}` over both forms of every id.
pub fn in_filter(field: &str, ids: &[RecordId]) -> Value {
    // ---
    let mut values: Vec<Value> = Vec::new();
    for v in ids.iter().flat_map(id_forms) {
        if !values.contains(&v) {
            values.push(v);
        }
    }
    let mut filter = serde_json::Map::new();
    filter.insert(field.to_string(), json!({ "$in": values }));
    Value::Object(filter)
}

impl RestDbClient {
    // ---
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        RestDbClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Store URL for `segments`, each percent-encoded as one path segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        // ---
        let invalid = |body: String| AppError::FetchFailed {
            context: format!("store url {}", self.base_url),
            status: None,
            body,
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, session: &Session) -> RequestBuilder {
        // ---
        self.http
            .request(method, url)
            .header(API_KEY_HEADER, session.api_key())
            .header("cache-control", "no-cache")
    }

    /// Send a read, retrying once on connect or timeout errors.
    async fn read(&self, context: &str, build: impl Fn() -> RequestBuilder) -> Result<Value> {
        // ---
        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match build().send().await {
                Ok(response) => break response,
                Err(e) if attempt < READ_ATTEMPTS && (e.is_connect() || e.is_timeout()) => {
                    warn!("{}: attempt {} failed, retrying: {}", context, attempt, e);
                }
                Err(e) => return Err(AppError::fetch(context, e)),
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::FetchFailed {
                context: context.to_string(),
                status: Some(status.as_u16()),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AppError::fetch(context, e))
    }

    async fn query(&self, session: &Session, collection: &str, query: Query) -> Result<Vec<Value>> {
        // ---
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(filter) = &query.filter {
            params.push(("q", filter.to_string()));
        }
        if let Some(hints) = &query.hints {
            params.push(("h", hints.to_string()));
        }
        if let Some(sort) = query.sort {
            params.push(("sort", sort.to_string()));
        }

        debug!("Querying {} with {:?}", collection, params);
        let context = format!("query {collection}");
        let url = self.url(&[collection])?;
        let body = self
            .read(&context, || {
                self.request(Method::GET, url.clone(), session).query(&params)
            })
            .await?;

        match body {
            Value::Array(docs) => {
                debug!("{} returned {} documents", collection, docs.len());
                Ok(docs)
            }
            other => {
                warn!("{} returned a non-array body: {}", collection, other);
                Ok(Vec::new())
            }
        }
    }

    /// Validate a key against the store's ping endpoint.
    pub async fn ping(&self, session: &Session) -> Result<()> {
        // ---
        let response = self
            .request(Method::GET, self.url(&["_ping"])?, session)
            .send()
            .await
            .map_err(|e| AppError::fetch("ping", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Unauthorized(format!(
                "API key rejected by the store (status {})",
                response.status().as_u16()
            )))
        }
    }

    pub async fn list_apiaries(&self, session: &Session) -> Result<Vec<Apiary>> {
        // ---
        let docs = self.query(session, COL_APIARIES, Query::default()).await?;
        Ok(docs.iter().map(adapter::apiary).collect())
    }

    pub async fn find_apiary(&self, session: &Session, apiary_id: &RecordId) -> Result<Apiary> {
        // ---
        let query = Query {
            filter: Some(id_filter("api_id", apiary_id)),
            ..Query::default()
        };
        let docs = self.query(session, COL_APIARIES, query).await?;
        docs.first()
            .map(adapter::apiary)
            .ok_or_else(|| AppError::NotFound(format!("apiary {apiary_id}")))
    }

    pub async fn hives_for_apiary(&self, session: &Session, apiary_id: &RecordId) -> Result<Vec<Hive>> {
        // ---
        let query = Query {
            filter: Some(id_filter("arn_api_id", apiary_id)),
            ..Query::default()
        };
        let docs = self.query(session, COL_HIVES, query).await?;
        Ok(docs.iter().map(adapter::hive).collect())
    }

    pub async fn find_hive(&self, session: &Session, hive_id: &RecordId) -> Result<Hive> {
        // ---
        let query = Query {
            filter: Some(id_filter("arn_id", hive_id)),
            ..Query::default()
        };
        let docs = self.query(session, COL_HIVES, query).await?;
        docs.first()
            .map(adapter::hive)
            .ok_or_else(|| AppError::NotFound(format!("hive {hive_id}")))
    }

    pub async fn assignments_for_hive(
        &self,
        session: &Session,
        hive_id: &RecordId,
    ) -> Result<Vec<SensorAssignment>> {
        // ---
        let query = Query {
            filter: Some(id_filter("sea_arn_id", hive_id)),
            ..Query::default()
        };
        let docs = self.query(session, COL_ASSIGNMENTS, query).await?;
        Ok(docs.iter().map(adapter::sensor_assignment).collect())
    }

    pub async fn measurement_types(
        &self,
        session: &Session,
        type_ids: &[RecordId],
    ) -> Result<Vec<MeasurementType>> {
        // ---
        if type_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query {
            filter: Some(in_filter("tip_id", type_ids)),
            ..Query::default()
        };
        let docs = self.query(session, COL_TYPES, query).await?;
        Ok(docs.iter().map(adapter::measurement_type).collect())
    }

    /// Readings of the given sensors, newest first by `ril_dataOra`.
    pub async fn readings_for_sensors(
        &self,
        session: &Session,
        sensor_ids: &[RecordId],
    ) -> Result<Vec<Reading>> {
        // ---
        if sensor_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query {
            filter: Some(in_filter("ril_sea_id", sensor_ids)),
            hints: Some(json!({ "$orderby": { "ril_dataOra": -1 } })),
            ..Query::default()
        };
        let docs = self.query(session, COL_READINGS, query).await?;
        Ok(docs.iter().map(adapter::reading).collect())
    }

    pub async fn notifications(&self, session: &Session) -> Result<Vec<Notification>> {
        // ---
        let query = Query {
            sort: Some(SORT_NEWEST_CREATED),
            ..Query::default()
        };
        let docs = self.query(session, COL_NOTIFICATIONS, query).await?;
        Ok(docs.iter().map(adapter::notification).collect())
    }

    pub async fn notifications_for_hive(
        &self,
        session: &Session,
        hive_id: &RecordId,
    ) -> Result<Vec<Notification>> {
        // ---
        let query = Query {
            filter: Some(id_filter("not_arn_id", hive_id)),
            sort: Some(SORT_NEWEST_CREATED),
            ..Query::default()
        };
        let docs = self.query(session, COL_NOTIFICATIONS, query).await?;
        Ok(docs.iter().map(adapter::notification).collect())
    }

    /// One sensor assignment by its opaque record id.
    pub async fn get_assignment(&self, session: &Session, record_id: &str) -> Result<SensorAssignment> {
        // ---
        let url = self.url(&[COL_ASSIGNMENTS, record_id])?;
        let context = format!("get {COL_ASSIGNMENTS}/{record_id}");
        match self
            .read(&context, || self.request(Method::GET, url.clone(), session))
            .await
        {
            Ok(doc) if doc.is_object() => Ok(adapter::sensor_assignment(&doc)),
            Ok(_) | Err(AppError::FetchFailed { status: Some(404), .. }) => Err(
                AppError::NotFound(format!("sensor assignment {record_id}")),
            ),
            Err(e) => Err(e),
        }
    }

    /// Partial update of one sensor assignment. Never retried.
    pub async fn patch_assignment(&self, session: &Session, record_id: &str, doc: &Value) -> Result<()> {
        // ---
        let url = self.url(&[COL_ASSIGNMENTS, record_id])?;
        debug!("PATCH {} {}", url.path(), doc);

        let response = self
            .request(Method::PATCH, url, session)
            .json(doc)
            .send()
            .await
            .map_err(AppError::update)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpdateFailed {
                status: Some(status.as_u16()),
                body,
            });
        }
        Ok(())
    }
}
