//! Shared harness for the HTTP tests: a fake document store and weather API
//! served by axum on an ephemeral port, plus request helpers for the
//! dashboard router.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceExt;

use apiary_dashboard::notes::NoteStore;
use apiary_dashboard::routes::{self, AppState};
use apiary_dashboard::Config;

pub const KEY: &str = "0123456789abcdef01234567";

/// What the fake store holds and what it has been asked.
#[derive(Debug, Default)]
pub struct FakeDb {
    pub collections: HashMap<String, Vec<Value>>,
    /// Status returned for PATCH; success when `None`.
    pub patch_status: Option<u16>,
    pub patches: Vec<(String, Value)>,
    pub requests: Vec<String>,
    /// Collections whose queries answer 500.
    pub failing: HashSet<String>,
    /// Status returned by the weather API; a normal forecast when `None`.
    pub weather_status: Option<u16>,
}

pub type Shared = Arc<Mutex<FakeDb>>;

impl FakeDb {
    /// One apiary with a single weight-sensing hive.
    pub fn with_hive(reading_value: &str) -> Self {
        // ---
        let mut db = FakeDb::default();
        db.set(
            "apiari",
            vec![
                json!({ "_id": "p1", "api_id": 1, "api_nome": "Colle", "api_lat": 43.1, "api_lon": 12.4 }),
                json!({ "_id": "p2", "api_id": 2, "api_nome": "Valle", "api_luogo": "Assisi" }),
            ],
        );
        db.set(
            "arnie",
            vec![json!({ "_id": "h3", "arn_id": 3, "arn_api_id": "1", "arn_piena": true })],
        );
        db.set(
            "sensoriarnia",
            vec![json!({
                "_id": "a1", "sea_id": 5, "sea_arn_id": 3, "sea_tip_id": 1,
                "sea_min": 10, "sea_max": 50
            })],
        );
        db.set(
            "tipirilevazione",
            vec![json!({ "tip_id": 1, "tip_tipologia": "Peso" })],
        );
        db.set(
            "rilevazioni",
            vec![json!({
                "_id": "r1", "ril_sea_id": 5, "ril_dato": reading_value,
                "ril_dataOra": "2025-04-01T08:00:00Z"
            })],
        );
        db.set(
            "notifiche",
            vec![json!({
                "_id": "n1", "not_titolo": "Sciamatura", "not_testo": "Controllare arnia 3",
                "_created": "2025-04-01T09:00:00Z"
            })],
        );
        db
    }

    pub fn set(&mut self, collection: &str, docs: Vec<Value>) {
        self.collections.insert(collection.to_string(), docs);
    }

    /// Number of requests whose path mentions `fragment`.
    pub fn hits(&self, fragment: &str) -> usize {
        self.requests.iter().filter(|r| r.contains(fragment)).count()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("x-apikey").and_then(|v| v.to_str().ok()) == Some(KEY)
}

async fn ping(State(db): State<Shared>, headers: HeaderMap) -> StatusCode {
    // ---
    db.lock().unwrap().requests.push("GET /_ping".to_string());
    if authorized(&headers) {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn list(
    State(db): State<Shared>,
    headers: HeaderMap,
    Path(collection): Path<String>,
) -> Response {
    // ---
    let mut db = db.lock().unwrap();
    db.requests.push(format!("GET /{collection}"));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if db.failing.contains(&collection) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "collection unavailable").into_response();
    }
    let docs = db.collections.get(&collection).cloned().unwrap_or_default();
    Json(Value::Array(docs)).into_response()
}

async fn get_record(
    State(db): State<Shared>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    // ---
    let mut db = db.lock().unwrap();
    db.requests.push(format!("GET /{collection}/{id}"));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    db.collections
        .get(&collection)
        .and_then(|docs| docs.iter().find(|d| d["_id"] == id.as_str()).cloned())
        .map(|doc| Json(doc).into_response())
        .unwrap_or_else(|| StatusCode::NOT_FOUND.into_response())
}

async fn patch_record(
    State(db): State<Shared>,
    headers: HeaderMap,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    // ---
    let mut db = db.lock().unwrap();
    db.requests.push(format!("PATCH /{collection}/{id}"));
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Some(status) = db.patch_status {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, "store refused the update").into_response();
    }
    db.patches.push((id, body.clone()));
    Json(body).into_response()
}

async fn weather(State(db): State<Shared>) -> Response {
    // ---
    let mut db = db.lock().unwrap();
    db.requests.push("GET /weather".to_string());
    if let Some(status) = db.weather_status {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, "forecast unavailable").into_response();
    }
    Json(json!({
        "current": { "temperature_2m": 18.4 },
        "daily": { "temperature_2m_max": [22.1], "temperature_2m_min": [9.5] }
    }))
    .into_response()
}

/// Serve the fake store and weather API; returns the dashboard router wired to them.
pub async fn spawn(db: FakeDb) -> (Router, Shared) {
    // ---
    let shared: Shared = Arc::new(Mutex::new(db));
    let fake = Router::new()
        .route("/rest/_ping", get(ping))
        .route("/rest/{collection}", get(list))
        .route("/rest/{collection}/{id}", get(get_record).patch(patch_record))
        .route("/weather", get(weather))
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, fake).await.unwrap();
    });

    let config = Config::with_endpoints(
        &format!("http://{addr}/rest"),
        &format!("http://{addr}/weather"),
    );
    let state = AppState::from_config(&config, NoteStore::in_memory()).unwrap();
    (routes::router(state), shared)
}

pub async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response {
    // ---
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-apikey", KEY);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(req.body(body).unwrap()).await.unwrap()
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = send(app, Method::GET, uri, None).await;
    let status = response.status();
    (status, body_json(response).await)
}

pub async fn body_json(response: Response) -> Value {
    // ---
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
