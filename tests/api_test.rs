use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::{body_json, get_json, send, FakeDb};

mod common;

// ---

#[tokio::test]
async fn health_needs_no_session() {
    // ---
    let (app, _db) = common::spawn(FakeDb::default()).await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    // ---
    let (app, db) = common::spawn(FakeDb::with_hive("45,5")).await;
    let response = app
        .oneshot(Request::builder().uri("/apiaries").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(db.lock().unwrap().requests.is_empty());
}

#[tokio::test]
async fn login_checks_format_then_store() {
    // ---
    let (app, db) = common::spawn(FakeDb::default()).await;

    let ok = send(app.clone(), Method::POST, "/login", Some(json!({ "api_key": common::KEY }))).await;
    assert_eq!(ok.status(), StatusCode::OK);

    let upper = send(
        app.clone(),
        Method::POST,
        "/login",
        Some(json!({ "api_key": "0123456789ABCDEF01234567" })),
    )
    .await;
    assert_eq!(upper.status(), StatusCode::BAD_REQUEST);

    let wrong = send(
        app,
        Method::POST,
        "/login",
        Some(json!({ "api_key": "ffffffffffffffffffffffff" })),
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    // The malformed key never reached the store; the other two pinged it.
    assert_eq!(db.lock().unwrap().hits("_ping"), 2);
}

#[tokio::test]
async fn overview_counts_located_apiaries() {
    // ---
    let (app, _db) = common::spawn(FakeDb::with_hive("45,5")).await;
    let (status, body) = get_json(app, "/apiaries").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["apiaries"].as_array().unwrap().len(), 2);
    assert_eq!(body["with_coordinates"], 1);
    assert_eq!(body["map_center"]["lat"], 43.1);
    assert_eq!(body["notifications"][0]["title"], "Sciamatura");
    assert_eq!(body["notifications"][0]["description"], "Controllare arnia 3");
}

#[tokio::test]
async fn apiary_detail_lists_hives() {
    // ---
    let (app, _db) = common::spawn(FakeDb::with_hive("45,5")).await;
    let (status, body) = get_json(app, "/apiaries/1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["apiary"]["name"], "Colle");
    assert_eq!(body["hives"][0]["id"], "3");
    assert_eq!(body["hives"][0]["apiary_id"], "1");
}

#[tokio::test]
async fn missing_hive_is_not_found() {
    // ---
    let mut db = FakeDb::with_hive("45,5");
    db.set("arnie", vec![]);
    let (app, _db) = common::spawn(db).await;

    let (status, body) = get_json(app, "/hives/3").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("hive 3"));
}

#[tokio::test]
async fn hive_within_thresholds_is_ok() {
    // ---
    let (app, _db) = common::spawn(FakeDb::with_hive("45,5")).await;
    let (status, body) = get_json(app, "/hives/3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fill_state"], "OK");
    assert_eq!(body["status"]["alarm"], "OK");

    let weight = &body["status"]["kinds"][0];
    assert_eq!(weight["kind"], "weight");
    assert_eq!(weight["sensor"]["record_id"], "a1");
    assert_eq!(weight["value"], 45.5);
    assert_eq!(weight["breached"], false);

    let humidity = &body["status"]["kinds"][2];
    assert_eq!(humidity["kind"], "humidity");
    assert!(humidity["sensor"].is_null());

    assert_eq!(body["recent_readings"][0]["type_label"], "Peso");
    assert_eq!(body["weather"]["temperature"], 18.4);
    assert_eq!(body["notifications"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn hive_above_max_is_alarm() {
    // ---
    let (app, _db) = common::spawn(FakeDb::with_hive("60")).await;
    let (status, body) = get_json(app, "/hives/3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["kinds"][0]["breached"], true);
    assert_eq!(body["status"]["alarm"], "ALARM");
}

#[tokio::test]
async fn hive_page_survives_notification_failure() {
    // ---
    let mut db = FakeDb::with_hive("45,5");
    db.failing.insert("notifiche".to_string());
    let (app, _db) = common::spawn(db).await;

    let (status, body) = get_json(app, "/hives/3").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["notifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn hive_page_survives_weather_failure() {
    // ---
    let mut db = FakeDb::with_hive("45,5");
    db.weather_status = Some(500);
    let (app, db) = common::spawn(db).await;

    let (status, body) = get_json(app, "/hives/3").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["weather"].is_null());
    assert_eq!(body["status"]["alarm"], "OK");
    assert_eq!(db.lock().unwrap().hits("/weather"), 1);
}

#[tokio::test]
async fn hive_page_survives_type_catalog_failure() {
    // ---
    let mut db = FakeDb::with_hive("60");
    db.failing.insert("tipirilevazione".to_string());
    let (app, _db) = common::spawn(db).await;

    let (status, body) = get_json(app, "/hives/3").await;
    assert_eq!(status, StatusCode::OK);

    // Without labels no kind resolves, so nothing can breach.
    let weight = &body["status"]["kinds"][0];
    assert!(weight["sensor"].is_null());
    assert_eq!(weight["breached"], false);
    assert_eq!(body["status"]["alarm"], "OK");
    assert!(body["recent_readings"][0]["type_label"].is_null());
    assert_eq!(body["weather"]["temperature"], 18.4);
}

#[tokio::test]
async fn path_like_record_id_never_reaches_store() {
    // ---
    let (app, db) = common::spawn(FakeDb::with_hive("45,5")).await;

    let response = send(
        app.clone(),
        Method::PATCH,
        "/sensors/..%2Fapiari%2Fp1/thresholds",
        Some(json!({ "min": "1", "max": "2" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(app, Method::POST, "/sensors/..%2Fapiari%2Fp1/toggle", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let db = db.lock().unwrap();
    assert!(db.requests.is_empty());
    assert!(db.patches.is_empty());
}

#[tokio::test]
async fn threshold_body_missing_a_field_is_rejected() {
    // ---
    let (app, db) = common::spawn(FakeDb::with_hive("45,5")).await;
    let response = send(
        app,
        Method::PATCH,
        "/sensors/a1/thresholds",
        Some(json!({ "max": "20" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let db = db.lock().unwrap();
    assert!(db.requests.is_empty());
    assert!(db.patches.is_empty());
}

#[tokio::test]
async fn min_greater_than_max_never_reaches_store() {
    // ---
    let (app, db) = common::spawn(FakeDb::with_hive("45,5")).await;
    let response = send(
        app,
        Method::PATCH,
        "/sensors/a1/thresholds",
        Some(json!({ "min": "10", "max": "5" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("min greater than max"));

    let db = db.lock().unwrap();
    assert_eq!(db.hits("sensoriarnia"), 0);
    assert!(db.patches.is_empty());
}

#[tokio::test]
async fn non_numeric_threshold_never_reaches_store() {
    // ---
    let (app, db) = common::spawn(FakeDb::with_hive("45,5")).await;
    let response = send(
        app,
        Method::PATCH,
        "/sensors/a1/thresholds",
        Some(json!({ "min": "dieci", "max": "" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(db.lock().unwrap().hits("sensoriarnia"), 0);
}

#[tokio::test]
async fn empty_min_clears_bound() {
    // ---
    let (app, db) = common::spawn(FakeDb::with_hive("45,5")).await;
    let response = send(
        app,
        Method::PATCH,
        "/sensors/a1/thresholds",
        Some(json!({ "min": "", "max": "20" })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["min"].is_null());
    assert_eq!(body["max"], 20.0);

    let db = db.lock().unwrap();
    assert_eq!(
        db.patches,
        vec![("a1".to_string(), json!({ "sea_min": null, "sea_max": 20.0 }))]
    );
}

#[tokio::test]
async fn rejected_update_surfaces_status_and_body() {
    // ---
    let mut db = FakeDb::with_hive("45,5");
    db.patch_status = Some(500);
    let (app, _db) = common::spawn(db).await;

    let response = send(
        app,
        Method::PATCH,
        "/sensors/a1/thresholds",
        Some(json!({ "min": 5, "max": 40 })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    let msg = body["error"].as_str().unwrap();
    assert!(msg.contains("500"));
    assert!(msg.contains("store refused the update"));
}

#[tokio::test]
async fn unknown_assignment_is_not_found() {
    // ---
    let (app, db) = common::spawn(FakeDb::with_hive("45,5")).await;
    let response = send(
        app,
        Method::PATCH,
        "/sensors/zzz/thresholds",
        Some(json!({ "min": 5, "max": 40 })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(db.lock().unwrap().patches.is_empty());
}

#[tokio::test]
async fn toggle_writes_back_the_field_it_read() {
    // ---
    let mut db = FakeDb::with_hive("45,5");
    db.set(
        "sensoriarnia",
        vec![json!({ "_id": "a1", "sea_id": 5, "sea_tip_id": 1, "sea_active": true })],
    );
    let (app, db) = common::spawn(db).await;

    let response = send(app, Method::POST, "/sensors/a1/toggle", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["active"], false);

    let db = db.lock().unwrap();
    assert_eq!(
        db.patches,
        vec![("a1".to_string(), json!({ "sea_active": false }))]
    );
}

#[tokio::test]
async fn toggle_defaults_to_active_and_canonical_field() {
    // ---
    let (app, db) = common::spawn(FakeDb::with_hive("45,5")).await;

    let response = send(app, Method::POST, "/sensors/a1/toggle", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["active"], false);
    assert_eq!(
        db.lock().unwrap().patches,
        vec![("a1".to_string(), json!({ "sea_attivo": false }))]
    );
}

#[tokio::test]
async fn notes_round_trip_with_version_check() {
    // ---
    let (app, db) = common::spawn(FakeDb::default()).await;
    let uri = "/apiaries/1/hives/3/note";

    let (status, _) = get_json(app.clone(), uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let saved = send(
        app.clone(),
        Method::PUT,
        uri,
        Some(json!({ "body": "regina marcata", "expected_version": 0 })),
    )
    .await;
    assert_eq!(saved.status(), StatusCode::OK);
    assert_eq!(body_json(saved).await["version"], 1);

    let stale = send(
        app.clone(),
        Method::PUT,
        uri,
        Some(json!({ "body": "bozza vecchia", "expected_version": 0 })),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::CONFLICT);

    let (status, body) = get_json(app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], "regina marcata");

    // Notes never touch the document store.
    assert!(db.lock().unwrap().requests.is_empty());
}
