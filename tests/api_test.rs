// HTTP surface tests against in-memory stores.

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::NaiveDate;
use motor_energy_ledger::api::{create_router, AppState};
use motor_energy_ledger::clock::ManualClock;
use motor_energy_ledger::engine::{AccumulationEngine, EngineSettings};
use motor_energy_ledger::ingest::Ingestor;
use motor_energy_ledger::repositories::{LedgerStore, MemoryLedgerStore, MemoryReadingStore};
use motor_energy_ledger::service::SensorService;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct TestApp {
    server: TestServer,
    ledger: Arc<MemoryLedgerStore>,
    engine: Arc<AccumulationEngine>,
}

fn create_test_app() -> TestApp {
    let ledger = Arc::new(MemoryLedgerStore::new());
    let clock = Arc::new(ManualClock::at("2025-03-10T10:00:00+07:00").unwrap());
    let engine = Arc::new(AccumulationEngine::new(
        ledger.clone(),
        clock.clone(),
        EngineSettings::default(),
    ));
    let (ingestor, _task) = Ingestor::spawn(engine.clone(), 16);
    let sensors = SensorService::new(
        Arc::new(MemoryReadingStore::new()),
        ledger.clone(),
        engine.clone(),
        ingestor,
        clock,
    );

    let server = TestServer::new(create_router(AppState { sensors })).unwrap();
    TestApp {
        server,
        ledger,
        engine,
    }
}

/// Readings are processed off the request path; wait for the consumer.
async fn wait_for_history(engine: &AccumulationEngine, len: usize) {
    for _ in 0..100 {
        if engine.history().len() >= len {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("history never reached {} records", len);
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = create_test_app();

    let response = app.server.get("/health").await;
    response.assert_status(StatusCode::OK);
    response.assert_text("OK");

    let response = app.server.get("/health/ready").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["ledger_connected"], json!(true));
}

#[tokio::test]
async fn test_latest_reading_not_found_before_first_write() {
    let app = create_test_app();

    let response = app.server.get("/api/v1/sensors").await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({
        "success": false,
        "message": "Sensor data not found"
    }));
}

#[tokio::test]
async fn test_write_then_read_latest() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/v1/sensors")
        .json(&json!({"pwm": 128, "rpm": "1450", "load_weight": 2.5}))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.assert_json(&json!({
        "success": true,
        "message": "Sensor data written successfully"
    }));

    let response = app.server.get("/api/v1/sensors").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["pwm"], json!(128.0));
    assert_eq!(body["data"]["rpm"], json!(1450.0));
    assert_eq!(body["data"]["load_weight"], json!(2.5));
    assert!(body["data"]["timestamp"].is_string());
}

#[tokio::test]
async fn test_write_accepts_berat_alias() {
    let app = create_test_app();

    app.server
        .post("/api/v1/sensors")
        .json(&json!({"pwm": 60, "rpm": 800, "berat": 1.1}))
        .await
        .assert_status(StatusCode::CREATED);

    let body: Value = app.server.get("/api/v1/sensors").await.json();
    assert_eq!(body["data"]["load_weight"], json!(1.1));
}

#[tokio::test]
async fn test_write_rejects_missing_fields() {
    let app = create_test_app();

    let response = app
        .server
        .post("/api/v1/sensors")
        .json(&json!({"pwm": 128, "rpm": 1450}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], json!(false));

    // nothing was stored
    app.server
        .get("/api/v1/sensors")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_history_lists_processed_readings() {
    let app = create_test_app();

    for pwm in [50, 100, 150] {
        app.server
            .post("/api/v1/sensors")
            .json(&json!({"pwm": pwm, "rpm": 1000, "load_weight": 2}))
            .await
            .assert_status(StatusCode::CREATED);
    }
    wait_for_history(&app.engine, 3).await;

    let response = app.server.get("/api/v1/sensors/history").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["count"], json!(3));
    let pwms: Vec<f64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["pwm"].as_f64().unwrap())
        .collect();
    assert_eq!(pwms, vec![50.0, 100.0, 150.0]);
    for record in body["data"].as_array().unwrap() {
        assert!(record.get("total_kwh").is_some());
        assert!(record.get("total_cost").is_some());
        assert!(record["timestamp"].is_i64());
    }
}

#[tokio::test]
async fn test_ledger_today_defaults_to_zero() {
    let app = create_test_app();

    let response = app.server.get("/api/v1/ledger/today").await;
    response.assert_status(StatusCode::OK);
    response.assert_json(&json!({
        "success": true,
        "data": {"date": "2025-03-10", "total_kwh": 0.0, "total_cost": 0.0}
    }));
}

#[tokio::test]
async fn test_ledger_range() {
    let app = create_test_app();
    app.ledger.accumulate(date(2025, 3, 8), 0.5, 750.0).await.unwrap();
    app.ledger.accumulate(date(2025, 3, 9), 0.25, 375.0).await.unwrap();
    app.ledger.accumulate(date(2025, 3, 10), 0.1, 150.0).await.unwrap();

    let response = app
        .server
        .get("/api/v1/ledger")
        .add_query_param("from", "2025-03-09")
        .add_query_param("to", "2025-03-10")
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["count"], json!(2));
    assert_eq!(body["data"][0]["date"], json!("2025-03-09"));
    assert_eq!(body["data"][1]["date"], json!("2025-03-10"));

    // `to` defaults to today
    let body: Value = app
        .server
        .get("/api/v1/ledger")
        .add_query_param("from", "2025-03-01")
        .await
        .json();
    assert_eq!(body["count"], json!(3));
}

#[tokio::test]
async fn test_ledger_range_rejects_bad_dates() {
    let app = create_test_app();

    app.server
        .get("/api/v1/ledger")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .get("/api/v1/ledger")
        .add_query_param("from", "March 9")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
