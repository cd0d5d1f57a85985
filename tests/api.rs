//! HTTP API tests -- drive the router in-process with `oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use fleetpulse::api::{self, state::AppState};
use fleetpulse::audit::Actor;
use fleetpulse::config::{FleetConfig, IngestConfig};
use fleetpulse::ingest::{IngestSettings, Ingestor};
use fleetpulse::store::FleetStore;
use fleetpulse::telemetry::{ScriptedSource, StaticRegistry, TelemetrySample};

fn overheating(vehicle_id: &str) -> TelemetrySample {
    TelemetrySample {
        vehicle_id: vehicle_id.to_string(),
        captured_at: Utc::now(),
        speed: 60.0,
        engine_temp: 97.0,
        fuel_level: 60.0,
        battery_level: 85.0,
        rpm: 2000.0,
        efficiency: 8.0,
        lat: 40.7128,
        lng: -74.0060,
    }
}

async fn app() -> (Router, Ingestor) {
    let source = ScriptedSource::new()
        .with_sample(overheating("V-001"))
        .with_sample(overheating("V-001"));
    let ingestor = Ingestor::new(
        FleetStore::new(&IngestConfig::default()),
        Box::new(source),
        Arc::new(StaticRegistry::new(["V-001", "V-003"])),
        FleetConfig::default().validate().unwrap(),
        IngestSettings::default(),
    )
    .await;
    let state = AppState::new(ingestor.clone(), Actor::new("U-001", "Admin User"));
    (api::router(state), ingestor)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let (app, _) = app().await;
    let (status, _) = send(&app, Method::GET, "/api/v1/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cycle_then_list_and_acknowledge() {
    let (app, _) = app().await;

    let (status, body) = send(&app, Method::POST, "/api/v1/ingest/cycle", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["alertsCreated"], 1);
    assert_eq!(body["data"]["disconnected"], 1);

    let (_, body) = send(&app, Method::GET, "/api/v1/alerts", None).await;
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["meta"]["unacknowledged"], 1);
    let id = body["data"][0]["id"].as_u64().unwrap();
    assert_eq!(body["data"][0]["title"], "Engine Overheating");

    let uri = format!("/api/v1/alerts/{}/ack", id);
    let (_, body) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(body["data"]["acknowledged"], true);
    let (_, body) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(body["data"]["acknowledged"], false);

    let (_, body) = send(&app, Method::GET, "/api/v1/audit", None).await;
    assert_eq!(body["data"][0]["action"], "Alert Acknowledged");
    assert_eq!(body["data"][0]["actorId"], "U-001");
}

#[tokio::test]
async fn test_vehicle_views() {
    let (app, _) = app().await;
    let (_, body) = send(&app, Method::GET, "/api/v1/vehicles/V-001/score", None).await;
    assert!(body["data"].is_null());

    send(&app, Method::POST, "/api/v1/ingest/cycle", None).await;

    let (_, body) = send(&app, Method::GET, "/api/v1/vehicles/V-001/score", None).await;
    assert_eq!(body["data"]["efficiencyScore"], 80.0);
    let (_, body) = send(&app, Method::GET, "/api/v1/vehicles/V-001/telemetry", None).await;
    assert_eq!(body["meta"]["total"], 1);
    let (_, body) = send(&app, Method::GET, "/api/v1/vehicles/V-001/fuel", None).await;
    assert_eq!(body["data"][0]["cost"], 43.75);

    let (_, body) = send(&app, Method::GET, "/api/v1/edge", None).await;
    assert_eq!(body["meta"]["total"], 2);
    assert_eq!(body["meta"]["connected"], 1);
}

#[tokio::test]
async fn test_toggle_ingest() {
    let (app, ingestor) = app().await;
    let (_, body) = send(&app, Method::POST, "/api/v1/ingest/toggle", None).await;
    assert_eq!(body["data"]["state"], "stopped");
    assert_eq!(ingestor.state().to_string(), "stopped");

    let (_, body) = send(&app, Method::GET, "/api/v1/ingest", None).await;
    assert_eq!(body["data"]["state"], "stopped");
    assert_eq!(body["data"]["summary"]["auditEntries"], 2);
}

#[tokio::test]
async fn test_rule_management() {
    let (app, _) = app().await;

    let (_, body) = send(&app, Method::GET, "/api/v1/rules", None).await;
    assert_eq!(body["meta"]["total"], 4);

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/v1/rules/R-001",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["enabled"], false);

    let (_, body) = send(&app, Method::POST, "/api/v1/ingest/cycle", None).await;
    assert_eq!(body["data"]["alertsCreated"], 0);

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/api/v1/rules/R-404",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let bad = json!({ "rules": [{
        "id": "R-010", "name": "Oil", "metric": "oilPressure",
        "comparator": "<", "threshold": 10.0, "severity": "high"
    }]});
    let (status, body) = send(&app, Method::PUT, "/api/v1/rules", Some(bad)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("oilPressure"));

    let good = json!({ "rules": [{
        "id": "R-010", "name": "Hot Engine", "metric": "engineTemp",
        "comparator": ">", "threshold": 90.0, "severity": "low"
    }]});
    let (status, body) = send(&app, Method::PUT, "/api/v1/rules", Some(good)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);

    let (_, body) = send(&app, Method::POST, "/api/v1/ingest/cycle", None).await;
    assert_eq!(body["data"]["alertsCreated"], 1);
}

#[tokio::test]
async fn test_export() {
    let (app, _) = app().await;
    send(&app, Method::POST, "/api/v1/ingest/cycle", None).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/export", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["telemetry"]["V-001"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, Method::GET, "/api/v1/alerts", None).await;
    assert_eq!(body["data"][0]["title"], "Export Complete");
    assert_eq!(body["data"][0]["severity"], "low");
}
