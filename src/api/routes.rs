//! API route definitions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use super::state::AppState;
use crate::detect::RuleConfig;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/alerts", get(list_alerts))
        .route("/alerts/{id}/ack", post(acknowledge_alert))
        .route("/audit", get(audit_log))
        .route("/edge", get(edge_status))
        .route("/vehicles/{id}/score", get(vehicle_score))
        .route("/vehicles/{id}/telemetry", get(vehicle_telemetry))
        .route("/vehicles/{id}/fuel", get(vehicle_fuel))
        .route("/ingest", get(ingest_status))
        .route("/ingest/toggle", post(toggle_ingest))
        .route("/ingest/cycle", post(run_cycle))
        .route("/rules", get(list_rules).put(replace_rules))
        .route("/rules/{id}", patch(patch_rule))
        .route("/export", get(export))
}

fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn list_alerts(State(state): State<AppState>) -> Json<Value> {
    let alerts = state.store.current_alerts().await;
    let unacknowledged = alerts.iter().filter(|a| !a.acknowledged).count();
    Json(json!({
        "data": alerts,
        "meta": { "total": alerts.len(), "unacknowledged": unacknowledged }
    }))
}

async fn acknowledge_alert(State(state): State<AppState>, Path(id): Path<u64>) -> Json<Value> {
    let acknowledged = state.store.acknowledge(id, &state.operator).await;
    Json(json!({ "data": { "id": id, "acknowledged": acknowledged } }))
}

async fn audit_log(State(state): State<AppState>) -> Json<Value> {
    let entries = state.store.current_audit_log().await;
    Json(json!({ "data": entries, "meta": { "total": entries.len() } }))
}

async fn edge_status(State(state): State<AppState>) -> Json<Value> {
    let devices = state.store.current_edge_status().await;
    let connected = devices.iter().filter(|d| d.connected).count();
    Json(json!({
        "data": devices,
        "meta": { "total": devices.len(), "connected": connected }
    }))
}

async fn vehicle_score(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    match state.store.latest_anomaly_score(&id).await {
        Some(score) => Json(json!({ "data": score, "meta": { "vehicleId": id } })),
        None => Json(json!({ "data": null, "meta": { "vehicleId": id, "message": "no score yet" } })),
    }
}

async fn vehicle_telemetry(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let history = state.store.telemetry_history(&id).await;
    Json(json!({ "data": history, "meta": { "vehicleId": id, "total": history.len() } }))
}

async fn vehicle_fuel(State(state): State<AppState>, Path(id): Path<String>) -> Json<Value> {
    let history = state.store.fuel_history(&id).await;
    Json(json!({ "data": history, "meta": { "vehicleId": id, "total": history.len() } }))
}

async fn ingest_status(State(state): State<AppState>) -> Json<Value> {
    let summary = state.store.summary().await;
    Json(json!({
        "data": { "state": state.ingestor.state(), "summary": summary },
        "meta": { "intervalMs": state.ingestor.interval().as_millis() as u64 }
    }))
}

async fn toggle_ingest(State(state): State<AppState>) -> Json<Value> {
    let next = state.ingestor.toggle(&state.operator).await;
    Json(json!({ "data": { "state": next } }))
}

async fn run_cycle(State(state): State<AppState>) -> Json<Value> {
    let report = state.ingestor.run_cycle().await;
    Json(json!({ "data": report }))
}

async fn list_rules(State(state): State<AppState>) -> Json<Value> {
    let rules = state.ingestor.rules().await;
    Json(json!({ "data": rules, "meta": { "total": rules.len() } }))
}

#[derive(Debug, Deserialize)]
struct ReplaceRules {
    rules: Vec<RuleConfig>,
}

async fn replace_rules(State(state): State<AppState>, Json(body): Json<ReplaceRules>) -> ApiResult {
    match state
        .ingestor
        .update_rules_from_config(&body.rules, &state.operator)
        .await
    {
        Ok(rules) => Ok(Json(json!({ "data": rules, "meta": { "total": rules.len() } }))),
        Err(e) => {
            warn!(error = %e, "rejected rule update");
            Err(error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct PatchRule {
    enabled: bool,
}

async fn patch_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PatchRule>,
) -> ApiResult {
    if !state
        .ingestor
        .set_rule_enabled(&id, body.enabled, &state.operator)
        .await
    {
        return Err(error(StatusCode::NOT_FOUND, format!("unknown rule {}", id)));
    }
    let rule = state.ingestor.rules().await.into_iter().find(|r| r.id == id);
    Ok(Json(json!({ "data": rule })))
}

async fn export(State(state): State<AppState>) -> Json<Value> {
    let export = state.store.export(&state.operator).await;
    Json(json!({ "data": export }))
}
