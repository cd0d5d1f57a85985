//! FleetPulse -- Fleet telemetry monitoring and alerting.
//!
//! This crate provides the core library for telemetry ingestion, threshold
//! rules, anomaly scoring, alert de-duplication, edge connectivity tracking,
//! and the operator audit trail.

pub mod api;
pub mod audit;
pub mod buffer;
pub mod config;
pub mod detect;
pub mod edge;
pub mod ingest;
pub mod store;
pub mod telemetry;

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::config::FleetConfig;
use crate::detect::{Alert, ConfigError};
use crate::edge::EdgeDeviceStatus;
use crate::ingest::{IngestSettings, Ingestor};
use crate::store::{FleetStore, FleetSummary};
use crate::telemetry::{SimulatedSource, StaticRegistry};

/// Build an ingestor over the seeded simulator described by `cfg`.
pub async fn simulated_ingestor(cfg: &FleetConfig, seed: Option<u64>) -> Result<Ingestor, ConfigError> {
    let pipeline = cfg.validate()?;
    let seed = seed.unwrap_or(cfg.fleet.simulation_seed);
    let source = SimulatedSource::new(seed).with_disconnected(cfg.fleet.disconnected.iter().cloned());
    let registry = StaticRegistry::new(cfg.fleet.vehicles.iter().cloned());

    Ok(Ingestor::new(
        FleetStore::new(&cfg.ingest),
        Box::new(source),
        Arc::new(registry),
        pipeline,
        IngestSettings::from_config(cfg),
    )
    .await)
}

/// Outcome of a batch simulation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub ticks: u32,
    pub seed: u64,
    pub summary: FleetSummary,
    pub alerts: Vec<Alert>,
    pub edge_status: Vec<EdgeDeviceStatus>,
}

/// Run `ticks` ingestion cycles back to back against the simulator.
pub async fn simulate(cfg: &FleetConfig, ticks: u32, seed: Option<u64>) -> Result<SimulationReport> {
    let ingestor = simulated_ingestor(cfg, seed).await?;
    for tick in 0..ticks {
        let report = ingestor.run_cycle().await;
        tracing::debug!(tick, sampled = report.sampled, alerts = report.alerts_created, "simulated tick");
    }

    let store = ingestor.store();
    Ok(SimulationReport {
        ticks,
        seed: seed.unwrap_or(cfg.fleet.simulation_seed),
        summary: store.summary().await,
        alerts: store.current_alerts().await,
        edge_status: store.current_edge_status().await,
    })
}

/// Start the FleetPulse daemon: ingestion loop and API server.
pub async fn serve(cfg: FleetConfig, bind: Option<String>) -> Result<()> {
    // 1. Build the pipeline
    let ingestor = simulated_ingestor(&cfg, None).await?;

    // 2. Start the ingest engine (background task)
    let engine = ingestor.clone();
    tokio::spawn(async move {
        ingest::run_ingest_loop(engine).await;
    });

    // 3. Start API server
    let bind = bind.unwrap_or_else(|| cfg.api.bind.clone());
    let addr: std::net::SocketAddr = bind.parse()?;
    let app = api::router(api::state::AppState::new(ingestor, cfg.operator.actor()));

    tracing::info!(%addr, vehicles = cfg.fleet.vehicles.len(), "FleetPulse listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulate_skips_disconnected_vehicle() {
        let report = simulate(&FleetConfig::default(), 5, Some(7)).await.unwrap();
        assert_eq!(report.ticks, 5);
        assert_eq!(report.edge_status.len(), 5);

        let v3 = report.edge_status.iter().find(|d| d.vehicle_id == "V-003").unwrap();
        assert!(!v3.connected);
        assert_eq!(v3.sample_count, 0);
        assert!(report.alerts.iter().all(|a| a.vehicle_id != "V-003"));

        let v1 = report.edge_status.iter().find(|d| d.vehicle_id == "V-001").unwrap();
        assert_eq!(v1.sample_count, 5);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_running() {
        let mut cfg = FleetConfig::default();
        cfg.rules[0].metric = "oilPressure".into();
        let err = simulated_ingestor(&cfg, None).await.err().unwrap();
        assert_eq!(err, ConfigError::UnknownMetric("oilPressure".into()));
    }
}
