//! Shared fleet state and its read-only snapshot surface.
//!
//! All mutable state lives in one [`FleetState`] behind an async
//! `RwLock`. The ingestion cycle is the only routine writer; operator
//! actions (acknowledge, export) take the same write lock for their
//! duration. Every accessor on [`FleetStore`] returns an owned copy, so
//! callers can never observe a half-applied update or mutate internals.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::audit::{Actor, AuditAction, AuditEntry, AuditLog};
use crate::buffer::BoundedBuffer;
use crate::config::IngestConfig;
use crate::detect::{Alert, AlertManager, AnomalyScore, Finding, RaiseOutcome, Severity};
use crate::edge::{EdgeDeviceStatus, EdgeStatusTracker};
use crate::telemetry::fuel::FuelPoint;
use crate::telemetry::TelemetrySample;

/// Pseudo vehicle id used for fleet-wide system alerts.
pub const FLEET_SCOPE: &str = "FLEET";

// ---------------------------------------------------------------------------
// FleetState
// ---------------------------------------------------------------------------

/// Everything the pipeline remembers. Mutated only through the ingestor and
/// the operator methods on [`FleetStore`].
#[derive(Debug)]
pub struct FleetState {
    pub(crate) alerts: AlertManager,
    pub(crate) audit: AuditLog,
    pub(crate) edge: EdgeStatusTracker,
    telemetry: HashMap<String, BoundedBuffer<TelemetrySample>>,
    fuel: HashMap<String, BoundedBuffer<FuelPoint>>,
    scores: HashMap<String, AnomalyScore>,
    telemetry_capacity: usize,
    fuel_capacity: usize,
}

impl FleetState {
    pub fn new(cfg: &IngestConfig) -> Self {
        Self {
            alerts: AlertManager::new(cfg.alert_capacity, cfg.dedup_expiry()),
            audit: AuditLog::new(cfg.audit_capacity),
            edge: EdgeStatusTracker::new(),
            telemetry: HashMap::new(),
            fuel: HashMap::new(),
            scores: HashMap::new(),
            telemetry_capacity: cfg.telemetry_history,
            fuel_capacity: cfg.fuel_history,
        }
    }

    /// Recent samples for `vehicle_id`, oldest first.
    pub(crate) fn recent_window(&self, vehicle_id: &str) -> Vec<TelemetrySample> {
        self.telemetry
            .get(vehicle_id)
            .map(BoundedBuffer::snapshot)
            .unwrap_or_default()
    }

    pub(crate) fn push_sample(&mut self, sample: TelemetrySample, fuel: FuelPoint) {
        let vehicle_id = sample.vehicle_id.clone();
        let telemetry_capacity = self.telemetry_capacity;
        self.telemetry
            .entry(vehicle_id.clone())
            .or_insert_with(|| BoundedBuffer::new(telemetry_capacity))
            .push(sample);
        let fuel_capacity = self.fuel_capacity;
        self.fuel
            .entry(vehicle_id)
            .or_insert_with(|| BoundedBuffer::new(fuel_capacity))
            .push(fuel);
    }

    pub(crate) fn set_score(&mut self, vehicle_id: &str, score: AnomalyScore) {
        self.scores.insert(vehicle_id.to_string(), score);
    }

    /// Raise a finding against `vehicle_id`, auditing through this state's log.
    pub(crate) fn raise(&mut self, finding: Finding, vehicle_id: &str) -> RaiseOutcome {
        self.alerts.raise(finding, vehicle_id, &mut self.audit)
    }

    fn summary(&self) -> FleetSummary {
        FleetSummary {
            alerts: self.alerts.len(),
            unacknowledged: self.alerts.unacknowledged_count(),
            audit_entries: self.audit.len(),
            vehicles_tracked: self.edge.all().len(),
            vehicles_connected: self.edge.connected_count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

/// Headline counters for dashboards and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    pub alerts: usize,
    pub unacknowledged: usize,
    pub audit_entries: usize,
    pub vehicles_tracked: usize,
    pub vehicles_connected: usize,
}

/// Point-in-time copy of the whole store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetExport {
    pub exported_at: DateTime<Utc>,
    pub alerts: Vec<Alert>,
    pub audit_log: Vec<AuditEntry>,
    pub edge_status: Vec<EdgeDeviceStatus>,
    pub scores: BTreeMap<String, AnomalyScore>,
    pub telemetry: BTreeMap<String, Vec<TelemetrySample>>,
    pub fuel: BTreeMap<String, Vec<FuelPoint>>,
}

// ---------------------------------------------------------------------------
// FleetStore
// ---------------------------------------------------------------------------

/// Cloneable handle to the shared fleet state.
#[derive(Clone)]
pub struct FleetStore {
    inner: Arc<RwLock<FleetState>>,
}

impl FleetStore {
    pub fn new(cfg: &IngestConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(FleetState::new(cfg))),
        }
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, FleetState> {
        self.inner.write().await
    }

    /// Alerts newest first.
    pub async fn current_alerts(&self) -> Vec<Alert> {
        self.inner.read().await.alerts.snapshot()
    }

    /// Audit entries newest first.
    pub async fn current_audit_log(&self) -> Vec<AuditEntry> {
        self.inner.read().await.audit.snapshot()
    }

    /// Edge devices ordered by vehicle id.
    pub async fn current_edge_status(&self) -> Vec<EdgeDeviceStatus> {
        self.inner.read().await.edge.all()
    }

    pub async fn latest_anomaly_score(&self, vehicle_id: &str) -> Option<AnomalyScore> {
        self.inner.read().await.scores.get(vehicle_id).copied()
    }

    /// Retained samples for one vehicle, oldest first.
    pub async fn telemetry_history(&self, vehicle_id: &str) -> Vec<TelemetrySample> {
        self.inner.read().await.recent_window(vehicle_id)
    }

    /// Retained fuel analytics for one vehicle, oldest first.
    pub async fn fuel_history(&self, vehicle_id: &str) -> Vec<FuelPoint> {
        self.inner
            .read()
            .await
            .fuel
            .get(vehicle_id)
            .map(BoundedBuffer::snapshot)
            .unwrap_or_default()
    }

    pub async fn unacknowledged_count(&self) -> usize {
        self.inner.read().await.alerts.unacknowledged_count()
    }

    pub async fn summary(&self) -> FleetSummary {
        self.inner.read().await.summary()
    }

    /// Acknowledge an alert on behalf of `actor`. Unknown or already
    /// acknowledged ids are a no-op returning `false`.
    pub async fn acknowledge(&self, alert_id: u64, actor: &Actor) -> bool {
        let mut guard = self.inner.write().await;
        let state = &mut *guard;
        state.alerts.acknowledge(alert_id, actor, &mut state.audit)
    }

    /// Append an audit entry.
    pub async fn record(
        &self,
        actor: &Actor,
        action: AuditAction,
        details: impl Into<String>,
    ) -> AuditEntry {
        self.inner.write().await.audit.record(actor, action, details)
    }

    /// Copy out the whole store, then log the export and raise an
    /// "Export Complete" system alert.
    pub async fn export(&self, actor: &Actor) -> FleetExport {
        let mut state = self.inner.write().await;

        let export = FleetExport {
            exported_at: Utc::now(),
            alerts: state.alerts.snapshot(),
            audit_log: state.audit.snapshot(),
            edge_status: state.edge.all(),
            scores: state.scores.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            telemetry: state
                .telemetry
                .iter()
                .map(|(k, v)| (k.clone(), v.snapshot()))
                .collect(),
            fuel: state
                .fuel
                .iter()
                .map(|(k, v)| (k.clone(), v.snapshot()))
                .collect(),
        };

        state.audit.record(actor, AuditAction::DataExport, "Exported fleet snapshot in JSON format");
        state.raise(
            Finding::system("export", Severity::Low, "Export Complete", "Data exported as JSON"),
            FLEET_SCOPE,
        );

        export
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
