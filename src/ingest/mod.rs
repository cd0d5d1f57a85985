//! Telemetry ingestion: the recurring sample → evaluate → alert cycle.

pub mod engine;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::audit::{Actor, AuditAction};
use crate::config::FleetConfig;
use crate::detect::rules::compile_rules;
use crate::detect::{
    AlertRule, AnomalyScorer, ConfigError, RaiseOutcome, RuleConfig, RuleEngine, ScoringConfig,
};
use crate::store::FleetStore;
use crate::telemetry::fuel::FuelPoint;
use crate::telemetry::{SampleError, TelemetrySample, TelemetrySource, VehicleRegistry};

pub use self::engine::run_ingest_loop;

/// The evaluation inputs a cycle runs with. Swapped whole between cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub rules: Vec<AlertRule>,
    pub scoring: ScoringConfig,
}

/// Streaming state. Only ever toggles between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestorState {
    Stopped,
    Running,
}

impl IngestorState {
    pub fn toggled(self) -> Self {
        match self {
            IngestorState::Stopped => IngestorState::Running,
            IngestorState::Running => IngestorState::Stopped,
        }
    }
}

impl std::fmt::Display for IngestorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestorState::Stopped => write!(f, "stopped"),
            IngestorState::Running => write!(f, "running"),
        }
    }
}

/// Non-pipeline knobs for the ingestor.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub interval: Duration,
    pub start_running: bool,
    pub fuel_price: f64,
}

impl IngestSettings {
    pub fn from_config(cfg: &FleetConfig) -> Self {
        Self {
            interval: Duration::from_secs(cfg.ingest.interval_secs),
            start_running: cfg.ingest.start_running,
            fuel_price: cfg.fleet.fuel_price,
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            start_running: true,
            fuel_price: 3.5,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    /// The cycle did not run because another was still in progress.
    pub skipped: bool,
    pub vehicles: usize,
    pub sampled: usize,
    pub disconnected: usize,
    pub failed: usize,
    pub findings: usize,
    pub alerts_created: usize,
    pub suppressed: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Default)]
struct SampleOutcome {
    findings: usize,
    created: usize,
    suppressed: usize,
}

struct IngestorInner {
    store: FleetStore,
    source: Mutex<Box<dyn TelemetrySource>>,
    registry: Arc<dyn VehicleRegistry>,
    pipeline: RwLock<Arc<Pipeline>>,
    state: watch::Sender<IngestorState>,
    /// Held for the duration of a cycle; a cycle that cannot take it is skipped.
    cycle: Mutex<()>,
    settings: IngestSettings,
}

/// Handle to the ingestion pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Ingestor {
    inner: Arc<IngestorInner>,
}

impl Ingestor {
    /// Build an ingestor and record the system start in the audit trail.
    pub async fn new(
        store: FleetStore,
        source: Box<dyn TelemetrySource>,
        registry: Arc<dyn VehicleRegistry>,
        pipeline: Pipeline,
        settings: IngestSettings,
    ) -> Self {
        let initial = if settings.start_running {
            IngestorState::Running
        } else {
            IngestorState::Stopped
        };
        let (state, _) = watch::channel(initial);

        store
            .record(&Actor::system(), AuditAction::SystemInitialized, "System startup completed")
            .await;
        info!(
            rules = pipeline.rules.len(),
            state = %initial,
            interval_ms = settings.interval.as_millis() as u64,
            "ingestor initialized"
        );

        Self {
            inner: Arc::new(IngestorInner {
                store,
                source: Mutex::new(source),
                registry,
                pipeline: RwLock::new(Arc::new(pipeline)),
                state,
                cycle: Mutex::new(()),
                settings,
            }),
        }
    }

    pub fn store(&self) -> &FleetStore {
        &self.inner.store
    }

    pub fn interval(&self) -> Duration {
        self.inner.settings.interval
    }

    pub fn state(&self) -> IngestorState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<IngestorState> {
        self.inner.state.subscribe()
    }

    /// Flip between running and stopped, auditing the change.
    pub async fn toggle(&self, actor: &Actor) -> IngestorState {
        let mut next = IngestorState::Stopped;
        self.inner.state.send_modify(|s| {
            *s = s.toggled();
            next = *s;
        });
        self.audit_transition(next, actor).await;
        next
    }

    /// Move to `target`. Returns `false` without auditing if already there.
    pub async fn set_state(&self, target: IngestorState, actor: &Actor) -> bool {
        let changed = self.inner.state.send_if_modified(|s| {
            if *s == target {
                false
            } else {
                *s = target;
                true
            }
        });
        if changed {
            self.audit_transition(target, actor).await;
        }
        changed
    }

    pub async fn start(&self, actor: &Actor) -> bool {
        self.set_state(IngestorState::Running, actor).await
    }

    pub async fn stop(&self, actor: &Actor) -> bool {
        self.set_state(IngestorState::Stopped, actor).await
    }

    async fn audit_transition(&self, state: IngestorState, actor: &Actor) {
        let verb = match state {
            IngestorState::Running => "started",
            IngestorState::Stopped => "stopped",
        };
        info!(actor = %actor.id, state = %state, "streaming {}", verb);
        self.inner
            .store
            .record(actor, AuditAction::StreamingToggle, format!("Streaming {}", verb))
            .await;
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    pub async fn rules(&self) -> Vec<AlertRule> {
        self.inner.pipeline.read().await.rules.clone()
    }

    pub async fn scoring(&self) -> ScoringConfig {
        self.inner.pipeline.read().await.scoring.clone()
    }

    /// Replace the rule set. Takes effect from the next cycle.
    pub async fn update_rules(&self, rules: Vec<AlertRule>, actor: &Actor) {
        let count = rules.len();
        {
            let mut slot = self.inner.pipeline.write().await;
            let mut next = Pipeline::clone(&slot);
            next.rules = rules;
            *slot = Arc::new(next);
        }
        info!(rules = count, actor = %actor.id, "rule set replaced");
        self.inner
            .store
            .record(actor, AuditAction::RulesUpdated, format!("{} rules loaded", count))
            .await;
    }

    /// Validate raw rule definitions and install them.
    pub async fn update_rules_from_config(
        &self,
        raw: &[RuleConfig],
        actor: &Actor,
    ) -> Result<Vec<AlertRule>, ConfigError> {
        let rules = compile_rules(raw)?;
        self.update_rules(rules.clone(), actor).await;
        Ok(rules)
    }

    /// Enable or disable one rule. Returns `false` if no rule has that id.
    pub async fn set_rule_enabled(&self, rule_id: &str, enabled: bool, actor: &Actor) -> bool {
        {
            let mut slot = self.inner.pipeline.write().await;
            if !slot.rules.iter().any(|r| r.id == rule_id) {
                return false;
            }
            let mut next = Pipeline::clone(&slot);
            for rule in next.rules.iter_mut().filter(|r| r.id == rule_id) {
                rule.enabled = enabled;
            }
            *slot = Arc::new(next);
        }
        let verb = if enabled { "enabled" } else { "disabled" };
        info!(rule = %rule_id, actor = %actor.id, "rule {}", verb);
        self.inner
            .store
            .record(actor, AuditAction::RulesUpdated, format!("Rule {} {}", rule_id, verb))
            .await;
        true
    }

    /// Replace scoring thresholds. Takes effect from the next cycle.
    pub async fn update_scoring(&self, scoring: ScoringConfig) -> Result<(), ConfigError> {
        scoring.validate()?;
        let mut slot = self.inner.pipeline.write().await;
        let mut next = Pipeline::clone(&slot);
        next.scoring = scoring;
        *slot = Arc::new(next);
        info!("scoring thresholds replaced");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cycle
    // -----------------------------------------------------------------------

    /// Run one ingestion cycle over every registered vehicle.
    ///
    /// If another cycle is still in progress this returns immediately with
    /// `skipped = true`; cycles never queue up behind each other.
    pub async fn run_cycle(&self) -> CycleReport {
        let Ok(_guard) = self.inner.cycle.try_lock() else {
            warn!("previous ingestion cycle still running, skipping tick");
            return CycleReport {
                skipped: true,
                ..CycleReport::default()
            };
        };

        let started = Instant::now();
        let pipeline = Arc::clone(&*self.inner.pipeline.read().await);
        let vehicles = self.inner.registry.active_vehicles();
        let mut report = CycleReport {
            vehicles: vehicles.len(),
            ..CycleReport::default()
        };

        for vehicle_id in &vehicles {
            let sample = self.inner.source.lock().await.next(vehicle_id);
            let Some(sample) = sample else {
                debug!(vehicle = %vehicle_id, "no sample this tick");
                self.inner.store.write().await.edge.update(vehicle_id, false, 0, 0);
                report.disconnected += 1;
                continue;
            };

            match self.process_sample(vehicle_id, sample, &pipeline).await {
                Ok(outcome) => {
                    report.sampled += 1;
                    report.findings += outcome.findings;
                    report.alerts_created += outcome.created;
                    report.suppressed += outcome.suppressed;
                }
                Err(e) => {
                    warn!(vehicle = %vehicle_id, error = %e, "sample rejected");
                    report.failed += 1;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        debug!(
            vehicles = report.vehicles,
            sampled = report.sampled,
            disconnected = report.disconnected,
            failed = report.failed,
            alerts = report.alerts_created,
            suppressed = report.suppressed,
            "ingestion cycle complete"
        );
        report
    }

    /// Evaluate one sample and apply every resulting change in a single
    /// write section, so readers see all of it or none of it.
    async fn process_sample(
        &self,
        vehicle_id: &str,
        sample: TelemetrySample,
        pipeline: &Pipeline,
    ) -> Result<SampleOutcome, SampleError> {
        sample.validate()?;
        if sample.vehicle_id != vehicle_id {
            return Err(SampleError::VehicleMismatch {
                expected: vehicle_id.to_string(),
                got: sample.vehicle_id,
            });
        }

        let mut state = self.inner.store.write().await;
        let window = state.recent_window(vehicle_id);

        let mut findings = RuleEngine::evaluate(&sample, &pipeline.rules);
        let scorer = AnomalyScorer::new(&pipeline.scoring);
        let score = scorer.score(&sample, &window);
        findings.extend(scorer.findings(&score));

        let latency_ms = (Utc::now() - sample.captured_at).num_milliseconds().max(0) as u64;
        let sample_count = state.edge.sample_count(vehicle_id) + 1;
        state.edge.update(vehicle_id, true, latency_ms, sample_count);

        state.set_score(vehicle_id, score);
        let fuel = FuelPoint::from_sample(&sample, self.inner.settings.fuel_price);
        state.push_sample(sample, fuel);

        let mut outcome = SampleOutcome {
            findings: findings.len(),
            ..SampleOutcome::default()
        };
        for finding in findings {
            match state.raise(finding, vehicle_id) {
                RaiseOutcome::Created(_) => outcome.created += 1,
                RaiseOutcome::Suppressed { .. } => outcome.suppressed += 1,
            }
        }
        Ok(outcome)
    }
}
