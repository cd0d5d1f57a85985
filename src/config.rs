//! TOML configuration for FleetPulse.
//!
//! Every section has compiled-in defaults, so an empty file (or no file at
//! all) yields a working five-vehicle simulated fleet. The config file path
//! can be overridden with the `FLEETPULSE_CONFIG` environment variable.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::audit::{Actor, DEFAULT_AUDIT_CAPACITY};
use crate::detect::alerts::DEFAULT_ALERT_CAPACITY;
use crate::detect::rules::{compile_rules, default_rules};
use crate::detect::{ConfigError, RuleConfig, ScoringConfig};
use crate::ingest::Pipeline;

pub const CONFIG_ENV: &str = "FLEETPULSE_CONFIG";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/fleetpulse/fleetpulse.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the FleetPulse process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub fleet: FleetSection,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub operator: OperatorConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            fleet: FleetSection::default(),
            scoring: ScoringConfig::default(),
            rules: default_rules(),
            operator: OperatorConfig::default(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl FleetConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded fleetpulse configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path in the `FLEETPULSE_CONFIG` environment variable.
    /// 2. `/etc/fleetpulse/fleetpulse.toml`.
    /// 3. Compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "FLEETPULSE_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Load from an explicit path when given, otherwise search the usual places.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::load_or_default()),
        }
    }

    /// Check every section and compile the rule set.
    pub fn validate(&self) -> Result<Pipeline, ConfigError> {
        self.ingest.validate()?;
        if !self.fleet.fuel_price.is_finite() {
            return Err(ConfigError::NonFinite { field: "fleet.fuel_price" });
        }
        self.scoring.validate()?;
        let rules = compile_rules(&self.rules)?;
        Ok(Pipeline {
            rules,
            scoring: self.scoring.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

/// Sampling cadence and retention limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Seconds between ingestion cycles.
    pub interval_secs: u64,
    /// Whether streaming starts as soon as the service is up.
    pub start_running: bool,
    /// Samples retained per vehicle.
    pub telemetry_history: usize,
    /// Fuel analytics points retained per vehicle.
    pub fuel_history: usize,
    pub alert_capacity: usize,
    pub audit_capacity: usize,
    /// How long an unacknowledged alert keeps suppressing repeats of the
    /// same finding. `0` suppresses until acknowledgement or eviction.
    pub dedup_expiry_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2,
            start_running: true,
            telemetry_history: 30,
            fuel_history: 20,
            alert_capacity: DEFAULT_ALERT_CAPACITY,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            dedup_expiry_secs: 600,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("ingest.interval_secs", self.interval_secs as usize),
            ("ingest.telemetry_history", self.telemetry_history),
            ("ingest.fuel_history", self.fuel_history),
            ("ingest.alert_capacity", self.alert_capacity),
            ("ingest.audit_capacity", self.audit_capacity),
        ];
        for (field, v) in positive {
            if v == 0 {
                return Err(ConfigError::NotPositive { field });
            }
        }
        Ok(())
    }

    pub fn dedup_expiry(&self) -> Option<chrono::Duration> {
        (self.dedup_expiry_secs > 0).then(|| chrono::Duration::seconds(self.dedup_expiry_secs as i64))
    }
}

// ---------------------------------------------------------------------------
// Fleet
// ---------------------------------------------------------------------------

/// Which vehicles to track and how the built-in simulator behaves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetSection {
    pub vehicles: Vec<String>,
    /// Vehicles whose simulated edge device is offline.
    pub disconnected: Vec<String>,
    pub simulation_seed: u64,
    /// Price per litre used for fuel cost analytics.
    pub fuel_price: f64,
}

impl Default for FleetSection {
    fn default() -> Self {
        Self {
            vehicles: (1..=5).map(|i| format!("V-{:03}", i)).collect(),
            disconnected: vec!["V-003".to_string()],
            simulation_seed: 42,
            fuel_price: 3.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// The operator recorded in the audit trail for API-driven actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    pub id: String,
    pub name: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            id: "U-001".to_string(),
            name: "Admin User".to_string(),
        }
    }
}

impl OperatorConfig {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id.clone(), self.name.clone())
    }
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Metric;
    use std::io::Write;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = FleetConfig::default();

        assert_eq!(cfg.ingest.interval_secs, 2);
        assert!(cfg.ingest.start_running);
        assert_eq!(cfg.ingest.telemetry_history, 30);
        assert_eq!(cfg.ingest.fuel_history, 20);
        assert_eq!(cfg.ingest.alert_capacity, 50);
        assert_eq!(cfg.ingest.audit_capacity, 100);
        assert_eq!(cfg.ingest.dedup_expiry(), Some(chrono::Duration::seconds(600)));

        assert_eq!(cfg.fleet.vehicles, vec!["V-001", "V-002", "V-003", "V-004", "V-005"]);
        assert_eq!(cfg.fleet.disconnected, vec!["V-003"]);
        assert_eq!(cfg.fleet.fuel_price, 3.5);

        assert_eq!(cfg.operator.actor(), Actor::new("U-001", "Admin User"));
        assert_eq!(cfg.api.bind, "0.0.0.0:8080");
        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);

        let pipeline = cfg.validate().unwrap();
        assert_eq!(pipeline.rules.len(), 4);
        assert_eq!(pipeline.rules[0].metric, Metric::EngineTemp);
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg: FleetConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.rules.len(), 4);
        assert_eq!(cfg.ingest.interval_secs, 2);
    }

    #[test]
    fn test_partial_file_overrides() {
        let toml_str = r#"
[ingest]
interval_secs = 5
dedup_expiry_secs = 0

[fleet]
vehicles = ["T-1", "T-2"]
disconnected = []

[scoring]
anomaly_alert_threshold = 90.0

[[rules]]
id = "R-100"
name = "Hot Engine"
metric = "engine_temp"
comparator = ">"
threshold = 100.0
severity = "high"
"#;
        let cfg: FleetConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.ingest.interval_secs, 5);
        assert_eq!(cfg.ingest.telemetry_history, 30);
        assert_eq!(cfg.ingest.dedup_expiry(), None);
        assert_eq!(cfg.fleet.vehicles, vec!["T-1", "T-2"]);
        assert!(cfg.fleet.disconnected.is_empty());
        assert_eq!(cfg.scoring.anomaly_alert_threshold, 90.0);
        assert_eq!(cfg.scoring.speed_limit, 75.0);

        let pipeline = cfg.validate().unwrap();
        assert_eq!(pipeline.rules.len(), 1);
        assert!(pipeline.rules[0].enabled);
        assert_eq!(pipeline.rules[0].threshold, 100.0);
    }

    #[test]
    fn test_malformed_rule_rejected_at_validation() {
        let toml_str = r#"
[[rules]]
id = "R-005"
name = "Harsh Braking"
metric = "deceleration"
comparator = ">"
threshold = 8.0
severity = "low"
"#;
        let cfg: FleetConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::UnknownMetric("deceleration".into())
        );
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut cfg = FleetConfig::default();
        cfg.ingest.alert_capacity = 0;
        assert_eq!(
            cfg.validate().unwrap_err(),
            ConfigError::NotPositive { field: "ingest.alert_capacity" }
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nbind = \"127.0.0.1:9000\"").unwrap();
        let cfg = FleetConfig::load(file.path()).unwrap();
        assert_eq!(cfg.api.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = FleetConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn test_load_invalid_toml_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ingest\ninterval_secs = ").unwrap();
        let err = FleetConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }
}
