//! Deterministic risk, efficiency and safety scoring.
//!
//! The scorer is a pure function of the current sample and the vehicle's
//! recent history, so identical inputs always give identical scores.

use serde::{Deserialize, Serialize};

use crate::detect::{ConfigError, Finding, FindingSource, Severity};
use crate::telemetry::TelemetrySample;

/// A simple time series for statistical analysis.
pub struct TimeSeries {
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Deviation of `value` from the mean, as a fraction of `scale`, capped at 1.
    ///
    /// An empty series has no baseline and reports no deviation.
    pub fn normalized_deviation(&self, value: f64, scale: f64) -> f64 {
        if self.values.is_empty() || scale <= 0.0 {
            return 0.0;
        }
        ((value - self.mean()).abs() / scale).min(1.0)
    }
}

/// Latest derived metrics for one vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyScore {
    /// 0..=1
    pub failure_probability: f64,
    pub maintenance_needed: bool,
    /// 0..=100
    pub efficiency_score: f64,
    /// 0..=100
    pub safety_score: f64,
    /// 0..=100
    pub anomaly_score: f64,
}

/// Weight and normalisation scale for one anomaly dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationWeight {
    pub weight: f64,
    /// Deviation (in metric units) that counts as fully anomalous.
    pub scale: f64,
}

/// Tunable scoring thresholds. Supplied as configuration and swappable
/// between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Efficiency reading that maps to a score of 100.
    pub efficiency_scale: f64,
    pub speed: DeviationWeight,
    pub engine_temp: DeviationWeight,
    pub battery: DeviationWeight,
    /// Engine temperature (°C) above which failure risk starts to climb.
    pub temp_nominal: f64,
    /// Degrees above nominal that saturate the temperature stress term.
    pub temp_span: f64,
    /// Battery level (%) below which failure risk starts to climb.
    pub battery_nominal: f64,
    pub temp_risk_weight: f64,
    pub battery_risk_weight: f64,
    /// Speed (mph) above which the safety score is penalised.
    pub speed_limit: f64,
    /// Safety points lost per mph over the limit.
    pub speeding_penalty: f64,
    /// `anomalyScore` above this raises an "ML Anomaly Detected" finding.
    pub anomaly_alert_threshold: f64,
    /// `anomalyScore` above this marks the vehicle for maintenance.
    pub maintenance_anomaly_threshold: f64,
    /// `failureProbability` above this marks the vehicle for maintenance.
    pub maintenance_failure_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            efficiency_scale: 10.0,
            speed: DeviationWeight { weight: 1.0, scale: 40.0 },
            engine_temp: DeviationWeight { weight: 2.0, scale: 15.0 },
            battery: DeviationWeight { weight: 1.0, scale: 20.0 },
            temp_nominal: 90.0,
            temp_span: 30.0,
            battery_nominal: 50.0,
            temp_risk_weight: 0.6,
            battery_risk_weight: 0.4,
            speed_limit: 75.0,
            speeding_penalty: 2.0,
            anomaly_alert_threshold: 85.0,
            maintenance_anomaly_threshold: 70.0,
            maintenance_failure_threshold: 0.2,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("scoring.efficiency_scale", self.efficiency_scale),
            ("scoring.speed.scale", self.speed.scale),
            ("scoring.engine_temp.scale", self.engine_temp.scale),
            ("scoring.battery.scale", self.battery.scale),
            ("scoring.temp_span", self.temp_span),
            ("scoring.battery_nominal", self.battery_nominal),
        ];
        for (field, v) in positive {
            if !v.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
            if v <= 0.0 {
                return Err(ConfigError::NotPositive { field });
            }
        }
        let finite = [
            ("scoring.speed.weight", self.speed.weight),
            ("scoring.engine_temp.weight", self.engine_temp.weight),
            ("scoring.battery.weight", self.battery.weight),
            ("scoring.temp_nominal", self.temp_nominal),
            ("scoring.temp_risk_weight", self.temp_risk_weight),
            ("scoring.battery_risk_weight", self.battery_risk_weight),
            ("scoring.speed_limit", self.speed_limit),
            ("scoring.speeding_penalty", self.speeding_penalty),
            ("scoring.anomaly_alert_threshold", self.anomaly_alert_threshold),
            ("scoring.maintenance_anomaly_threshold", self.maintenance_anomaly_threshold),
            ("scoring.maintenance_failure_threshold", self.maintenance_failure_threshold),
        ];
        for (field, v) in finite {
            if !v.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }
        let total_weight = self.speed.weight + self.engine_temp.weight + self.battery.weight;
        if total_weight <= 0.0 {
            return Err(ConfigError::NotPositive { field: "scoring deviation weights" });
        }
        Ok(())
    }
}

/// Scores samples against a [`ScoringConfig`].
pub struct AnomalyScorer<'a> {
    config: &'a ScoringConfig,
}

impl<'a> AnomalyScorer<'a> {
    pub fn new(config: &'a ScoringConfig) -> Self {
        Self { config }
    }

    /// Score `sample` against the vehicle's recent samples (`window`
    /// excludes `sample` itself).
    pub fn score(&self, sample: &TelemetrySample, window: &[TelemetrySample]) -> AnomalyScore {
        let cfg = self.config;

        let efficiency_score = (sample.efficiency / cfg.efficiency_scale * 100.0).clamp(0.0, 100.0);

        let anomaly_score = self.anomaly(sample, window);

        let temp_stress = ((sample.engine_temp - cfg.temp_nominal) / cfg.temp_span).max(0.0);
        let battery_stress =
            ((cfg.battery_nominal - sample.battery_level) / cfg.battery_nominal).max(0.0);
        let failure_probability = (cfg.temp_risk_weight * temp_stress
            + cfg.battery_risk_weight * battery_stress)
            .clamp(0.0, 1.0);

        let over_limit = (sample.speed - cfg.speed_limit).max(0.0);
        let safety_score = (100.0 - over_limit * cfg.speeding_penalty).clamp(0.0, 100.0);

        let maintenance_needed = anomaly_score > cfg.maintenance_anomaly_threshold
            || failure_probability > cfg.maintenance_failure_threshold;

        AnomalyScore {
            failure_probability,
            maintenance_needed,
            efficiency_score,
            safety_score,
            anomaly_score,
        }
    }

    fn anomaly(&self, sample: &TelemetrySample, window: &[TelemetrySample]) -> f64 {
        let cfg = self.config;
        let dims = [
            (cfg.speed, window.iter().map(|s| s.speed).collect::<Vec<_>>(), sample.speed),
            (
                cfg.engine_temp,
                window.iter().map(|s| s.engine_temp).collect(),
                sample.engine_temp,
            ),
            (
                cfg.battery,
                window.iter().map(|s| s.battery_level).collect(),
                sample.battery_level,
            ),
        ];

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for (w, history, current) in dims {
            let series = TimeSeries::new(history);
            weighted += w.weight * series.normalized_deviation(current, w.scale);
            total_weight += w.weight;
        }
        if total_weight <= 0.0 {
            return 0.0;
        }
        (weighted / total_weight * 100.0).clamp(0.0, 100.0)
    }

    /// Findings implied by a score: at most one per kind.
    pub fn findings(&self, score: &AnomalyScore) -> Vec<Finding> {
        let mut findings = Vec::new();
        if score.anomaly_score > self.config.anomaly_alert_threshold {
            findings.push(Finding {
                cause: "anomaly".to_string(),
                severity: Severity::High,
                title: "ML Anomaly Detected".to_string(),
                message: format!(
                    "Unusual pattern detected. Anomaly score: {:.1}",
                    score.anomaly_score
                ),
                source: FindingSource::Ml,
            });
        }
        if score.maintenance_needed {
            findings.push(Finding {
                cause: "maintenance".to_string(),
                severity: Severity::Medium,
                title: "Predictive Maintenance Alert".to_string(),
                message: format!(
                    "Model suggests scheduling maintenance soon (failure probability {:.0}%)",
                    score.failure_probability * 100.0
                ),
                source: FindingSource::Ml,
            });
        }
        findings
    }
}
