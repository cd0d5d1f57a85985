//! Declarative threshold rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::detect::{ConfigError, Finding, FindingSource, Severity};
use crate::telemetry::{Metric, TelemetrySample};

/// Strict threshold comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
}

impl Comparator {
    pub fn breached(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::GreaterThan => value > threshold,
            Comparator::LessThan => value < threshold,
        }
    }
}

impl std::fmt::Display for Comparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparator::GreaterThan => write!(f, ">"),
            Comparator::LessThan => write!(f, "<"),
        }
    }
}

impl std::str::FromStr for Comparator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(Comparator::GreaterThan),
            "<" => Ok(Comparator::LessThan),
            other => Err(ConfigError::UnknownComparator(other.to_string())),
        }
    }
}

/// A validated rule, ready for evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub metric: Metric,
    pub comparator: Comparator,
    pub threshold: f64,
    pub severity: Severity,
    pub enabled: bool,
}

impl AlertRule {
    /// Human-readable condition, e.g. `engineTemp > 95`.
    pub fn condition(&self) -> String {
        format!("{} {} {}", self.metric, self.comparator, self.threshold)
    }

    /// Evaluate this rule alone. Disabled rules and unreadable values never fire.
    pub fn check(&self, sample: &TelemetrySample) -> Option<Finding> {
        if !self.enabled {
            return None;
        }
        let value = sample.value(self.metric)?;
        if !self.comparator.breached(value, self.threshold) {
            return None;
        }
        Some(Finding {
            cause: self.id.clone(),
            severity: self.severity,
            title: self.name.clone(),
            message: self.metric.describe(value),
            source: FindingSource::Rule,
        })
    }
}

/// A rule as written in configuration, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub id: String,
    pub name: String,
    pub metric: String,
    pub comparator: String,
    pub threshold: f64,
    pub severity: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl TryFrom<&RuleConfig> for AlertRule {
    type Error = ConfigError;

    fn try_from(raw: &RuleConfig) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() || raw.name.trim().is_empty() {
            return Err(ConfigError::UnnamedRule(raw.id.clone()));
        }
        if !raw.threshold.is_finite() {
            return Err(ConfigError::NonFiniteThreshold { id: raw.id.clone() });
        }
        Ok(Self {
            id: raw.id.clone(),
            name: raw.name.clone(),
            metric: raw.metric.parse()?,
            comparator: raw.comparator.parse()?,
            threshold: raw.threshold,
            severity: raw.severity.parse()?,
            enabled: raw.enabled,
        })
    }
}

impl From<&AlertRule> for RuleConfig {
    fn from(rule: &AlertRule) -> Self {
        Self {
            id: rule.id.clone(),
            name: rule.name.clone(),
            metric: rule.metric.to_string(),
            comparator: rule.comparator.to_string(),
            threshold: rule.threshold,
            severity: rule.severity.to_string(),
            enabled: rule.enabled,
        }
    }
}

/// Validate a full rule set. Any bad rule rejects the whole set.
pub fn compile_rules(raw: &[RuleConfig]) -> Result<Vec<AlertRule>, ConfigError> {
    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(raw.len());
    for r in raw {
        if !seen.insert(r.id.as_str()) {
            return Err(ConfigError::DuplicateRuleId(r.id.clone()));
        }
        rules.push(AlertRule::try_from(r)?);
    }
    Ok(rules)
}

/// The out-of-box rule set.
pub fn default_rules() -> Vec<RuleConfig> {
    let rule = |id: &str, name: &str, metric: &str, cmp: &str, threshold: f64, severity: &str| {
        RuleConfig {
            id: id.to_string(),
            name: name.to_string(),
            metric: metric.to_string(),
            comparator: cmp.to_string(),
            threshold,
            severity: severity.to_string(),
            enabled: true,
        }
    };
    vec![
        rule("R-001", "Engine Overheating", "engineTemp", ">", 95.0, "high"),
        rule("R-002", "Low Fuel Warning", "fuelLevel", "<", 20.0, "medium"),
        rule("R-003", "Speed Limit Exceeded", "speed", ">", 75.0, "medium"),
        rule("R-004", "Battery Critical", "battery", "<", 20.0, "high"),
    ]
}

/// Stateless evaluator over a rule set.
pub struct RuleEngine;

impl RuleEngine {
    /// Every enabled rule the sample breaches, in rule order.
    pub fn evaluate(sample: &TelemetrySample, rules: &[AlertRule]) -> Vec<Finding> {
        rules.iter().filter_map(|rule| rule.check(sample)).collect()
    }
}
