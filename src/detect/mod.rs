//! Rule evaluation, anomaly scoring, and alert lifecycle.

pub mod alerts;
pub mod anomaly;
pub mod rules;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::alerts::{Alert, AlertManager, RaiseOutcome};
pub use self::anomaly::{AnomalyScore, AnomalyScorer, ScoringConfig};
pub use self::rules::{AlertRule, Comparator, RuleConfig, RuleEngine};

/// Malformed configuration, rejected before it can reach evaluation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),
    #[error("unknown comparator '{0}' (expected '>' or '<')")]
    UnknownComparator(String),
    #[error("unknown severity '{0}' (expected low, medium or high)")]
    UnknownSeverity(String),
    #[error("duplicate rule id '{0}'")]
    DuplicateRuleId(String),
    #[error("rule '{0}' has an empty id or name")]
    UnnamedRule(String),
    #[error("rule '{id}' has a non-finite threshold")]
    NonFiniteThreshold { id: String },
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
    #[error("{field} must be finite")]
    NonFinite { field: &'static str },
}

/// Severity levels for findings and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(ConfigError::UnknownSeverity(other.to_string())),
        }
    }
}

/// What produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSource {
    Rule,
    Ml,
    System,
}

impl std::fmt::Display for FindingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FindingSource::Rule => write!(f, "rule"),
            FindingSource::Ml => write!(f, "ml"),
            FindingSource::System => write!(f, "system"),
        }
    }
}

/// A transient evaluation result that has not become an alert yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Identity of the cause within its source: the rule id for rule
    /// findings, `anomaly`/`maintenance` for scorer findings.
    pub cause: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub source: FindingSource,
}

impl Finding {
    pub fn system(
        cause: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            cause: cause.into(),
            severity,
            title: title.into(),
            message: message.into(),
            source: FindingSource::System,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_parse_and_display() {
        for s in ["low", "medium", "high"] {
            assert_eq!(s.parse::<Severity>().unwrap().to_string(), s);
        }
        assert_eq!(
            "critical".parse::<Severity>(),
            Err(ConfigError::UnknownSeverity("critical".into()))
        );
    }

    #[test]
    fn test_severity_orders_by_urgency() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_source_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FindingSource::Ml).unwrap(), "\"ml\"");
        assert_eq!(FindingSource::Rule.to_string(), "rule");
    }
}
