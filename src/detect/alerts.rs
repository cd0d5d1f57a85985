//! Alert lifecycle: creation, de-duplication and acknowledgement.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::audit::{Actor, AuditAction, AuditLog};
use crate::buffer::BoundedBuffer;
use crate::detect::{Finding, FindingSource, Severity};

pub const DEFAULT_ALERT_CAPACITY: usize = 50;

/// A persisted, acknowledgeable alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: u64,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub vehicle_id: String,
    pub source: FindingSource,
    pub cause: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
}

impl Alert {
    fn matches(&self, vehicle_id: &str, finding: &Finding) -> bool {
        self.vehicle_id == vehicle_id
            && self.source == finding.source
            && self.cause == finding.cause
            && self.severity == finding.severity
    }
}

/// Result of [`AlertManager::raise`].
#[derive(Debug, Clone, PartialEq)]
pub enum RaiseOutcome {
    Created(Alert),
    /// An equivalent alert is still outstanding; nothing was recorded.
    Suppressed { existing_id: u64 },
}

impl RaiseOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, RaiseOutcome::Created(_))
    }
}

/// Owns the alert buffer and the id sequence.
#[derive(Debug, Clone)]
pub struct AlertManager {
    alerts: BoundedBuffer<Alert>,
    next_id: u64,
    dedup_expiry: Option<Duration>,
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_CAPACITY, None)
    }
}

impl AlertManager {
    /// `dedup_expiry` bounds how long an unacknowledged alert keeps
    /// suppressing repeats; `None` means until acknowledged or evicted.
    pub fn new(capacity: usize, dedup_expiry: Option<Duration>) -> Self {
        Self {
            alerts: BoundedBuffer::new(capacity),
            next_id: 1,
            dedup_expiry,
        }
    }

    pub fn raise(&mut self, finding: Finding, vehicle_id: &str, audit: &mut AuditLog) -> RaiseOutcome {
        self.raise_at(finding, vehicle_id, Utc::now(), audit)
    }

    pub(crate) fn raise_at(
        &mut self,
        finding: Finding,
        vehicle_id: &str,
        now: DateTime<Utc>,
        audit: &mut AuditLog,
    ) -> RaiseOutcome {
        if let Some(existing_id) = self.outstanding(vehicle_id, &finding, now) {
            debug!(
                vehicle = %vehicle_id,
                cause = %finding.cause,
                existing_id,
                "finding suppressed by outstanding alert"
            );
            return RaiseOutcome::Suppressed { existing_id };
        }

        let id = self.next_id;
        self.next_id += 1;

        let alert = Alert {
            id,
            severity: finding.severity,
            title: finding.title,
            message: finding.message,
            vehicle_id: vehicle_id.to_string(),
            source: finding.source,
            cause: finding.cause,
            created_at: now,
            acknowledged: false,
            acknowledged_at: None,
            acknowledged_by: None,
        };

        info!(
            alert_id = id,
            vehicle = %alert.vehicle_id,
            severity = %alert.severity,
            source = %alert.source,
            title = %alert.title,
            "alert raised"
        );

        if let Some(evicted) = self.alerts.push(alert.clone()) {
            trace!(alert_id = evicted.id, "alert evicted");
        }
        audit.record(
            &Actor::system(),
            AuditAction::AlertGenerated,
            format!("{} - {}", alert.title, alert.message),
        );

        RaiseOutcome::Created(alert)
    }

    /// Id of an unacknowledged, unexpired alert equivalent to `finding`.
    fn outstanding(&self, vehicle_id: &str, finding: &Finding, now: DateTime<Utc>) -> Option<u64> {
        self.alerts
            .iter()
            .rev()
            .filter(|a| !a.acknowledged && a.matches(vehicle_id, finding))
            .find(|a| match self.dedup_expiry {
                Some(expiry) => now - a.created_at < expiry,
                None => true,
            })
            .map(|a| a.id)
    }

    /// Acknowledge an alert. Returns `false` (and records nothing) when the
    /// alert is unknown or already acknowledged.
    pub fn acknowledge(&mut self, alert_id: u64, actor: &Actor, audit: &mut AuditLog) -> bool {
        let Some(alert) = self.alerts.iter_mut().find(|a| a.id == alert_id) else {
            debug!(alert_id, "acknowledge ignored: alert not found");
            return false;
        };
        if alert.acknowledged {
            debug!(alert_id, "acknowledge ignored: already acknowledged");
            return false;
        }

        alert.acknowledged = true;
        alert.acknowledged_at = Some(Utc::now());
        alert.acknowledged_by = Some(actor.id.clone());
        info!(alert_id, actor = %actor.id, "alert acknowledged");

        audit.record(actor, AuditAction::AlertAcknowledged, format!("Alert ID: {}", alert_id));
        true
    }

    pub fn unacknowledged_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.acknowledged).count()
    }

    pub fn get(&self, alert_id: u64) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.id == alert_id)
    }

    /// Alerts newest first.
    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts.snapshot_newest_first()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}
