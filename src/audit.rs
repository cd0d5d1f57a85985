//! In-memory audit trail of operator and system actions.
//!
//! Every alert creation, acknowledgement, streaming toggle, rule change and
//! export is appended here. The trail is bounded: once full, the oldest
//! entry is dropped for each new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::buffer::BoundedBuffer;

pub const DEFAULT_AUDIT_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Who performed an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// The ingestion pipeline itself.
    pub fn system() -> Self {
        Self::new("SYSTEM", "System")
    }
}

// ---------------------------------------------------------------------------
// AuditAction
// ---------------------------------------------------------------------------

/// Categories of auditable actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "System Initialized")]
    SystemInitialized,
    #[serde(rename = "Alert Generated")]
    AlertGenerated,
    #[serde(rename = "Alert Acknowledged")]
    AlertAcknowledged,
    #[serde(rename = "Streaming Toggle")]
    StreamingToggle,
    #[serde(rename = "Rules Updated")]
    RulesUpdated,
    #[serde(rename = "Data Export")]
    DataExport,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditAction::SystemInitialized => "System Initialized",
            AuditAction::AlertGenerated => "Alert Generated",
            AuditAction::AlertAcknowledged => "Alert Acknowledged",
            AuditAction::StreamingToggle => "Streaming Toggle",
            AuditAction::RulesUpdated => "Rules Updated",
            AuditAction::DataExport => "Data Export",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: String,
    pub actor_name: String,
    pub action: AuditAction,
    pub details: String,
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// Append-only, capacity-bounded audit trail.
#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: BoundedBuffer<AuditEntry>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BoundedBuffer::new(capacity),
        }
    }

    /// Append an entry stamped with the current time.
    pub fn record(
        &mut self,
        actor: &Actor,
        action: AuditAction,
        details: impl Into<String>,
    ) -> AuditEntry {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            action,
            details: details.into(),
        };
        tracing::debug!(
            action = %entry.action,
            actor = %entry.actor_id,
            details = %entry.details,
            "audit"
        );
        if let Some(dropped) = self.entries.push(entry.clone()) {
            tracing::trace!(id = %dropped.id, "audit entry evicted");
        }
        entry
    }

    /// Entries newest first.
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.entries.snapshot_newest_first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn latest(&self) -> Option<&AuditEntry> {
        self.entries.latest()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_captures_actor_and_action() {
        let mut log = AuditLog::default();
        let admin = Actor::new("U-001", "Admin User");
        let entry = log.record(&admin, AuditAction::AlertAcknowledged, "Alert ID: 7");

        assert_eq!(entry.actor_id, "U-001");
        assert_eq!(entry.actor_name, "Admin User");
        assert_eq!(entry.action, AuditAction::AlertAcknowledged);
        assert_eq!(entry.details, "Alert ID: 7");
        assert_eq!(log.len(), 1);
        assert_eq!(log.latest(), Some(&entry));
    }

    #[test]
    fn test_snapshot_is_newest_first() {
        let mut log = AuditLog::default();
        let sys = Actor::system();
        log.record(&sys, AuditAction::SystemInitialized, "first");
        log.record(&sys, AuditAction::StreamingToggle, "second");

        let snap = log.snapshot();
        assert_eq!(snap[0].details, "second");
        assert_eq!(snap[1].details, "first");
    }

    #[test]
    fn test_bounded_at_capacity() {
        let mut log = AuditLog::default();
        let sys = Actor::system();
        for i in 0..150 {
            log.record(&sys, AuditAction::AlertGenerated, format!("entry {i}"));
        }
        assert_eq!(log.len(), DEFAULT_AUDIT_CAPACITY);
        let snap = log.snapshot();
        assert_eq!(snap.first().unwrap().details, "entry 149");
        assert_eq!(snap.last().unwrap().details, "entry 50");
    }

    #[test]
    fn test_entry_ids_are_unique() {
        let mut log = AuditLog::new(10);
        let sys = Actor::system();
        let a = log.record(&sys, AuditAction::DataExport, "a");
        let b = log.record(&sys, AuditAction::DataExport, "b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_action_serializes_as_display_name() {
        let json = serde_json::to_string(&AuditAction::AlertGenerated).unwrap();
        assert_eq!(json, "\"Alert Generated\"");
        assert_eq!(AuditAction::StreamingToggle.to_string(), "Streaming Toggle");
    }

    #[test]
    fn test_entry_json_uses_camel_case() {
        let mut log = AuditLog::default();
        let entry = log.record(&Actor::system(), AuditAction::RulesUpdated, "4 rules");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["actorId"], "SYSTEM");
        assert_eq!(json["actorName"], "System");
        assert_eq!(json["action"], "Rules Updated");
        assert!(json.get("occurredAt").is_some());
    }
}
