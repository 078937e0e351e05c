//! Audit trail for allocation, deactivation and installation workflows.
//!
//! Coordinators build an [`AuditEntry`] for every state transition and every
//! failure and hand it to an [`AuditSink`]. Entries are independent side
//! effects: a sink failure is logged and never alters the outcome of the
//! operation that produced the entry.
//!
//! Every emitted entry is also mirrored to the `audit` tracing target via
//! [`audit_log!`](crate::audit_log).

use crate::error::FiberResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    #[default]
    Success,
    Failure,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Failure => write!(f, "failure"),
        }
    }
}

/// Action types written by fibernet workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    PortAssigned,
    PortAssignmentFailed,
    PortReassigned,
    PortReassignmentFailed,
    PortReleased,
    PortReleaseFailed,
    CustomerStatusChanged,
    CustomerStatusChangeFailed,
    CustomerDeactivation,
    CustomerDeactivationFailed,
    AssetReclamation,
    AssetReclamationFailed,
    TaskCreated,
    InstallationStarted,
    TaskCompletion,
    InstallationFailed,
}

impl AuditAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PortAssigned => "PORT_ASSIGNED",
            AuditAction::PortAssignmentFailed => "PORT_ASSIGNMENT_FAILED",
            AuditAction::PortReassigned => "PORT_REASSIGNED",
            AuditAction::PortReassignmentFailed => "PORT_REASSIGNMENT_FAILED",
            AuditAction::PortReleased => "PORT_RELEASED",
            AuditAction::PortReleaseFailed => "PORT_RELEASE_FAILED",
            AuditAction::CustomerStatusChanged => "CUSTOMER_STATUS_CHANGED",
            AuditAction::CustomerStatusChangeFailed => "CUSTOMER_STATUS_CHANGE_FAILED",
            AuditAction::CustomerDeactivation => "CUSTOMER_DEACTIVATION",
            AuditAction::CustomerDeactivationFailed => "CUSTOMER_DEACTIVATION_FAILED",
            AuditAction::AssetReclamation => "ASSET_RECLAMATION",
            AuditAction::AssetReclamationFailed => "ASSET_RECLAMATION_FAILED",
            AuditAction::TaskCreated => "TASK_CREATED",
            AuditAction::InstallationStarted => "INSTALLATION_STARTED",
            AuditAction::TaskCompletion => "TASK_COMPLETION",
            AuditAction::InstallationFailed => "INSTALLATION_FAILED",
        }
    }

    /// Returns true for the `*_FAILED` actions.
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            AuditAction::PortAssignmentFailed
                | AuditAction::PortReassignmentFailed
                | AuditAction::PortReleaseFailed
                | AuditAction::CustomerStatusChangeFailed
                | AuditAction::CustomerDeactivationFailed
                | AuditAction::AssetReclamationFailed
                | AuditAction::InstallationFailed
        )
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Assigned by the store on append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub actor_id: String,
    pub action_type: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub outcome: AuditOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Groups entries written by one workflow run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl AuditEntry {
    /// Creates an entry stamped with the current time.
    ///
    /// The outcome follows the action: `*_FAILED` actions start as failures.
    pub fn new(
        actor_id: impl Into<String>,
        action: AuditAction,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            actor_id: actor_id.into(),
            action_type: action.as_str().to_string(),
            description: description.into(),
            timestamp: Utc::now(),
            outcome: if action.is_failure() {
                AuditOutcome::Failure
            } else {
                AuditOutcome::Success
            },
            error: None,
            correlation_id: None,
        }
    }

    /// Records the causing error and marks the entry as a failure.
    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self.outcome = AuditOutcome::Failure;
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Serializes to a single JSON line.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Optional, combinable audit filters. The time window is inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub action_type: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.actor_id.as_ref().map_or(true, |a| *a == entry.actor_id)
            && self
                .action_type
                .as_ref()
                .map_or(true, |t| t.eq_ignore_ascii_case(&entry.action_type))
            && self.from.map_or(true, |from| entry.timestamp >= from)
            && self.to.map_or(true, |to| entry.timestamp <= to)
    }
}

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one entry.
    async fn record(&self, entry: AuditEntry) -> FiberResult<()>;

    /// Logs and persists one entry, swallowing persistence failures.
    async fn emit(&self, entry: AuditEntry) {
        crate::audit_log!(&entry);
        if let Err(e) = self.record(entry).await {
            warn!(error = %e, "Failed to persist audit entry");
        }
    }
}

/// In-memory append-only audit store.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, assigning it the next id.
    pub fn append(&self, mut entry: AuditEntry) -> AuditEntry {
        let mut entries = self.entries.write();
        entry.id = Some(entries.len() as u64 + 1);
        entries.push(entry.clone());
        entry
    }

    /// Returns matching entries, oldest first.
    pub fn query(&self, query: &AuditQuery) -> Vec<AuditEntry> {
        let mut matched: Vec<AuditEntry> = self
            .entries
            .read()
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        matched.sort_by_key(|e| e.timestamp);
        matched
    }

    /// Returns every entry with the given action type.
    pub fn by_action(&self, action: AuditAction) -> Vec<AuditEntry> {
        self.query(&AuditQuery {
            action_type: Some(action.as_str().to_string()),
            ..Default::default()
        })
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    async fn record(&self, entry: AuditEntry) -> FiberResult<()> {
        self.append(entry);
        Ok(())
    }
}

/// Mirrors an [`AuditEntry`] to the `audit` tracing target.
///
/// Successes are logged at INFO, failures at WARN.
#[macro_export]
macro_rules! audit_log {
    ($entry:expr) => {
        let entry: &$crate::audit::AuditEntry = $entry;
        match entry.outcome {
            $crate::audit::AuditOutcome::Success => {
                tracing::info!(
                    target: "audit",
                    actor = %entry.actor_id,
                    action = %entry.action_type,
                    outcome = %entry.outcome,
                    audit_json = %entry.to_json(),
                    "AUDIT: {} - {}",
                    entry.action_type,
                    entry.description
                );
            }
            $crate::audit::AuditOutcome::Failure => {
                tracing::warn!(
                    target: "audit",
                    actor = %entry.actor_id,
                    action = %entry.action_type,
                    outcome = %entry.outcome,
                    error = entry.error.as_deref().unwrap_or(""),
                    audit_json = %entry.to_json(),
                    "AUDIT: {} - {}",
                    entry.action_type,
                    entry.description
                );
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FiberError;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_outcome_follows_action() {
        let ok = AuditEntry::new("alice", AuditAction::PortAssigned, "assigned");
        assert_eq!(ok.outcome, AuditOutcome::Success);
        assert_eq!(ok.action_type, "PORT_ASSIGNED");

        let failed = AuditEntry::new("alice", AuditAction::CustomerDeactivationFailed, "x");
        assert_eq!(failed.outcome, AuditOutcome::Failure);
        let install = AuditEntry::new("tech-2", AuditAction::InstallationFailed, "x");
        assert_eq!(install.outcome, AuditOutcome::Failure);
        assert_eq!(install.action_type, "INSTALLATION_FAILED");

        let with_error = AuditEntry::new("alice", AuditAction::PortReleased, "x")
            .with_error(FiberError::internal("boom"));
        assert_eq!(with_error.outcome, AuditOutcome::Failure);
        assert_eq!(with_error.error.as_deref(), Some("Internal error: boom"));
    }

    #[test]
    fn test_entry_json() {
        let json = AuditEntry::new("bob", AuditAction::AssetReclamation, "reclaimed 2 assets")
            .with_correlation_id("c-1")
            .to_json();
        assert!(json.contains("\"actorId\":\"bob\""));
        assert!(json.contains("ASSET_RECLAMATION"));
        assert!(json.contains("\"correlationId\":\"c-1\""));
    }

    #[test]
    fn test_query_filters_combine() {
        let log = InMemoryAuditLog::new();
        let now = Utc::now();
        log.append(
            AuditEntry::new("alice", AuditAction::PortAssigned, "a")
                .with_timestamp(now - Duration::hours(2)),
        );
        log.append(AuditEntry::new("alice", AuditAction::PortReleased, "b").with_timestamp(now));
        log.append(AuditEntry::new("bob", AuditAction::PortAssigned, "c").with_timestamp(now));

        assert_eq!(log.query(&AuditQuery::default()).len(), 3);

        let alice_recent = log.query(&AuditQuery {
            actor_id: Some("alice".to_string()),
            from: Some(now - Duration::minutes(5)),
            ..Default::default()
        });
        assert_eq!(alice_recent.len(), 1);
        assert_eq!(alice_recent[0].description, "b");

        let assigned = log.query(&AuditQuery {
            action_type: Some("port_assigned".to_string()),
            to: Some(now - Duration::hours(1)),
            ..Default::default()
        });
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].actor_id, "alice");
    }

    #[test]
    fn test_append_assigns_ids() {
        let log = InMemoryAuditLog::new();
        let first = log.append(AuditEntry::new("a", AuditAction::PortAssigned, "x"));
        let second = log.append(AuditEntry::new("a", AuditAction::PortAssigned, "y"));
        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));
    }

    #[tokio::test]
    async fn test_emit_records_entry() {
        let log = InMemoryAuditLog::new();
        log.emit(AuditEntry::new("a", AuditAction::PortReleased, "released"))
            .await;
        assert_eq!(log.by_action(AuditAction::PortReleased).len(), 1);
    }

    struct DownSink;

    #[async_trait]
    impl AuditSink for DownSink {
        async fn record(&self, _entry: AuditEntry) -> FiberResult<()> {
            Err(FiberError::unreachable("audit", "connection refused"))
        }
    }

    #[test]
    fn test_emit_swallows_store_failure() {
        // Completes without panicking or surfacing the error.
        tokio_test::block_on(DownSink.emit(AuditEntry::new(
            "a",
            AuditAction::PortAssignmentFailed,
            "assign failed",
        )));
    }
}
