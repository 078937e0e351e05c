//! Assertion helpers over the audit log.

use fibernet_common::{AuditAction, AuditEntry, AuditOutcome, InMemoryAuditLog};

/// Asserts that exactly `expected` entries of `action` were written and
/// returns them, oldest first.
#[track_caller]
pub fn assert_audited(log: &InMemoryAuditLog, action: AuditAction, expected: usize) -> Vec<AuditEntry> {
    let entries = log.by_action(action);
    assert_eq!(
        entries.len(),
        expected,
        "expected {} {} entries, found {}: {:#?}",
        expected,
        action,
        entries.len(),
        entries
    );
    entries
}

/// Asserts that the single `action` entry is a failure carrying an error
/// message containing `fragment`.
#[track_caller]
pub fn assert_failure_audited(log: &InMemoryAuditLog, action: AuditAction, fragment: &str) -> AuditEntry {
    let mut entries = assert_audited(log, action, 1);
    let entry = entries.remove(0);
    assert_eq!(entry.outcome, AuditOutcome::Failure, "{:#?}", entry);
    let error = entry.error.as_deref().unwrap_or_default();
    assert!(
        error.contains(fragment),
        "audit error '{}' does not mention '{}'",
        error,
        fragment
    );
    entry
}

/// Action types in write order.
pub fn audit_trail(log: &InMemoryAuditLog) -> Vec<String> {
    log.query(&Default::default())
        .into_iter()
        .map(|e| e.action_type)
        .collect()
}
