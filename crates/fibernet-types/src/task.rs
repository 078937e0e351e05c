//! Field deployment tasks.

use crate::{CustomerId, ParseError, TaskId, TechnicianId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Progress of an installation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Scheduled,
    /// Claimed by a completion attempt; the customer is being activated.
    InProgress,
    Completed,
    /// Activation failed; the task may be completed again.
    Failed,
}

impl TaskStatus {
    /// Returns true if a completion attempt may start from this status.
    pub const fn can_start(&self) -> bool {
        matches!(self, TaskStatus::Scheduled | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Scheduled => "SCHEDULED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TaskStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SCHEDULED" => Ok(TaskStatus::Scheduled),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            _ => Err(ParseError::InvalidTaskStatus(s.to_string())),
        }
    }
}

/// An installation visit scheduled for one technician at one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTask {
    pub id: TaskId,
    pub customer_id: CustomerId,
    pub technician_id: TechnicianId,
    pub scheduled_date: DateTime<Utc>,
    pub status: TaskStatus,
    /// Newline-separated progress notes, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DeploymentTask {
    /// Appends one line to the task notes.
    pub fn add_note(&mut self, line: impl AsRef<str>) {
        match &mut self.notes {
            Some(notes) => {
                notes.push('\n');
                notes.push_str(line.as_ref());
            }
            None => self.notes = Some(line.as_ref().to_string()),
        }
    }
}

/// Request body for scheduling a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeploymentTask {
    pub customer_id: CustomerId,
    pub technician_id: TechnicianId,
    pub scheduled_date: DateTime<Utc>,
}

/// Request body for completing an installation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!("failed".parse::<TaskStatus>().unwrap(), TaskStatus::Failed);
        assert!("DONE".parse::<TaskStatus>().is_err());
        assert!(TaskStatus::Failed.can_start());
        assert!(!TaskStatus::InProgress.can_start());
        assert!(!TaskStatus::Completed.can_start());
    }

    #[test]
    fn test_notes_accumulate() {
        let mut task = DeploymentTask {
            id: TaskId(1),
            customer_id: CustomerId(4),
            technician_id: TechnicianId(9),
            scheduled_date: Utc::now(),
            status: TaskStatus::Scheduled,
            notes: None,
        };
        task.add_note("Installation started: ONT mounted");
        task.add_note("Installation completed successfully.");
        assert_eq!(
            task.notes.as_deref(),
            Some("Installation started: ONT mounted\nInstallation completed successfully.")
        );
    }
}
