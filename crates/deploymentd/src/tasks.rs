//! Field installation tasks.
//!
//! A planner schedules a [`DeploymentTask`] for a technician. When the
//! technician completes it, the task is claimed (IN_PROGRESS) under the
//! board lock, the customer is moved PENDING -> ACTIVE through the Customer
//! State Machine, and the task ends COMPLETED or FAILED. A FAILED task can be
//! completed again once the cause is fixed.

use fibernet_common::{
    AuditAction, AuditEntry, AuditSink, CustomerApi, FiberError, FiberResult, IdSequence, Table,
};
use fibernet_types::{
    CustomerStatus, DeploymentTask, NewDeploymentTask, TaskId, TaskStatus, TechnicianId,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// In-memory task table.
#[derive(Debug, Default)]
pub struct TaskBoard {
    tasks: RwLock<Table<TaskId, DeploymentTask>>,
    ids: IdSequence,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request: NewDeploymentTask) -> DeploymentTask {
        let task = DeploymentTask {
            id: TaskId(self.ids.next_id()),
            customer_id: request.customer_id,
            technician_id: request.technician_id,
            scheduled_date: request.scheduled_date,
            status: TaskStatus::Scheduled,
            notes: None,
        };
        self.tasks.write().insert(task.id, task.clone());
        task
    }

    pub fn get(&self, id: TaskId) -> FiberResult<DeploymentTask> {
        self.tasks
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| FiberError::not_found("DeploymentTask", id))
    }

    /// Tasks ordered by id, optionally only those of one technician.
    pub fn list(&self, technician: Option<TechnicianId>) -> Vec<DeploymentTask> {
        let mut tasks: Vec<DeploymentTask> = self
            .tasks
            .read()
            .values()
            .filter(|t| technician.map_or(true, |tech| t.technician_id == tech))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    /// Moves a SCHEDULED or FAILED task to IN_PROGRESS. Two concurrent
    /// completions of one task cannot both claim it.
    fn claim(&self, id: TaskId, note: String) -> FiberResult<DeploymentTask> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| FiberError::not_found("DeploymentTask", id))?;
        if !task.status.can_start() {
            return Err(FiberError::conflict(format!(
                "task {} is {}; only SCHEDULED or FAILED tasks can be completed",
                id, task.status
            )));
        }
        task.status = TaskStatus::InProgress;
        task.add_note(note);
        Ok(task.clone())
    }

    fn finish(&self, id: TaskId, status: TaskStatus, note: String) -> FiberResult<DeploymentTask> {
        let mut tasks = self.tasks.write();
        let task = tasks
            .get_mut(&id)
            .ok_or_else(|| FiberError::not_found("DeploymentTask", id))?;
        task.status = status;
        task.add_note(note);
        Ok(task.clone())
    }
}

/// Schedules installation tasks and completes them.
pub struct TaskService {
    board: TaskBoard,
    customers: Arc<dyn CustomerApi>,
    audit: Arc<dyn AuditSink>,
}

impl TaskService {
    pub fn new(customers: Arc<dyn CustomerApi>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            board: TaskBoard::new(),
            customers,
            audit,
        }
    }

    pub fn board(&self) -> &TaskBoard {
        &self.board
    }

    /// Schedules a task for an existing customer that is not INACTIVE.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_task(
        &self,
        actor: &str,
        request: NewDeploymentTask,
    ) -> FiberResult<DeploymentTask> {
        let customer = self.customers.get_assignment(request.customer_id).await?;
        if customer.status == CustomerStatus::Inactive {
            return Err(FiberError::validation(
                "customerId",
                format!("customer {} is INACTIVE", customer.customer_id),
            ));
        }

        let task = self.board.insert(request);
        info!(task_id = %task.id, technician_id = %task.technician_id, "Deployment task created");
        self.audit
            .emit(AuditEntry::new(
                actor,
                AuditAction::TaskCreated,
                format!(
                    "Deployment task {} created for customer {}",
                    task.id, task.customer_id
                ),
            ))
            .await;
        Ok(task)
    }

    pub fn tasks(&self, technician: Option<TechnicianId>) -> Vec<DeploymentTask> {
        self.board.list(technician)
    }

    /// Completes an installation by activating the task's customer.
    ///
    /// Any failure of the activation marks the task FAILED, is audited as
    /// `INSTALLATION_FAILED` and is returned to the caller.
    #[instrument(skip(self, notes), fields(task_id = %id, correlation_id = tracing::field::Empty))]
    pub async fn complete_installation(
        &self,
        actor: &str,
        id: TaskId,
        notes: Option<&str>,
    ) -> FiberResult<DeploymentTask> {
        let correlation_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("correlation_id", correlation_id.as_str());

        let started = match notes.map(str::trim).filter(|n| !n.is_empty()) {
            Some(notes) => format!("Installation started: {}", notes),
            None => "Installation started".to_string(),
        };
        let task = self.board.claim(id, started)?;
        let customer = task.customer_id;
        self.record(
            AuditEntry::new(
                actor,
                AuditAction::InstallationStarted,
                format!("Installation started for task {}. Customer: {}", id, customer),
            ),
            &correlation_id,
        )
        .await;

        let reason = format!("installation task {}", id);
        match self
            .customers
            .transition(actor, customer, CustomerStatus::Active, Some(reason.as_str()))
            .await
        {
            Ok(_) => {
                let done = self.board.finish(
                    id,
                    TaskStatus::Completed,
                    "Installation completed successfully.".to_string(),
                )?;
                info!(customer_id = %customer, "Installation completed");
                self.record(
                    AuditEntry::new(
                        actor,
                        AuditAction::TaskCompletion,
                        format!("Installation task {} completed for customer {}", id, customer),
                    ),
                    &correlation_id,
                )
                .await;
                Ok(done)
            }
            Err(e) => {
                warn!(customer_id = %customer, error = %e, "Installation failed");
                self.board
                    .finish(id, TaskStatus::Failed, format!("Installation failed: {}", e))?;
                self.record(
                    AuditEntry::new(
                        actor,
                        AuditAction::InstallationFailed,
                        format!("Installation task {} failed for customer {}", id, customer),
                    )
                    .with_error(&e),
                    &correlation_id,
                )
                .await;
                Err(e)
            }
        }
    }

    async fn record(&self, entry: AuditEntry, correlation_id: &str) {
        self.audit
            .emit(entry.with_correlation_id(correlation_id))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fibernet_types::CustomerId;
    use pretty_assertions::assert_eq;

    fn request(customer: u64, technician: u64) -> NewDeploymentTask {
        NewDeploymentTask {
            customer_id: CustomerId(customer),
            technician_id: TechnicianId(technician),
            scheduled_date: Utc::now(),
        }
    }

    #[test]
    fn test_claim_only_from_startable_status() {
        let board = TaskBoard::new();
        let task = board.insert(request(1, 7));
        assert_eq!(task.status, TaskStatus::Scheduled);

        let claimed = board.claim(task.id, "Installation started".into()).unwrap();
        assert_eq!(claimed.status, TaskStatus::InProgress);
        let err = board.claim(task.id, "again".into()).unwrap_err();
        assert!(err.is_conflict());

        board
            .finish(task.id, TaskStatus::Failed, "Installation failed: down".into())
            .unwrap();
        assert!(board.claim(task.id, "retry".into()).is_ok());
        assert_eq!(
            board.claim(TaskId(99), "x".into()).unwrap_err().code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn test_list_by_technician() {
        let board = TaskBoard::new();
        board.insert(request(1, 7));
        board.insert(request(2, 8));
        board.insert(request(3, 7));

        let ids: Vec<TaskId> = board.list(Some(TechnicianId(7))).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TaskId(1), TaskId(3)]);
        assert_eq!(board.list(None).len(), 3);
        assert!(board.list(Some(TechnicianId(9))).is_empty());
    }
}
