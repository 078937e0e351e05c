//! REST endpoints of the deployment service.
//!
//! Besides the installation and deactivation workflows this daemon hosts the
//! platform's audit log: other services append entries with `POST /api/audit`.

use crate::saga::{DeactivationReport, DeactivationSaga};
use crate::tasks::TaskService;
use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use fibernet_common::api::health;
use fibernet_common::{ok, ApiResult, AuditEntry, AuditQuery, Caller, InMemoryAuditLog, Role};
use fibernet_types::{
    CompleteTaskRequest, CustomerId, DeploymentTask, NewDeploymentTask, TaskId, TechnicianId,
};
use serde::Deserialize;
use std::sync::Arc;

pub struct AppState {
    pub tasks: TaskService,
    pub saga: DeactivationSaga,
    pub audit_log: Arc<InMemoryAuditLog>,
}

type App = State<Arc<AppState>>;

const DEACTIVATE_ROLES: &[Role] = &[Role::Admin, Role::SupportAgent];
const PLANNING_ROLES: &[Role] = &[Role::Admin, Role::Planner];
const FIELD_ROLES: &[Role] = &[Role::Admin, Role::Technician];

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/deployments/tasks", post(create_task).get(list_tasks))
        .route(
            "/api/deployments/tasks/technician/{id}",
            get(tasks_for_technician),
        )
        .route("/api/deployments/tasks/{id}/complete", patch(complete_task))
        .route(
            "/api/deployments/customers/{id}/deactivate",
            post(deactivate),
        )
        .route("/api/audit", post(append_audit).get(query_audit))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct DeactivateBody {
    #[serde(default)]
    reason: Option<String>,
}

async fn create_task(
    State(app): App,
    caller: Caller,
    Json(body): Json<NewDeploymentTask>,
) -> ApiResult<DeploymentTask> {
    caller.require_any(PLANNING_ROLES)?;
    ok(app.tasks.create_task(&caller.user_id, body).await?)
}

async fn list_tasks(State(app): App, caller: Caller) -> ApiResult<Vec<DeploymentTask>> {
    caller.require_any(PLANNING_ROLES)?;
    ok(app.tasks.tasks(None))
}

async fn tasks_for_technician(
    State(app): App,
    caller: Caller,
    Path(id): Path<TechnicianId>,
) -> ApiResult<Vec<DeploymentTask>> {
    caller.require_any(FIELD_ROLES)?;
    ok(app.tasks.tasks(Some(id)))
}

async fn complete_task(
    State(app): App,
    caller: Caller,
    Path(id): Path<TaskId>,
    body: Option<Json<CompleteTaskRequest>>,
) -> ApiResult<DeploymentTask> {
    caller.require_any(FIELD_ROLES)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    ok(app
        .tasks
        .complete_installation(&caller.user_id, id, body.notes.as_deref())
        .await?)
}

async fn deactivate(
    State(app): App,
    caller: Caller,
    Path(id): Path<CustomerId>,
    body: Option<Json<DeactivateBody>>,
) -> ApiResult<DeactivationReport> {
    caller.require_any(DEACTIVATE_ROLES)?;
    let body = body.map(|Json(b)| b).unwrap_or_default();
    ok(app
        .saga
        .deactivate(&caller.user_id, id, body.reason.as_deref())
        .await?)
}

async fn append_audit(
    State(app): App,
    _caller: Caller,
    Json(entry): Json<AuditEntry>,
) -> ApiResult<AuditEntry> {
    ok(app.audit_log.append(entry))
}

async fn query_audit(
    State(app): App,
    caller: Caller,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Vec<AuditEntry>> {
    caller.require_any(&[Role::Admin])?;
    ok(app.audit_log.query(&query))
}
