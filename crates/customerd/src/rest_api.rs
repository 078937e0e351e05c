//! REST endpoints of the Customer State Machine.

use crate::service::{CustomerDetails, CustomerService};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use fibernet_common::api::health;
use fibernet_common::{ok, ApiResult, Caller, CustomerApi, Role};
use fibernet_types::{
    Asset, AssignPortRequest, Customer, CustomerAssignment, CustomerId, CustomerProfile,
    CustomerSearch, FiberDropLine, NodeId, ProfileUpdate, StatusChangeRequest,
};
use serde::Deserialize;
use std::sync::Arc;

type Service = State<Arc<CustomerService>>;

const CREATORS: &[Role] = &[Role::Admin, Role::Planner];
const READERS: &[Role] = &[Role::Admin, Role::Planner, Role::SupportAgent, Role::Technician];
const EDITORS: &[Role] = &[Role::Admin, Role::Planner, Role::SupportAgent];
const STATUS_ROLES: &[Role] = &[Role::Admin, Role::Planner, Role::SupportAgent, Role::Service];
const PORT_ROLES: &[Role] = &[Role::Admin, Role::Planner];
const ASSET_ROLES: &[Role] = &[Role::Admin, Role::Planner, Role::Technician];
const LINE_ROLES: &[Role] = &[Role::Admin, Role::Planner, Role::Technician];

pub fn router(service: Arc<CustomerService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/customers", post(create).get(search))
        .route(
            "/api/customers/{id}",
            get(details).put(update_profile).delete(delete_customer),
        )
        .route("/api/customers/{id}/assignment", get(assignment))
        .route("/api/customers/{id}/status", put(change_status))
        .route(
            "/api/customers/{id}/port",
            post(assign_port).put(reassign_port).delete(release_port),
        )
        .route("/api/customers/{id}/assets", post(assign_asset))
        .route("/api/customers/by-splitter/{id}", get(by_splitter))
        .route("/api/customers/fiber-drop-lines", get(lines))
        .route(
            "/api/customers/fiber-drop-lines/splitter/{id}",
            get(lines_by_splitter),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetBody {
    serial_number: String,
}

async fn create(
    State(service): Service,
    caller: Caller,
    Json(body): Json<CustomerProfile>,
) -> ApiResult<Customer> {
    caller.require_any(CREATORS)?;
    ok(service.create(&caller.user_id, body)?)
}

async fn search(
    State(service): Service,
    caller: Caller,
    Query(query): Query<CustomerSearch>,
) -> ApiResult<Vec<Customer>> {
    caller.require_any(EDITORS)?;
    ok(service.search(&query))
}

async fn details(
    State(service): Service,
    caller: Caller,
    Path(id): Path<CustomerId>,
) -> ApiResult<CustomerDetails> {
    caller.require_any(READERS)?;
    ok(service.details(id).await?)
}

async fn update_profile(
    State(service): Service,
    caller: Caller,
    Path(id): Path<CustomerId>,
    Json(body): Json<ProfileUpdate>,
) -> ApiResult<Customer> {
    caller.require_any(EDITORS)?;
    ok(service.update_profile(&caller.user_id, id, body)?)
}

async fn delete_customer(
    State(service): Service,
    caller: Caller,
    Path(id): Path<CustomerId>,
) -> ApiResult<()> {
    caller.require_any(&[Role::Admin])?;
    service.delete(&caller.user_id, id)?;
    ok(())
}

async fn assignment(
    State(service): Service,
    _caller: Caller,
    Path(id): Path<CustomerId>,
) -> ApiResult<CustomerAssignment> {
    ok(service.get_assignment(id).await?)
}

async fn by_splitter(
    State(service): Service,
    _caller: Caller,
    Path(id): Path<NodeId>,
) -> ApiResult<Vec<CustomerAssignment>> {
    ok(service.customers_by_splitter(id).await?)
}

async fn change_status(
    State(service): Service,
    caller: Caller,
    Path(id): Path<CustomerId>,
    Json(body): Json<StatusChangeRequest>,
) -> ApiResult<Customer> {
    caller.require_any(STATUS_ROLES)?;
    ok(service
        .change_status(&caller.user_id, id, body.status, body.reason.as_deref())
        .await?)
}

async fn assign_port(
    State(service): Service,
    caller: Caller,
    Path(id): Path<CustomerId>,
    Json(body): Json<AssignPortRequest>,
) -> ApiResult<Customer> {
    caller.require_any(PORT_ROLES)?;
    ok(service.allocation().assign(&caller.user_id, id, &body).await?)
}

async fn reassign_port(
    State(service): Service,
    caller: Caller,
    Path(id): Path<CustomerId>,
    Json(body): Json<AssignPortRequest>,
) -> ApiResult<Customer> {
    caller.require_any(PORT_ROLES)?;
    ok(service.allocation().reassign(&caller.user_id, id, &body).await?)
}

async fn release_port(
    State(service): Service,
    caller: Caller,
    Path(id): Path<CustomerId>,
) -> ApiResult<Customer> {
    caller.require_any(PORT_ROLES)?;
    ok(service.allocation().release(&caller.user_id, id).await?)
}

async fn assign_asset(
    State(service): Service,
    caller: Caller,
    Path(id): Path<CustomerId>,
    Json(body): Json<AssetBody>,
) -> ApiResult<Asset> {
    caller.require_any(ASSET_ROLES)?;
    ok(service
        .assign_asset(&caller.user_id, id, &body.serial_number)
        .await?)
}

async fn lines(State(service): Service, caller: Caller) -> ApiResult<Vec<FiberDropLine>> {
    caller.require_any(LINE_ROLES)?;
    ok(service.lines())
}

async fn lines_by_splitter(
    State(service): Service,
    caller: Caller,
    Path(id): Path<NodeId>,
) -> ApiResult<Vec<FiberDropLine>> {
    caller.require_any(LINE_ROLES)?;
    ok(service.lines_by_splitter(id))
}
