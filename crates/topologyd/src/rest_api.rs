//! REST endpoints of the topology service.

use crate::resolver::TopologyResolver;
use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use fibernet_common::api::health;
use fibernet_common::{ok, ApiResult, Caller, Role};
use fibernet_types::{CustomerId, CustomerPath, DevicePath, FdhTopology, HeadendTopology, NodeId};
use std::sync::Arc;

type App = State<Arc<TopologyResolver>>;

/// Whole-subtree renders are planning views.
const RENDER_ROLES: &[Role] = &[Role::Admin, Role::Planner, Role::Technician];

pub fn router(resolver: Arc<TopologyResolver>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/topology/customers/{id}/path", get(customer_path))
        .route("/api/topology/devices/{serial}/path", get(device_path))
        .route("/api/topology/headends/{id}", get(headend_topology))
        .route("/api/topology/fdhs/{id}", get(fdh_topology))
        .with_state(resolver)
}

async fn customer_path(
    State(resolver): App,
    _caller: Caller,
    Path(id): Path<CustomerId>,
) -> ApiResult<CustomerPath> {
    ok(resolver.trace_customer(id).await?)
}

async fn device_path(
    State(resolver): App,
    _caller: Caller,
    Path(serial): Path<String>,
) -> ApiResult<DevicePath> {
    ok(resolver.trace_serial(&serial).await?)
}

async fn headend_topology(
    State(resolver): App,
    caller: Caller,
    Path(id): Path<NodeId>,
) -> ApiResult<HeadendTopology> {
    caller.require_any(RENDER_ROLES)?;
    ok(resolver.full_topology(id).await?)
}

async fn fdh_topology(
    State(resolver): App,
    caller: Caller,
    Path(id): Path<NodeId>,
) -> ApiResult<FdhTopology> {
    caller.require_any(RENDER_ROLES)?;
    ok(resolver.fdh_topology(id).await?)
}
