//! REST endpoints of the Resource Ledger.
//!
//! Every response uses the shared [`ApiResponse`](fibernet_common::ApiResponse)
//! envelope. Mutations record the caller's user id as `changedBy`.

use crate::ledger::ResourceLedger;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use fibernet_common::api::health;
use fibernet_common::{ok, ApiResult, Caller, Role};
use fibernet_types::{
    Asset, AssetFilter, AssetHistoryEntry, AssetId, AssetStatus, CustomerId, HierarchyLevel,
    HierarchyNode, NewAsset, NewHierarchyNode, NodeId, NodeUpdate, PortReservation,
    ReservationId, ReservePortRequest, SubtreeNode,
};
use serde::Deserialize;
use std::sync::Arc;

type Ledger = State<Arc<ResourceLedger>>;

const ASSET_WRITERS: &[Role] = &[Role::Admin, Role::Planner];
const FIELD_ROLES: &[Role] = &[Role::Admin, Role::Technician];
const NODE_WRITERS: &[Role] = &[Role::Admin, Role::Planner];
const PORT_COUNTER_ROLES: &[Role] = &[Role::Admin, Role::Planner, Role::Technician];
const RESERVATION_ROLES: &[Role] = &[Role::Admin, Role::Planner, Role::Service];
const ASSIGN_ROLES: &[Role] = &[Role::Admin, Role::Technician, Role::Service];
const RECLAIM_ROLES: &[Role] = &[Role::Admin, Role::SupportAgent, Role::Service];
const HISTORY_ROLES: &[Role] = &[Role::Admin, Role::Planner];

/// Builds the inventory router.
pub fn router(ledger: Arc<ResourceLedger>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/inventory/assets", post(create_asset).get(filter_assets))
        .route(
            "/api/inventory/assets/{id}",
            get(get_asset).delete(delete_asset),
        )
        .route("/api/inventory/assets/{id}/status", patch(update_asset_status))
        .route("/api/inventory/assets/{id}/history", get(asset_history))
        .route("/api/inventory/assets/serial/{serial}", get(get_asset_by_serial))
        .route("/api/inventory/assets/serial/{serial}/assign", post(assign_asset))
        .route("/api/inventory/customers/{id}/assets", get(assets_for_customer))
        .route(
            "/api/inventory/customers/{id}/assets/reclaim",
            post(reclaim_assets),
        )
        .route("/api/inventory/nodes", post(create_node).get(list_nodes))
        .route(
            "/api/inventory/nodes/{id}",
            get(get_node).put(update_node).delete(delete_node),
        )
        .route("/api/inventory/nodes/serial/{serial}", get(get_node_by_serial))
        .route("/api/inventory/nodes/{id}/children", get(list_children))
        .route("/api/inventory/nodes/{id}/subtree", get(subtree))
        .route("/api/inventory/nodes/{id}/parent", patch(reparent))
        .route("/api/inventory/splitters/{id}/used-ports", patch(set_used_ports))
        .route(
            "/api/inventory/splitters/{id}/reservations",
            get(list_reservations).post(reserve_port),
        )
        .route("/api/inventory/reservations/{id}", delete(release_port))
        .with_state(ledger)
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: AssetStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssignBody {
    customer_id: CustomerId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReparentBody {
    parent_id: NodeId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsedPortsBody {
    used_ports: i64,
}

#[derive(Debug, Default, Deserialize)]
struct LevelQuery {
    level: Option<HierarchyLevel>,
}

// Assets

async fn create_asset(
    State(ledger): Ledger,
    caller: Caller,
    Json(body): Json<NewAsset>,
) -> ApiResult<Asset> {
    caller.require_any(ASSET_WRITERS)?;
    ok(ledger.create_asset(&caller.user_id, body)?)
}

async fn filter_assets(
    State(ledger): Ledger,
    _caller: Caller,
    Query(filter): Query<AssetFilter>,
) -> ApiResult<Vec<Asset>> {
    ok(ledger.filter_assets(&filter))
}

async fn get_asset(State(ledger): Ledger, _caller: Caller, Path(id): Path<AssetId>) -> ApiResult<Asset> {
    ok(ledger.get_asset(id)?)
}

async fn delete_asset(State(ledger): Ledger, caller: Caller, Path(id): Path<AssetId>) -> ApiResult<()> {
    caller.require_any(&[Role::Admin])?;
    ledger.delete_asset(&caller.user_id, id)?;
    ok(())
}

async fn update_asset_status(
    State(ledger): Ledger,
    caller: Caller,
    Path(id): Path<AssetId>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Asset> {
    caller.require_any(FIELD_ROLES)?;
    ok(ledger.update_asset_status(&caller.user_id, id, body.status)?)
}

async fn asset_history(
    State(ledger): Ledger,
    caller: Caller,
    Path(id): Path<AssetId>,
) -> ApiResult<Vec<AssetHistoryEntry>> {
    caller.require_any(HISTORY_ROLES)?;
    ok(ledger.asset_history(id)?)
}

async fn get_asset_by_serial(
    State(ledger): Ledger,
    _caller: Caller,
    Path(serial): Path<String>,
) -> ApiResult<Asset> {
    ok(ledger.get_asset_by_serial(&serial)?)
}

async fn assign_asset(
    State(ledger): Ledger,
    caller: Caller,
    Path(serial): Path<String>,
    Json(body): Json<AssignBody>,
) -> ApiResult<Asset> {
    caller.require_any(ASSIGN_ROLES)?;
    ok(ledger.assign_asset(&caller.user_id, &serial, body.customer_id)?)
}

async fn assets_for_customer(
    State(ledger): Ledger,
    _caller: Caller,
    Path(id): Path<CustomerId>,
) -> ApiResult<Vec<Asset>> {
    ok(ledger.assets_for_customer(id))
}

async fn reclaim_assets(
    State(ledger): Ledger,
    caller: Caller,
    Path(id): Path<CustomerId>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Vec<Asset>> {
    caller.require_any(RECLAIM_ROLES)?;
    ok(ledger.unassign_assets(&caller.user_id, id, body.status)?)
}

// Hierarchy

async fn create_node(
    State(ledger): Ledger,
    caller: Caller,
    Json(body): Json<NewHierarchyNode>,
) -> ApiResult<HierarchyNode> {
    caller.require_any(NODE_WRITERS)?;
    ok(ledger.create_node(&caller.user_id, body)?)
}

async fn list_nodes(
    State(ledger): Ledger,
    _caller: Caller,
    Query(query): Query<LevelQuery>,
) -> ApiResult<Vec<HierarchyNode>> {
    ok(ledger.list_nodes(query.level)?)
}

async fn get_node(State(ledger): Ledger, _caller: Caller, Path(id): Path<NodeId>) -> ApiResult<HierarchyNode> {
    ok(ledger.get_node(id)?)
}

async fn update_node(
    State(ledger): Ledger,
    caller: Caller,
    Path(id): Path<NodeId>,
    Json(body): Json<NodeUpdate>,
) -> ApiResult<HierarchyNode> {
    caller.require_any(NODE_WRITERS)?;
    ok(ledger.update_node(&caller.user_id, id, body)?)
}

async fn delete_node(State(ledger): Ledger, caller: Caller, Path(id): Path<NodeId>) -> ApiResult<()> {
    caller.require_any(&[Role::Admin])?;
    ledger.delete_node(&caller.user_id, id)?;
    ok(())
}

async fn get_node_by_serial(
    State(ledger): Ledger,
    _caller: Caller,
    Path(serial): Path<String>,
) -> ApiResult<HierarchyNode> {
    ok(ledger.get_node_by_serial(&serial)?)
}

async fn list_children(
    State(ledger): Ledger,
    _caller: Caller,
    Path(id): Path<NodeId>,
) -> ApiResult<Vec<HierarchyNode>> {
    ok(ledger.list_children(id)?)
}

async fn subtree(State(ledger): Ledger, _caller: Caller, Path(id): Path<NodeId>) -> ApiResult<SubtreeNode> {
    ok(ledger.subtree(id)?)
}

async fn reparent(
    State(ledger): Ledger,
    caller: Caller,
    Path(id): Path<NodeId>,
    Json(body): Json<ReparentBody>,
) -> ApiResult<HierarchyNode> {
    caller.require_any(&[Role::Admin])?;
    ok(ledger.reparent(&caller.user_id, id, body.parent_id)?)
}

// Ports

async fn set_used_ports(
    State(ledger): Ledger,
    caller: Caller,
    Path(id): Path<NodeId>,
    Json(body): Json<UsedPortsBody>,
) -> ApiResult<HierarchyNode> {
    caller.require_any(PORT_COUNTER_ROLES)?;
    ok(ledger.set_used_ports(&caller.user_id, id, body.used_ports)?)
}

async fn list_reservations(
    State(ledger): Ledger,
    _caller: Caller,
    Path(id): Path<NodeId>,
) -> ApiResult<Vec<PortReservation>> {
    ok(ledger.list_reservations(id)?)
}

async fn reserve_port(
    State(ledger): Ledger,
    caller: Caller,
    Path(id): Path<NodeId>,
    Json(body): Json<ReservePortRequest>,
) -> ApiResult<PortReservation> {
    caller.require_any(RESERVATION_ROLES)?;
    ok(ledger.reserve_port(&caller.user_id, id, &body)?)
}

async fn release_port(
    State(ledger): Ledger,
    caller: Caller,
    Path(id): Path<ReservationId>,
) -> ApiResult<bool> {
    caller.require_any(RESERVATION_ROLES)?;
    ok(ledger.release_port(&caller.user_id, id)?)
}
