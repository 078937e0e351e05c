//! Collaborator seams.
//!
//! Coordinators talk to the Resource Ledger and the Customer State Machine
//! only through these traits. Production wiring uses the HTTP clients in
//! [`http`]; tests plug in the in-process services directly.

pub mod http;

use crate::error::FiberResult;
use async_trait::async_trait;
use fibernet_types::{
    Asset, AssetStatus, Customer, CustomerAssignment, CustomerId, CustomerStatus, HierarchyNode,
    NodeId, PortReservation, ReservationId, ReservePortRequest, SubtreeNode,
};

pub use http::{HttpAuditSink, HttpClient, HttpCustomerClient, HttpLedgerClient};

/// Operations of the Resource Ledger used by other services.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn get_node(&self, id: NodeId) -> FiberResult<HierarchyNode>;

    async fn get_node_by_serial(&self, serial: &str) -> FiberResult<HierarchyNode>;

    /// Returns `root` with all of its descendants in one call.
    async fn subtree(&self, root: NodeId) -> FiberResult<SubtreeNode>;

    async fn get_asset_by_serial(&self, serial: &str) -> FiberResult<Asset>;

    /// Live reservations on a splitter, ordered by port.
    async fn list_reservations(&self, splitter: NodeId) -> FiberResult<Vec<PortReservation>>;

    /// Atomically reserves a port: capacity, port range and occupancy are
    /// checked and `usedPorts` incremented under one lock. Replaying the same
    /// reservation id returns the existing reservation.
    async fn reserve_port(
        &self,
        actor: &str,
        splitter: NodeId,
        request: &ReservePortRequest,
    ) -> FiberResult<PortReservation>;

    /// Releases a reservation. Returns false if the id is unknown or was
    /// already released.
    async fn release_port(&self, actor: &str, reservation: ReservationId) -> FiberResult<bool>;

    async fn assets_for_customer(&self, customer: CustomerId) -> FiberResult<Vec<Asset>>;

    async fn assign_asset(&self, actor: &str, serial: &str, customer: CustomerId)
        -> FiberResult<Asset>;

    /// Frees every asset referencing `customer` and sets it to `status`.
    async fn unassign_assets(
        &self,
        actor: &str,
        customer: CustomerId,
        status: AssetStatus,
    ) -> FiberResult<Vec<Asset>>;
}

/// Operations of the Customer State Machine used by other services.
#[async_trait]
pub trait CustomerApi: Send + Sync {
    async fn get_assignment(&self, customer: CustomerId) -> FiberResult<CustomerAssignment>;

    /// ACTIVE customers assigned to `splitter`.
    async fn customers_by_splitter(&self, splitter: NodeId)
        -> FiberResult<Vec<CustomerAssignment>>;

    async fn transition(
        &self,
        actor: &str,
        customer: CustomerId,
        status: CustomerStatus,
        reason: Option<&str>,
    ) -> FiberResult<Customer>;
}
