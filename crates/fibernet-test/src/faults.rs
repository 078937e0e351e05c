//! Fault injection for collaborator seams.
//!
//! The wrappers forward to a real implementation and fail selected
//! operations with the error an unreachable service produces over HTTP.

use async_trait::async_trait;
use fibernet_common::{
    AuditEntry, AuditSink, CustomerApi, FiberError, FiberResult, LedgerApi,
};
use fibernet_types::{
    Asset, AssetStatus, Customer, CustomerAssignment, CustomerId, CustomerStatus, HierarchyNode,
    NodeId, PortReservation, ReservationId, ReservePortRequest, SubtreeNode,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Ledger operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOp {
    GetNode,
    GetNodeBySerial,
    Subtree,
    GetAssetBySerial,
    ListReservations,
    ReservePort,
    ReleasePort,
    AssetsForCustomer,
    AssignAsset,
    UnassignAssets,
}

/// Customer operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomerOp {
    GetAssignment,
    CustomersBySplitter,
    Transition,
}

/// Per-operation failure switches and call counters.
#[derive(Debug)]
pub struct FaultPlan<Op> {
    service: &'static str,
    /// Remaining failures per operation; `usize::MAX` fails forever.
    armed: Mutex<HashMap<Op, usize>>,
    calls: Mutex<HashMap<Op, usize>>,
}

impl<Op: Copy + Eq + Hash + fmt::Debug> FaultPlan<Op> {
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            armed: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Fails every call to `op` until healed.
    pub fn fail(&self, op: Op) {
        self.armed.lock().insert(op, usize::MAX);
    }

    /// Fails the next `times` calls to `op`.
    pub fn fail_times(&self, op: Op, times: usize) {
        if times == 0 {
            self.heal(op);
        } else {
            self.armed.lock().insert(op, times);
        }
    }

    pub fn heal(&self, op: Op) {
        self.armed.lock().remove(&op);
    }

    /// Calls made to `op`, failed ones included.
    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().get(&op).copied().unwrap_or_default()
    }

    fn check(&self, op: Op) -> FiberResult<()> {
        *self.calls.lock().entry(op).or_default() += 1;

        let mut armed = self.armed.lock();
        let Some(remaining) = armed.get_mut(&op) else {
            return Ok(());
        };
        if *remaining != usize::MAX {
            *remaining -= 1;
            if *remaining == 0 {
                armed.remove(&op);
            }
        }
        debug!(service = self.service, ?op, "Injecting fault");
        Err(FiberError::unreachable(
            self.service,
            format!("injected fault on {:?}", op),
        ))
    }
}

/// Runs after a reservation succeeds, before the caller sees it.
pub type ReserveHook = Box<dyn Fn(&PortReservation) + Send + Sync>;

/// [`LedgerApi`] wrapper with injectable faults.
pub struct FaultyLedger {
    inner: Arc<dyn LedgerApi>,
    faults: FaultPlan<LedgerOp>,
    after_reserve: Option<ReserveHook>,
}

impl FaultyLedger {
    pub fn new(inner: Arc<dyn LedgerApi>) -> Self {
        Self {
            inner,
            faults: FaultPlan::new("inventory"),
            after_reserve: None,
        }
    }

    /// Installs a hook that simulates a concurrent writer acting between
    /// the reservation and the caller's next step.
    pub fn after_reserve(mut self, hook: impl Fn(&PortReservation) + Send + Sync + 'static) -> Self {
        self.after_reserve = Some(Box::new(hook));
        self
    }

    pub fn faults(&self) -> &FaultPlan<LedgerOp> {
        &self.faults
    }
}

#[async_trait]
impl LedgerApi for FaultyLedger {
    async fn get_node(&self, id: NodeId) -> FiberResult<HierarchyNode> {
        self.faults.check(LedgerOp::GetNode)?;
        self.inner.get_node(id).await
    }

    async fn get_node_by_serial(&self, serial: &str) -> FiberResult<HierarchyNode> {
        self.faults.check(LedgerOp::GetNodeBySerial)?;
        self.inner.get_node_by_serial(serial).await
    }

    async fn subtree(&self, root: NodeId) -> FiberResult<SubtreeNode> {
        self.faults.check(LedgerOp::Subtree)?;
        self.inner.subtree(root).await
    }

    async fn get_asset_by_serial(&self, serial: &str) -> FiberResult<Asset> {
        self.faults.check(LedgerOp::GetAssetBySerial)?;
        self.inner.get_asset_by_serial(serial).await
    }

    async fn list_reservations(&self, splitter: NodeId) -> FiberResult<Vec<PortReservation>> {
        self.faults.check(LedgerOp::ListReservations)?;
        self.inner.list_reservations(splitter).await
    }

    async fn reserve_port(
        &self,
        actor: &str,
        splitter: NodeId,
        request: &ReservePortRequest,
    ) -> FiberResult<PortReservation> {
        self.faults.check(LedgerOp::ReservePort)?;
        let reservation = self.inner.reserve_port(actor, splitter, request).await?;
        if let Some(hook) = &self.after_reserve {
            hook(&reservation);
        }
        Ok(reservation)
    }

    async fn release_port(&self, actor: &str, reservation: ReservationId) -> FiberResult<bool> {
        self.faults.check(LedgerOp::ReleasePort)?;
        self.inner.release_port(actor, reservation).await
    }

    async fn assets_for_customer(&self, customer: CustomerId) -> FiberResult<Vec<Asset>> {
        self.faults.check(LedgerOp::AssetsForCustomer)?;
        self.inner.assets_for_customer(customer).await
    }

    async fn assign_asset(
        &self,
        actor: &str,
        serial: &str,
        customer: CustomerId,
    ) -> FiberResult<Asset> {
        self.faults.check(LedgerOp::AssignAsset)?;
        self.inner.assign_asset(actor, serial, customer).await
    }

    async fn unassign_assets(
        &self,
        actor: &str,
        customer: CustomerId,
        status: AssetStatus,
    ) -> FiberResult<Vec<Asset>> {
        self.faults.check(LedgerOp::UnassignAssets)?;
        self.inner.unassign_assets(actor, customer, status).await
    }
}

/// [`CustomerApi`] wrapper with injectable faults.
///
/// Also tracks how many `customers_by_splitter` calls overlap, optionally
/// holding each call for `delay`.
pub struct FaultyCustomers {
    inner: Arc<dyn CustomerApi>,
    faults: FaultPlan<CustomerOp>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FaultyCustomers {
    pub fn new(inner: Arc<dyn CustomerApi>) -> Self {
        Self {
            inner,
            faults: FaultPlan::new("customer"),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn faults(&self) -> &FaultPlan<CustomerOp> {
        &self.faults
    }

    /// Highest number of concurrent `customers_by_splitter` calls seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CustomerApi for FaultyCustomers {
    async fn get_assignment(&self, customer: CustomerId) -> FiberResult<CustomerAssignment> {
        self.faults.check(CustomerOp::GetAssignment)?;
        self.inner.get_assignment(customer).await
    }

    async fn customers_by_splitter(
        &self,
        splitter: NodeId,
    ) -> FiberResult<Vec<CustomerAssignment>> {
        self.faults.check(CustomerOp::CustomersBySplitter)?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.inner.customers_by_splitter(splitter).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn transition(
        &self,
        actor: &str,
        customer: CustomerId,
        status: CustomerStatus,
        reason: Option<&str>,
    ) -> FiberResult<Customer> {
        self.faults.check(CustomerOp::Transition)?;
        self.inner.transition(actor, customer, status, reason).await
    }
}

/// An audit sink whose store is always down.
#[derive(Debug, Default)]
pub struct FailingAuditSink {
    attempts: AtomicUsize,
}

impl FailingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditSink for FailingAuditSink {
    async fn record(&self, _entry: AuditEntry) -> FiberResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(FiberError::unreachable("audit", "audit store unavailable"))
    }
}
