//! Customer State Machine service.
//!
//! Owns the customer store and applies lifecycle transitions. Port
//! allocation is delegated to the [`AllocationCoordinator`]; asset data is
//! read from the Resource Ledger on demand.

use crate::allocation::AllocationCoordinator;
use crate::lifecycle::Transition;
use crate::store::CustomerStore;
use async_trait::async_trait;
use fibernet_common::{
    AuditAction, AuditEntry, AuditSink, CustomerApi, FiberResult, LedgerApi,
};
use fibernet_types::{
    Asset, Customer, CustomerAssignment, CustomerId, CustomerProfile, CustomerSearch,
    CustomerStatus, FiberDropLine, NodeId, PortAssignment, ProfileUpdate,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A customer with its drop line and customer-premises equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    #[serde(flatten)]
    pub customer: Customer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber_line: Option<FiberDropLine>,
    #[serde(default)]
    pub assigned_assets: Vec<Asset>,
}

pub struct CustomerService {
    store: Arc<CustomerStore>,
    ledger: Arc<dyn LedgerApi>,
    audit: Arc<dyn AuditSink>,
    allocation: AllocationCoordinator,
}

impl CustomerService {
    pub fn new(ledger: Arc<dyn LedgerApi>, audit: Arc<dyn AuditSink>) -> Self {
        Self::with_store(Arc::new(CustomerStore::new()), ledger, audit)
    }

    pub fn with_store(
        store: Arc<CustomerStore>,
        ledger: Arc<dyn LedgerApi>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let allocation = AllocationCoordinator::new(store.clone(), ledger.clone(), audit.clone());
        Self {
            store,
            ledger,
            audit,
            allocation,
        }
    }

    pub fn allocation(&self) -> &AllocationCoordinator {
        &self.allocation
    }

    pub fn store(&self) -> &CustomerStore {
        &self.store
    }

    pub fn create(&self, actor: &str, profile: CustomerProfile) -> FiberResult<Customer> {
        let customer = self.store.create(profile)?;
        info!(actor, customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    pub async fn details(&self, id: CustomerId) -> FiberResult<CustomerDetails> {
        let customer = self.store.get(id)?;
        let assigned_assets = self.ledger.assets_for_customer(id).await?;
        Ok(CustomerDetails {
            fiber_line: self.store.line_for(id),
            customer,
            assigned_assets,
        })
    }

    pub fn update_profile(
        &self,
        actor: &str,
        id: CustomerId,
        update: ProfileUpdate,
    ) -> FiberResult<Customer> {
        let customer = self.store.update_profile(id, update)?;
        info!(actor, customer_id = %id, "Customer profile updated");
        Ok(customer)
    }

    pub fn search(&self, search: &CustomerSearch) -> Vec<Customer> {
        self.store.search(search)
    }

    /// Deletes an INACTIVE customer and its drop line.
    pub fn delete(&self, actor: &str, id: CustomerId) -> FiberResult<()> {
        self.store.delete(id)?;
        info!(actor, customer_id = %id, "Customer deleted");
        Ok(())
    }

    /// Assigns a customer-premises device to an existing customer.
    pub async fn assign_asset(
        &self,
        actor: &str,
        id: CustomerId,
        serial: &str,
    ) -> FiberResult<Asset> {
        self.store.get(id)?;
        self.ledger.assign_asset(actor, serial, id).await
    }

    pub fn lines(&self) -> Vec<FiberDropLine> {
        self.store.lines()
    }

    pub fn lines_by_splitter(&self, splitter: NodeId) -> Vec<FiberDropLine> {
        self.store.lines_by_splitter(splitter)
    }

    async fn assignment_view(&self, customer: Customer) -> FiberResult<CustomerAssignment> {
        let assigned_assets = self.ledger.assets_for_customer(customer.id).await?;
        Ok(CustomerAssignment {
            customer_id: customer.id,
            splitter_id: customer.splitter_id(),
            assigned_port: customer.assigned_port(),
            name: customer.profile.name,
            status: customer.status,
            assigned_assets,
        })
    }

    /// Moves a customer through its lifecycle.
    ///
    /// Deactivation releases the customer's port after the local write. A
    /// failed release leaves the ledger reservation live; the status change
    /// audit entry names it so an operator can release it by id.
    #[instrument(skip(self, reason), fields(customer_id = %id, to = %to))]
    pub async fn change_status(
        &self,
        actor: &str,
        id: CustomerId,
        to: CustomerStatus,
        reason: Option<&str>,
    ) -> FiberResult<Customer> {
        let (customer, plan, released) = match self.store.transition(id, to) {
            Ok(applied) => applied,
            Err(e) => {
                warn!(error = %e, "Status change rejected");
                self.audit
                    .emit(
                        AuditEntry::new(
                            actor,
                            AuditAction::CustomerStatusChangeFailed,
                            with_reason(format!("Failed to move customer {} to {}", id, to), reason),
                        )
                        .with_error(&e),
                    )
                    .await;
                return Err(e);
            }
        };

        let leaked = match released {
            Some(held) => self.release_after_deactivation(actor, id, &held).await,
            None => None,
        };

        let from = match plan {
            Transition::Unchanged => return Ok(customer),
            Transition::Activate => CustomerStatus::Pending,
            Transition::Deactivate => CustomerStatus::Active,
        };
        info!(%from, leaked = leaked.is_some(), "Customer status changed");
        let mut description =
            with_reason(format!("Customer {} moved from {} to {}", id, from, to), reason);
        if let Some(leak) = leaked {
            description.push_str(&format!("; port not released: {}", leak));
        }
        self.audit
            .emit(AuditEntry::new(
                actor,
                AuditAction::CustomerStatusChanged,
                description,
            ))
            .await;
        Ok(customer)
    }

    /// Releases the port held before deactivation. Returns a description of
    /// the reservation left live when the release fails.
    async fn release_after_deactivation(
        &self,
        actor: &str,
        id: CustomerId,
        held: &PortAssignment,
    ) -> Option<String> {
        match self.ledger.release_port(actor, held.reservation_id).await {
            Ok(true) => {
                info!(
                    customer_id = %id,
                    splitter = %held.splitter_serial_number,
                    port = held.port,
                    "Port released on deactivation"
                );
                None
            }
            Ok(false) => {
                warn!(
                    customer_id = %id,
                    reservation_id = %held.reservation_id,
                    "No live reservation to release on deactivation"
                );
                None
            }
            Err(e) => {
                warn!(
                    customer_id = %id,
                    error = %e,
                    reservation_id = %held.reservation_id,
                    splitter = %held.splitter_serial_number,
                    port = held.port,
                    "Port release failed on deactivation; reservation left live"
                );
                Some(format!(
                    "reservation {} on splitter '{}' port {} ({})",
                    held.reservation_id, held.splitter_serial_number, held.port, e
                ))
            }
        }
    }
}

fn with_reason(description: String, reason: Option<&str>) -> String {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{} ({})", description, reason),
        None => description,
    }
}

#[async_trait]
impl CustomerApi for CustomerService {
    async fn get_assignment(&self, customer: CustomerId) -> FiberResult<CustomerAssignment> {
        let customer = self.store.get(customer)?;
        self.assignment_view(customer).await
    }

    async fn customers_by_splitter(
        &self,
        splitter: NodeId,
    ) -> FiberResult<Vec<CustomerAssignment>> {
        let mut views = Vec::new();
        for customer in self.store.active_on_splitter(splitter) {
            views.push(self.assignment_view(customer).await?);
        }
        Ok(views)
    }

    async fn transition(
        &self,
        actor: &str,
        customer: CustomerId,
        status: CustomerStatus,
        reason: Option<&str>,
    ) -> FiberResult<Customer> {
        self.change_status(actor, customer, status, reason).await
    }
}
