//! Allocation Coordinator.
//!
//! Assigns, reassigns and releases splitter ports across the Resource Ledger
//! (remote) and the customer store (local). There is no shared transaction:
//!
//! 1. preconditions are checked from the customer store and the ledger's
//!    read model before any mutation
//! 2. the ledger reservation is the single point of mutual exclusion on a
//!    `(splitter, port)` pair
//! 3. a failed local write after a successful reservation is compensated by
//!    releasing the same reservation id
//!
//! Every outcome, success or failure, is written to the audit sink.

use crate::lifecycle;
use crate::store::CustomerStore;
use fibernet_common::{
    AuditAction, AuditEntry, AuditSink, FiberError, FiberResult, LedgerApi,
};
use fibernet_types::{
    AssignPortRequest, Customer, CustomerId, CustomerStatus, HierarchyNode, PortAssignment,
    ReservationId, ReservePortRequest,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Outcome of a reassignment that succeeded.
struct Moved {
    customer: Customer,
    from: PortAssignment,
    /// Set when the old port could not be released.
    leaked: Option<FiberError>,
}

/// Coordinates port allocation between the ledger and the customer store.
pub struct AllocationCoordinator {
    store: Arc<CustomerStore>,
    ledger: Arc<dyn LedgerApi>,
    audit: Arc<dyn AuditSink>,
}

impl AllocationCoordinator {
    pub fn new(
        store: Arc<CustomerStore>,
        ledger: Arc<dyn LedgerApi>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            ledger,
            audit,
        }
    }

    /// Assigns a splitter port to a PENDING customer.
    #[instrument(skip(self, request), fields(
        customer_id = %customer,
        splitter = %request.splitter_serial_number,
        port = request.port_number,
    ))]
    pub async fn assign(
        &self,
        actor: &str,
        customer: CustomerId,
        request: &AssignPortRequest,
    ) -> FiberResult<Customer> {
        match self.try_assign(actor, customer, request).await {
            Ok(updated) => {
                info!("Port assigned");
                self.audit
                    .emit(AuditEntry::new(
                        actor,
                        AuditAction::PortAssigned,
                        format!(
                            "Customer {} assigned to splitter '{}' port {} ({} m drop)",
                            customer,
                            request.splitter_serial_number,
                            request.port_number,
                            request.length_meters
                        ),
                    ))
                    .await;
                Ok(updated)
            }
            Err(e) => {
                warn!(error = %e, "Port assignment failed");
                self.audit
                    .emit(
                        AuditEntry::new(
                            actor,
                            AuditAction::PortAssignmentFailed,
                            format!(
                                "Failed to assign customer {} to splitter '{}' port {}",
                                customer, request.splitter_serial_number, request.port_number
                            ),
                        )
                        .with_error(&e),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn try_assign(
        &self,
        actor: &str,
        customer: CustomerId,
        request: &AssignPortRequest,
    ) -> FiberResult<Customer> {
        let current = self.store.get(customer)?;
        lifecycle::check_assignable(&current)?;
        validate_request(request)?;

        let splitter = self.resolve_splitter(&request.splitter_serial_number).await?;
        self.precheck(&splitter, request.port_number, None).await?;

        let reservation = self
            .ledger
            .reserve_port(
                actor,
                splitter.id,
                &ReservePortRequest {
                    reservation_id: ReservationId::new(),
                    customer_id: customer,
                    port: request.port_number,
                },
            )
            .await?;

        let assignment = PortAssignment {
            splitter_id: splitter.id,
            splitter_serial_number: splitter.serial_number.clone(),
            port: reservation.port,
            reservation_id: reservation.id,
        };
        match self.store.attach(customer, assignment, request.length_meters) {
            Ok(updated) => Ok(updated),
            Err(e) => {
                self.compensate(actor, reservation.id).await;
                Err(e)
            }
        }
    }

    /// Moves an assigned customer to another port, on the same or another
    /// splitter.
    ///
    /// The new port is reserved before the old one is released, so a failed
    /// reservation leaves the customer where it was. Releasing the old port
    /// afterwards is best-effort.
    #[instrument(skip(self, request), fields(
        customer_id = %customer,
        splitter = %request.splitter_serial_number,
        port = request.port_number,
    ))]
    pub async fn reassign(
        &self,
        actor: &str,
        customer: CustomerId,
        request: &AssignPortRequest,
    ) -> FiberResult<Customer> {
        match self.try_reassign(actor, customer, request).await {
            Ok(moved) => {
                let mut description = format!(
                    "Customer {} moved from splitter '{}' port {} to splitter '{}' port {}",
                    customer,
                    moved.from.splitter_serial_number,
                    moved.from.port,
                    request.splitter_serial_number,
                    request.port_number
                );
                if let Some(e) = &moved.leaked {
                    description.push_str(&format!("; old port not released: {}", e));
                }
                info!(leaked = moved.leaked.is_some(), "Port reassigned");
                self.audit
                    .emit(AuditEntry::new(actor, AuditAction::PortReassigned, description))
                    .await;
                Ok(moved.customer)
            }
            Err(e) => {
                warn!(error = %e, "Port reassignment failed");
                self.audit
                    .emit(
                        AuditEntry::new(
                            actor,
                            AuditAction::PortReassignmentFailed,
                            format!(
                                "Failed to move customer {} to splitter '{}' port {}",
                                customer, request.splitter_serial_number, request.port_number
                            ),
                        )
                        .with_error(&e),
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn try_reassign(
        &self,
        actor: &str,
        customer: CustomerId,
        request: &AssignPortRequest,
    ) -> FiberResult<Moved> {
        let current = self.store.get(customer)?;
        let from = lifecycle::check_movable(&current)?.clone();
        validate_request(request)?;

        let splitter = self.resolve_splitter(&request.splitter_serial_number).await?;
        if splitter.id == from.splitter_id && request.port_number == from.port {
            return Err(FiberError::validation(
                "portNumber",
                format!(
                    "customer {} already holds port {} on splitter '{}'",
                    customer, from.port, from.splitter_serial_number
                ),
            ));
        }
        self.precheck(&splitter, request.port_number, Some(&from)).await?;

        let reserve = ReservePortRequest {
            reservation_id: ReservationId::new(),
            customer_id: customer,
            port: request.port_number,
        };
        let same_splitter = splitter.id == from.splitter_id;

        let reservation = if same_splitter {
            // Free the old port first so a full splitter can still swap.
            self.ledger.release_port(actor, from.reservation_id).await?;
            match self.ledger.reserve_port(actor, splitter.id, &reserve).await {
                Ok(reservation) => reservation,
                Err(e) => {
                    self.restore(actor, customer, &from).await;
                    return Err(e);
                }
            }
        } else {
            self.ledger.reserve_port(actor, splitter.id, &reserve).await?
        };

        let assignment = PortAssignment {
            splitter_id: splitter.id,
            splitter_serial_number: splitter.serial_number.clone(),
            port: reservation.port,
            reservation_id: reservation.id,
        };
        let updated = match self.store.move_to(
            customer,
            from.reservation_id,
            assignment,
            request.length_meters,
        ) {
            Ok(updated) => updated,
            Err(e) => {
                self.compensate(actor, reservation.id).await;
                if same_splitter {
                    self.restore(actor, customer, &from).await;
                }
                return Err(e);
            }
        };

        let leaked = if same_splitter {
            None
        } else {
            match self.ledger.release_port(actor, from.reservation_id).await {
                Ok(true) => None,
                Ok(false) => {
                    warn!(reservation_id = %from.reservation_id, "Old reservation was already released");
                    None
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        splitter_id = %from.splitter_id,
                        port = from.port,
                        "Failed to release old port; its splitter count stays incremented"
                    );
                    Some(e)
                }
            }
        };

        Ok(Moved {
            customer: updated,
            from,
            leaked,
        })
    }

    /// Releases the port of a PENDING customer.
    ///
    /// A customer without an assignment is returned unchanged, so repeated
    /// calls never decrement a splitter twice. ACTIVE customers keep their
    /// port until they are deactivated.
    #[instrument(skip(self), fields(customer_id = %customer))]
    pub async fn release(&self, actor: &str, customer: CustomerId) -> FiberResult<Customer> {
        let current = match self.store.get(customer) {
            Ok(current) => current,
            Err(e) => return self.release_failed(actor, customer, e).await,
        };
        let Some(held) = current.assignment.clone() else {
            debug!("Customer holds no port; nothing to release");
            return Ok(current);
        };
        if current.status == CustomerStatus::Active {
            let e = FiberError::invalid_transition(
                customer,
                current.status,
                "RELEASED",
                "an ACTIVE customer keeps its port; deactivate the customer instead",
            );
            return self.release_failed(actor, customer, e).await;
        }

        match self.release_held(actor, customer, &held).await {
            Ok(updated) => {
                info!("Port released");
                self.audit
                    .emit(AuditEntry::new(
                        actor,
                        AuditAction::PortReleased,
                        format!(
                            "Customer {} released splitter '{}' port {}",
                            customer, held.splitter_serial_number, held.port
                        ),
                    ))
                    .await;
                Ok(updated)
            }
            Err(e) => self.release_failed(actor, customer, e).await,
        }
    }

    async fn release_held(
        &self,
        actor: &str,
        customer: CustomerId,
        held: &PortAssignment,
    ) -> FiberResult<Customer> {
        self.ledger.release_port(actor, held.reservation_id).await?;
        self.store.detach(customer, held.reservation_id)
    }

    async fn release_failed(
        &self,
        actor: &str,
        customer: CustomerId,
        error: FiberError,
    ) -> FiberResult<Customer> {
        warn!(error = %error, "Port release failed");
        self.audit
            .emit(
                AuditEntry::new(
                    actor,
                    AuditAction::PortReleaseFailed,
                    format!("Failed to release the port of customer {}", customer),
                )
                .with_error(&error),
            )
            .await;
        Err(error)
    }

    async fn resolve_splitter(&self, serial: &str) -> FiberResult<HierarchyNode> {
        let node = self.ledger.get_node_by_serial(serial).await?;
        if !node.is_splitter() {
            return Err(FiberError::validation(
                "splitterSerialNumber",
                format!("'{}' is a {}, not a splitter", serial, node.level),
            ));
        }
        Ok(node)
    }

    /// Checks port range, capacity and occupancy from the ledger's read
    /// model, in the same order the ledger applies them.
    ///
    /// `moving` is the caller's current assignment; moving within one
    /// splitter does not change its usage.
    async fn precheck(
        &self,
        splitter: &HierarchyNode,
        port: u32,
        moving: Option<&PortAssignment>,
    ) -> FiberResult<()> {
        let ports = splitter.ports.ok_or_else(|| {
            FiberError::internal(format!("splitter {} carries no port counters", splitter.id))
        })?;
        if !ports.is_valid_port(port) {
            return Err(FiberError::validation(
                "portNumber",
                format!(
                    "port {} is outside 1..={} on splitter '{}'",
                    port, ports.port_capacity, splitter.serial_number
                ),
            ));
        }

        let same_splitter = moving.is_some_and(|m| m.splitter_id == splitter.id);
        if !same_splitter && !ports.has_free_port() {
            return Err(FiberError::CapacityExceeded {
                splitter: splitter.serial_number.clone(),
                capacity: ports.port_capacity,
            });
        }

        let taken = self
            .ledger
            .list_reservations(splitter.id)
            .await?
            .into_iter()
            .any(|r| r.port == port && moving.map_or(true, |m| m.reservation_id != r.id));
        if taken {
            return Err(FiberError::PortConflict {
                splitter: splitter.serial_number.clone(),
                port,
            });
        }
        Ok(())
    }

    /// Releases a reservation whose local write failed.
    async fn compensate(&self, actor: &str, reservation: ReservationId) {
        match self.ledger.release_port(actor, reservation).await {
            Ok(_) => warn!(reservation_id = %reservation, "Reservation rolled back"),
            Err(e) => error!(
                reservation_id = %reservation,
                error = %e,
                "Failed to roll back reservation; splitter count stays incremented"
            ),
        }
    }

    /// Re-reserves a released port under its original reservation id.
    async fn restore(&self, actor: &str, customer: CustomerId, held: &PortAssignment) {
        let request = ReservePortRequest {
            reservation_id: held.reservation_id,
            customer_id: customer,
            port: held.port,
        };
        if let Err(e) = self.ledger.reserve_port(actor, held.splitter_id, &request).await {
            error!(
                error = %e,
                splitter_id = %held.splitter_id,
                port = held.port,
                "Failed to restore the customer's previous port"
            );
        }
    }
}

fn validate_request(request: &AssignPortRequest) -> FiberResult<()> {
    if request.splitter_serial_number.trim().is_empty() {
        return Err(FiberError::validation(
            "splitterSerialNumber",
            "must not be empty",
        ));
    }
    if !request.length_meters.is_finite() || request.length_meters <= 0.0 {
        return Err(FiberError::validation(
            "lengthMeters",
            format!("{} is not a positive length", request.length_meters),
        ));
    }
    Ok(())
}
