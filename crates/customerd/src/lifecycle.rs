//! Customer lifecycle rules.
//!
//! ```text
//! PENDING ──(assignment + drop line)──> ACTIVE ──> INACTIVE ──> deleted
//! ```
//!
//! A port is assigned while the customer is PENDING; activation is a
//! separate, explicit transition. Moving to the current status is a no-op.
//! Every other move fails with `InvalidStateTransition`.

use fibernet_common::{FiberError, FiberResult};
use fibernet_types::{Customer, CustomerStatus, PortAssignment};

/// Effect of a legal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Target equals the current status.
    Unchanged,
    /// PENDING -> ACTIVE.
    Activate,
    /// ACTIVE -> INACTIVE: release the port, clear the assignment and
    /// disconnect the drop line.
    Deactivate,
}

/// Decides whether `customer` may move to `to`.
pub fn plan(customer: &Customer, has_line: bool, to: CustomerStatus) -> FiberResult<Transition> {
    use CustomerStatus::*;

    let deny = |reason: &str| {
        Err(FiberError::invalid_transition(
            customer.id,
            customer.status,
            to,
            reason,
        ))
    };

    match (customer.status, to) {
        (from, to) if from == to => Ok(Transition::Unchanged),
        (Pending, Active) if customer.assignment.is_none() => {
            deny("no splitter port is assigned")
        }
        (Pending, Active) if !has_line => deny("no fiber drop line exists"),
        (Pending, Active) => Ok(Transition::Activate),
        (Active, Inactive) => Ok(Transition::Deactivate),
        _ => deny("transition not allowed"),
    }
}

/// A new port may only be assigned to an unassigned PENDING customer.
pub fn check_assignable(customer: &Customer) -> FiberResult<()> {
    if let Some(current) = &customer.assignment {
        return Err(FiberError::AlreadyAssigned {
            customer: customer.id.to_string(),
            splitter: current.splitter_serial_number.clone(),
            port: current.port,
        });
    }
    if customer.status != CustomerStatus::Pending {
        return Err(FiberError::invalid_transition(
            customer.id,
            customer.status,
            "ASSIGNED",
            format!("a {} customer cannot be assigned a port", customer.status),
        ));
    }
    Ok(())
}

/// Returns the assignment a reassignment would move.
pub fn check_movable(customer: &Customer) -> FiberResult<&PortAssignment> {
    customer.assignment.as_ref().ok_or_else(|| {
        FiberError::invalid_transition(
            customer.id,
            customer.status,
            "REASSIGNED",
            "customer has no port assignment to move",
        )
    })
}

/// Only INACTIVE customers can be deleted.
pub fn check_deletable(customer: &Customer) -> FiberResult<()> {
    if customer.status != CustomerStatus::Inactive {
        return Err(FiberError::in_use(
            "Customer",
            customer.id,
            format!("status is {}; only INACTIVE customers can be deleted", customer.status),
        ));
    }
    Ok(())
}
