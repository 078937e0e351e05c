//! Customer and fiber drop line tables.
//!
//! Every mutating method re-checks its lifecycle precondition under the
//! write lock, so concurrent requests on the same customer serialise here
//! even though the coordinator's remote calls do not.

use crate::lifecycle::{self, Transition};
use chrono::Utc;
use fibernet_common::{FiberError, FiberResult, IdSequence, Table};
use fibernet_types::{
    Customer, CustomerId, CustomerProfile, CustomerSearch, CustomerStatus, FiberDropLine,
    FiberLineId, FiberStatus, NodeId, PortAssignment, ProfileUpdate, ReservationId,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreState {
    customers: Table<CustomerId, Customer>,
    lines: Table<FiberLineId, FiberDropLine>,
    line_by_customer: HashMap<CustomerId, FiberLineId>,
}

impl StoreState {
    fn customer(&self, id: CustomerId) -> FiberResult<&Customer> {
        self.customers
            .get(&id)
            .ok_or_else(|| FiberError::not_found("Customer", id))
    }

    fn customer_mut(&mut self, id: CustomerId) -> FiberResult<&mut Customer> {
        self.customers
            .get_mut(&id)
            .ok_or_else(|| FiberError::not_found("Customer", id))
    }

    fn line_of(&self, id: CustomerId) -> Option<&FiberDropLine> {
        self.line_by_customer
            .get(&id)
            .and_then(|line| self.lines.get(line))
    }

    fn set_line_status(&mut self, id: CustomerId, status: FiberStatus) {
        if let Some(line) = self
            .line_by_customer
            .get(&id)
            .and_then(|line| self.lines.get_mut(line))
        {
            line.status = status;
        }
    }
}

/// In-memory customer store.
#[derive(Debug, Default)]
pub struct CustomerStore {
    state: RwLock<StoreState>,
    customer_ids: IdSequence,
    line_ids: IdSequence,
}

impl CustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a PENDING customer.
    pub fn create(&self, profile: CustomerProfile) -> FiberResult<Customer> {
        validate_profile(&profile)?;
        let customer = Customer {
            id: CustomerId(self.customer_ids.next_id()),
            profile,
            status: CustomerStatus::Pending,
            assignment: None,
            created_at: Utc::now(),
        };
        self.state
            .write()
            .customers
            .insert(customer.id, customer.clone());
        Ok(customer)
    }

    pub fn get(&self, id: CustomerId) -> FiberResult<Customer> {
        self.state.read().customer(id).cloned()
    }

    pub fn update_profile(&self, id: CustomerId, update: ProfileUpdate) -> FiberResult<Customer> {
        let mut state = self.state.write();
        let customer = state.customer_mut(id)?;
        let mut profile = customer.profile.clone();
        update.apply(&mut profile);
        validate_profile(&profile)?;
        customer.profile = profile;
        Ok(customer.clone())
    }

    /// Customers matching every criterion that is set, ordered by id.
    pub fn search(&self, search: &CustomerSearch) -> Vec<Customer> {
        let state = self.state.read();
        let mut found: Vec<Customer> = state
            .customers
            .values()
            .filter(|c| search.matches(c))
            .cloned()
            .collect();
        found.sort_by_key(|c| c.id);
        found
    }

    /// ACTIVE customers assigned to `splitter`, ordered by port.
    pub fn active_on_splitter(&self, splitter: NodeId) -> Vec<Customer> {
        let state = self.state.read();
        let mut found: Vec<Customer> = state
            .customers
            .values()
            .filter(|c| c.status == CustomerStatus::Active && c.splitter_id() == Some(splitter))
            .cloned()
            .collect();
        found.sort_by_key(|c| c.assigned_port());
        found
    }

    /// Deletes an INACTIVE customer together with its drop line.
    pub fn delete(&self, id: CustomerId) -> FiberResult<Customer> {
        let mut state = self.state.write();
        lifecycle::check_deletable(state.customer(id)?)?;
        if let Some(line) = state.line_by_customer.remove(&id) {
            state.lines.remove(&line);
        }
        state
            .customers
            .remove(&id)
            .ok_or_else(|| FiberError::not_found("Customer", id))
    }

    pub fn line_for(&self, id: CustomerId) -> Option<FiberDropLine> {
        self.state.read().line_of(id).cloned()
    }

    /// All drop lines, ordered by id.
    pub fn lines(&self) -> Vec<FiberDropLine> {
        let state = self.state.read();
        let mut lines: Vec<FiberDropLine> = state.lines.values().cloned().collect();
        lines.sort_by_key(|l| l.id);
        lines
    }

    pub fn lines_by_splitter(&self, splitter: NodeId) -> Vec<FiberDropLine> {
        let mut lines = self.lines();
        lines.retain(|l| l.from_splitter_id == splitter);
        lines
    }

    /// Records a first assignment and creates or refreshes the drop line.
    pub fn attach(
        &self,
        id: CustomerId,
        assignment: PortAssignment,
        length_meters: f64,
    ) -> FiberResult<Customer> {
        let mut state = self.state.write();
        lifecycle::check_assignable(state.customer(id)?)?;
        let splitter = assignment.splitter_id;
        let customer = state.customer_mut(id)?;
        customer.assignment = Some(assignment);
        let customer = customer.clone();
        self.upsert_line(&mut state, id, splitter, length_meters);
        Ok(customer)
    }

    /// Replaces the assignment held under `expected`.
    ///
    /// Fails with a conflict if the customer's live reservation changed
    /// since the caller read it.
    pub fn move_to(
        &self,
        id: CustomerId,
        expected: ReservationId,
        assignment: PortAssignment,
        length_meters: f64,
    ) -> FiberResult<Customer> {
        let mut state = self.state.write();
        let customer = state.customer_mut(id)?;
        check_expected(customer, expected)?;
        let splitter = assignment.splitter_id;
        customer.assignment = Some(assignment);
        let customer = customer.clone();
        self.upsert_line(&mut state, id, splitter, length_meters);
        Ok(customer)
    }

    /// Clears the assignment held under `expected` and disconnects the
    /// drop line. Status is left unchanged.
    pub fn detach(&self, id: CustomerId, expected: ReservationId) -> FiberResult<Customer> {
        let mut state = self.state.write();
        let customer = state.customer_mut(id)?;
        check_expected(customer, expected)?;
        customer.assignment = None;
        let customer = customer.clone();
        state.set_line_status(id, FiberStatus::Disconnected);
        Ok(customer)
    }

    /// Applies a lifecycle transition.
    ///
    /// Returns the updated customer and, for a deactivation, the assignment
    /// that was cleared so the caller can release its port.
    pub fn transition(
        &self,
        id: CustomerId,
        to: CustomerStatus,
    ) -> FiberResult<(Customer, Transition, Option<PortAssignment>)> {
        let mut state = self.state.write();
        let has_line = state.line_of(id).is_some();
        let plan = lifecycle::plan(state.customer(id)?, has_line, to)?;

        let customer = state.customer_mut(id)?;
        let released = match plan {
            Transition::Unchanged => None,
            Transition::Activate => {
                customer.status = CustomerStatus::Active;
                None
            }
            Transition::Deactivate => {
                customer.status = CustomerStatus::Inactive;
                customer.assignment.take()
            }
        };
        let customer = customer.clone();
        match plan {
            Transition::Activate => state.set_line_status(id, FiberStatus::Active),
            Transition::Deactivate => state.set_line_status(id, FiberStatus::Disconnected),
            Transition::Unchanged => {}
        }
        Ok((customer, plan, released))
    }

    fn upsert_line(&self, state: &mut StoreState, id: CustomerId, splitter: NodeId, length_meters: f64) {
        match state.line_by_customer.get(&id).copied() {
            Some(line_id) => {
                if let Some(line) = state.lines.get_mut(&line_id) {
                    line.from_splitter_id = splitter;
                    line.length_meters = length_meters;
                    line.status = FiberStatus::Active;
                }
            }
            None => {
                let line = FiberDropLine {
                    id: FiberLineId(self.line_ids.next_id()),
                    customer_id: id,
                    from_splitter_id: splitter,
                    length_meters,
                    status: FiberStatus::Active,
                };
                debug!(customer_id = %id, line_id = %line.id, "Drop line created");
                state.line_by_customer.insert(id, line.id);
                state.lines.insert(line.id, line);
            }
        }
    }
}

fn check_expected(customer: &Customer, expected: ReservationId) -> FiberResult<()> {
    match &customer.assignment {
        Some(current) if current.reservation_id == expected => Ok(()),
        _ => Err(FiberError::conflict(format!(
            "customer {} assignment changed concurrently",
            customer.id
        ))),
    }
}

fn validate_profile(profile: &CustomerProfile) -> FiberResult<()> {
    if profile.name.trim().is_empty() {
        return Err(FiberError::validation("name", "must not be empty"));
    }
    if profile.address.trim().is_empty() {
        return Err(FiberError::validation("address", "must not be empty"));
    }
    Ok(())
}
