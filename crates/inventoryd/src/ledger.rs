//! The Resource Ledger.
//!
//! Owns assets, the four-level hierarchy and splitter port occupancy. All
//! state sits behind one lock so that every mutation, in particular
//! reserve-or-fail on a splitter port, is atomic with respect to concurrent
//! requests.
//!
//! Occupied ports are an explicit set keyed by `(splitter, port)`. The
//! `usedPorts` counter moves together with that set on reserve and release;
//! `set_used_ports` remains an administrative override that may never drop
//! below the number of live reservations.

use async_trait::async_trait;
use chrono::Utc;
use fibernet_common::{
    CapacityCounter, FiberError, FiberResult, IdSequence, LedgerApi, Table,
};
use fibernet_types::{
    Asset, AssetChange, AssetFilter, AssetHistoryEntry, AssetId, AssetStatus, CustomerId,
    HierarchyLevel, HierarchyNode, NewAsset, NewHierarchyNode, NodeId, NodeUpdate,
    PortReservation, ReservationId, ReservePortRequest, SplitterPorts, SubtreeNode,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, instrument, warn};

/// Structural fields of a hierarchy node. Serial and model live on the asset.
#[derive(Debug, Clone)]
struct NodeRecord {
    id: NodeId,
    asset_id: AssetId,
    level: HierarchyLevel,
    name: String,
    locality: Option<String>,
    parent_id: Option<NodeId>,
}

#[derive(Debug, Default)]
struct LedgerState {
    assets: Table<AssetId, Asset>,
    serials: HashMap<String, AssetId>,
    nodes: Table<NodeId, NodeRecord>,
    node_by_asset: HashMap<AssetId, NodeId>,
    children: HashMap<NodeId, BTreeSet<NodeId>>,
    ports: Table<NodeId, SplitterPorts>,
    reservations: HashMap<ReservationId, PortReservation>,
    occupied: HashMap<NodeId, BTreeMap<u32, ReservationId>>,
    history: HashMap<AssetId, Vec<AssetHistoryEntry>>,
}

impl LedgerState {
    fn asset(&self, id: AssetId) -> FiberResult<&Asset> {
        self.assets
            .get(&id)
            .ok_or_else(|| FiberError::not_found("Asset", id))
    }

    fn asset_id_by_serial(&self, serial: &str) -> FiberResult<AssetId> {
        self.serials
            .get(serial)
            .copied()
            .ok_or_else(|| FiberError::not_found("Asset", serial))
    }

    fn record(&self, id: NodeId) -> FiberResult<&NodeRecord> {
        self.nodes
            .get(&id)
            .ok_or_else(|| FiberError::not_found("Node", id))
    }

    fn view(&self, id: NodeId) -> FiberResult<HierarchyNode> {
        let record = self.record(id)?;
        let asset = self.asset(record.asset_id)?;
        Ok(HierarchyNode {
            id: record.id,
            asset_id: record.asset_id,
            level: record.level,
            serial_number: asset.serial_number.clone(),
            model: asset.model.clone(),
            name: record.name.clone(),
            locality: record.locality.clone(),
            parent_id: record.parent_id,
            ports: self.ports.get(&id).copied(),
        })
    }

    /// Removes a childless node, its asset and its port bookkeeping.
    /// Returns the removed serial number.
    fn remove_node(&mut self, id: NodeId) -> FiberResult<String> {
        let record = self.record(id)?.clone();
        let serial = self.serial_of(record.asset_id);

        let children = self.child_ids(id).len();
        if children > 0 {
            return Err(FiberError::in_use(
                "Node",
                &serial,
                format!("{} child node(s) attached", children),
            ));
        }
        if let Some(used) = self.ports.used(&id) {
            if used > 0 {
                return Err(FiberError::in_use(
                    "Splitter",
                    &serial,
                    format!("{} port(s) in use", used),
                ));
            }
        }

        if let Some(parent) = record.parent_id {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(&id);
            }
        }
        self.children.remove(&id);
        self.ports.remove(&id);
        self.occupied.remove(&id);
        self.nodes.remove(&id);
        self.node_by_asset.remove(&record.asset_id);
        self.assets.remove(&record.asset_id);
        self.serials.remove(&serial);
        self.history.remove(&record.asset_id);
        Ok(serial)
    }

    /// Looks up a splitter and its counters.
    fn splitter(&self, id: NodeId) -> FiberResult<(&NodeRecord, SplitterPorts)> {
        let record = self
            .nodes
            .get(&id)
            .ok_or_else(|| FiberError::not_found("Splitter", id))?;
        match self.ports.get(&id) {
            Some(ports) if record.level == HierarchyLevel::Splitter => Ok((record, *ports)),
            _ => Err(FiberError::validation(
                "splitterId",
                format!("node {} is a {}, not a splitter", id, record.level),
            )),
        }
    }

    fn serial_of(&self, asset_id: AssetId) -> String {
        self.assets
            .get(&asset_id)
            .map(|a| a.serial_number.clone())
            .unwrap_or_else(|| asset_id.to_string())
    }

    fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.children
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn live_reservations(&self, splitter: NodeId) -> usize {
        self.occupied.get(&splitter).map_or(0, BTreeMap::len)
    }

    fn highest_occupied_port(&self, splitter: NodeId) -> Option<u32> {
        self.occupied
            .get(&splitter)
            .and_then(|ports| ports.keys().next_back().copied())
    }

    fn subtree(&self, id: NodeId) -> FiberResult<SubtreeNode> {
        let node = self.view(id)?;
        let children = self
            .child_ids(id)
            .into_iter()
            .map(|child| self.subtree(child))
            .collect::<FiberResult<Vec<_>>>()?;
        Ok(SubtreeNode { node, children })
    }

    fn log_change(&mut self, asset_id: AssetId, change: AssetChange, actor: &str, description: String) {
        self.history
            .entry(asset_id)
            .or_default()
            .push(AssetHistoryEntry {
                asset_id,
                change_type: change,
                description,
                changed_by: actor.to_string(),
                timestamp: Utc::now(),
            });
    }
}

/// In-memory Resource Ledger.
#[derive(Debug)]
pub struct ResourceLedger {
    state: RwLock<LedgerState>,
    asset_ids: IdSequence,
    node_ids: IdSequence,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            asset_ids: IdSequence::new(),
            node_ids: IdSequence::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Assets
    // ---------------------------------------------------------------------

    /// Registers a non-infrastructure asset (ONT, router, fiber roll).
    ///
    /// Infrastructure assets are created together with their hierarchy node
    /// by [`create_node`](Self::create_node).
    #[instrument(skip(self, request), fields(serial = %request.serial_number))]
    pub fn create_asset(&self, actor: &str, request: NewAsset) -> FiberResult<Asset> {
        if request.asset_type.is_infrastructure() {
            return Err(FiberError::validation(
                "assetType",
                format!(
                    "{} assets are created through the hierarchy node endpoints",
                    request.asset_type
                ),
            ));
        }
        let serial = request.serial_number.trim().to_string();
        if serial.is_empty() {
            return Err(FiberError::validation("serialNumber", "must not be empty"));
        }
        let status = request.status.unwrap_or_default();
        if status == AssetStatus::Assigned {
            return Err(FiberError::validation(
                "status",
                "assets become ASSIGNED only through customer assignment",
            ));
        }

        let mut state = self.state.write();
        if state.serials.contains_key(&serial) {
            return Err(FiberError::DuplicateSerial { serial });
        }

        let asset = Asset {
            id: AssetId(self.asset_ids.next_id()),
            asset_type: request.asset_type,
            serial_number: serial.clone(),
            model: request.model,
            location: request.location,
            status,
            assigned_to_customer_id: None,
            created_at: Utc::now(),
        };
        state.serials.insert(serial, asset.id);
        state.assets.insert(asset.id, asset.clone());
        state.log_change(
            asset.id,
            AssetChange::AssetCreated,
            actor,
            format!("Created {} asset", asset.asset_type),
        );

        info!(asset_id = %asset.id, asset_type = %asset.asset_type, "Asset created");
        Ok(asset)
    }

    pub fn get_asset(&self, id: AssetId) -> FiberResult<Asset> {
        self.state.read().asset(id).cloned()
    }

    pub fn get_asset_by_serial(&self, serial: &str) -> FiberResult<Asset> {
        let state = self.state.read();
        let id = state.asset_id_by_serial(serial)?;
        state.asset(id).cloned()
    }

    /// Assets matching every filter that is set, ordered by id.
    pub fn filter_assets(&self, filter: &AssetFilter) -> Vec<Asset> {
        let state = self.state.read();
        let mut assets: Vec<Asset> = state
            .assets
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        assets.sort_by_key(|a| a.id);
        assets
    }

    /// Assets whose owner is `customer`, ordered by id.
    pub fn assets_for_customer(&self, customer: CustomerId) -> Vec<Asset> {
        let state = self.state.read();
        let mut assets: Vec<Asset> = state
            .assets
            .values()
            .filter(|a| a.assigned_to_customer_id == Some(customer))
            .cloned()
            .collect();
        assets.sort_by_key(|a| a.id);
        assets
    }

    /// Changes the operational status of an unowned asset.
    #[instrument(skip(self))]
    pub fn update_asset_status(
        &self,
        actor: &str,
        id: AssetId,
        status: AssetStatus,
    ) -> FiberResult<Asset> {
        if status == AssetStatus::Assigned {
            return Err(FiberError::validation(
                "status",
                "assets become ASSIGNED only through customer assignment",
            ));
        }

        let mut state = self.state.write();
        let asset = state.asset(id)?;
        if asset.status == status {
            return Ok(asset.clone());
        }
        if let Some(owner) = asset.assigned_to_customer_id {
            return Err(FiberError::in_use(
                "Asset",
                &asset.serial_number,
                format!("assigned to customer {}; reclaim it first", owner),
            ));
        }

        let old = asset.status;
        let asset = state
            .assets
            .get_mut(&id)
            .ok_or_else(|| FiberError::not_found("Asset", id))?;
        asset.status = status;
        let updated = asset.clone();
        state.log_change(
            id,
            AssetChange::StatusUpdate,
            actor,
            format!("Status changed from {} to {}", old, status),
        );
        Ok(updated)
    }

    /// Deletes an asset. Node-backed assets delete their node.
    #[instrument(skip(self))]
    pub fn delete_asset(&self, actor: &str, id: AssetId) -> FiberResult<()> {
        let mut state = self.state.write();
        let asset = state.asset(id)?;
        if asset.status == AssetStatus::Assigned {
            return Err(FiberError::in_use(
                "Asset",
                &asset.serial_number,
                "asset is ASSIGNED",
            ));
        }
        if let Some(node) = state.node_by_asset.get(&id).copied() {
            let serial = state.remove_node(node)?;
            info!(node_id = %node, %serial, actor, "Hierarchy node deleted");
            return Ok(());
        }

        let asset = state
            .assets
            .remove(&id)
            .ok_or_else(|| FiberError::not_found("Asset", id))?;
        state.serials.remove(&asset.serial_number);
        state.history.remove(&id);
        info!(asset_id = %id, actor, "Asset deleted");
        Ok(())
    }

    /// Assigns the asset with `serial` to `customer`, overwriting any prior
    /// owner, and marks it ASSIGNED.
    #[instrument(skip(self))]
    pub fn assign_asset(&self, actor: &str, serial: &str, customer: CustomerId) -> FiberResult<Asset> {
        let mut state = self.state.write();
        let id = state.asset_id_by_serial(serial)?;
        let asset = state
            .assets
            .get_mut(&id)
            .ok_or_else(|| FiberError::not_found("Asset", serial))?;
        if asset.asset_type.is_infrastructure() {
            return Err(FiberError::validation(
                "serialNumber",
                format!("{} assets cannot be assigned to customers", asset.asset_type),
            ));
        }

        let description = match asset.assigned_to_customer_id {
            Some(previous) if previous != customer => {
                format!("Reassigned from customer {} to customer {}", previous, customer)
            }
            _ => format!("Assigned to customer {}", customer),
        };
        asset.assigned_to_customer_id = Some(customer);
        asset.status = AssetStatus::Assigned;
        let updated = asset.clone();
        state.log_change(id, AssetChange::AssetAssigned, actor, description);

        info!(serial, customer_id = %customer, "Asset assigned");
        Ok(updated)
    }

    /// Frees every asset owned by `customer` and sets it to `status`.
    #[instrument(skip(self))]
    pub fn unassign_assets(
        &self,
        actor: &str,
        customer: CustomerId,
        status: AssetStatus,
    ) -> FiberResult<Vec<Asset>> {
        if status == AssetStatus::Assigned {
            return Err(FiberError::validation(
                "status",
                "reclaimed assets cannot stay ASSIGNED",
            ));
        }

        let mut state = self.state.write();
        let mut freed = Vec::new();
        for asset in state.assets.values_mut() {
            if asset.assigned_to_customer_id == Some(customer) {
                asset.assigned_to_customer_id = None;
                asset.status = status;
                freed.push(asset.clone());
            }
        }
        freed.sort_by_key(|a| a.id);
        for asset in &freed {
            state.log_change(
                asset.id,
                AssetChange::AssetUnassigned,
                actor,
                format!("Unassigned from customer {}, status {}", customer, status),
            );
        }

        info!(customer_id = %customer, count = freed.len(), "Customer assets reclaimed");
        Ok(freed)
    }

    /// Change history of an asset, newest first.
    pub fn asset_history(&self, id: AssetId) -> FiberResult<Vec<AssetHistoryEntry>> {
        let state = self.state.read();
        state.asset(id)?;
        let mut entries = state.history.get(&id).cloned().unwrap_or_default();
        entries.reverse();
        Ok(entries)
    }

    // ---------------------------------------------------------------------
    // Hierarchy
    // ---------------------------------------------------------------------

    /// Creates a hierarchy node together with the asset it wraps.
    #[instrument(skip(self, request), fields(level = %request.level, name = %request.name))]
    pub fn create_node(&self, actor: &str, request: NewHierarchyNode) -> FiberResult<HierarchyNode> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(FiberError::validation("name", "must not be empty"));
        }
        let ports = match (request.level, request.port_capacity) {
            (HierarchyLevel::Splitter, Some(0)) | (HierarchyLevel::Splitter, None) => {
                return Err(FiberError::validation(
                    "portCapacity",
                    "a splitter needs at least one port",
                ));
            }
            (HierarchyLevel::Splitter, Some(capacity)) => Some(SplitterPorts::new(capacity)),
            (level, Some(_)) => {
                return Err(FiberError::validation(
                    "portCapacity",
                    format!("a {} has no ports", level),
                ));
            }
            (_, None) => None,
        };

        let mut state = self.state.write();
        check_parent(&state, request.level, request.parent_id)?;

        let serial = match request.serial_number.as_deref().map(str::trim) {
            Some(serial) if !serial.is_empty() => serial.to_string(),
            Some(_) => return Err(FiberError::validation("serialNumber", "must not be empty")),
            None => default_serial(request.level, &name, request.parent_id),
        };
        if state.serials.contains_key(&serial) {
            return Err(FiberError::DuplicateSerial { serial });
        }
        let model = request
            .model
            .unwrap_or_else(|| default_model(request.level, ports.as_ref()));

        let asset = Asset {
            id: AssetId(self.asset_ids.next_id()),
            asset_type: request.level.asset_type(),
            serial_number: serial.clone(),
            model,
            location: request.locality.clone(),
            status: AssetStatus::Available,
            assigned_to_customer_id: None,
            created_at: Utc::now(),
        };
        let record = NodeRecord {
            id: NodeId(self.node_ids.next_id()),
            asset_id: asset.id,
            level: request.level,
            name,
            locality: request.locality,
            parent_id: request.parent_id,
        };
        let id = record.id;

        state.serials.insert(serial, asset.id);
        state.node_by_asset.insert(asset.id, id);
        state.assets.insert(asset.id, asset);
        if let Some(parent) = record.parent_id {
            state.children.entry(parent).or_default().insert(id);
        }
        if let Some(ports) = ports {
            state.ports.insert(id, ports);
        }
        let description = format!("Created {} '{}'", record.level, record.name);
        let asset_id = record.asset_id;
        state.nodes.insert(id, record);
        state.log_change(asset_id, AssetChange::AssetCreated, actor, description);

        let node = state.view(id)?;
        info!(node_id = %id, serial = %node.serial_number, "Hierarchy node created");
        Ok(node)
    }

    pub fn get_node(&self, id: NodeId) -> FiberResult<HierarchyNode> {
        self.state.read().view(id)
    }

    pub fn get_node_by_serial(&self, serial: &str) -> FiberResult<HierarchyNode> {
        let state = self.state.read();
        let node = state
            .serials
            .get(serial)
            .and_then(|asset| state.node_by_asset.get(asset))
            .copied()
            .ok_or_else(|| FiberError::not_found("Node", serial))?;
        state.view(node)
    }

    /// Nodes of `level` (all levels if `None`), ordered by id.
    pub fn list_nodes(&self, level: Option<HierarchyLevel>) -> FiberResult<Vec<HierarchyNode>> {
        let state = self.state.read();
        let mut ids: Vec<NodeId> = state
            .nodes
            .values()
            .filter(|n| level.map_or(true, |wanted| wanted == n.level))
            .map(|n| n.id)
            .collect();
        ids.sort();
        ids.into_iter().map(|id| state.view(id)).collect()
    }

    pub fn list_children(&self, parent: NodeId) -> FiberResult<Vec<HierarchyNode>> {
        let state = self.state.read();
        state.record(parent)?;
        state
            .child_ids(parent)
            .into_iter()
            .map(|id| state.view(id))
            .collect()
    }

    /// Returns `root` with all of its descendants.
    pub fn subtree(&self, root: NodeId) -> FiberResult<SubtreeNode> {
        self.state.read().subtree(root)
    }

    /// Moves a node under `new_parent`, which must sit exactly one level up.
    #[instrument(skip(self))]
    pub fn reparent(&self, actor: &str, id: NodeId, new_parent: NodeId) -> FiberResult<HierarchyNode> {
        let mut state = self.state.write();
        let record = state.record(id)?.clone();
        if record.level == HierarchyLevel::Headend {
            return Err(FiberError::validation(
                "parentId",
                "a headend has no parent and cannot be re-parented",
            ));
        }
        check_parent(&state, record.level, Some(new_parent))?;
        if record.parent_id == Some(new_parent) {
            return state.view(id);
        }

        if let Some(old) = record.parent_id {
            if let Some(siblings) = state.children.get_mut(&old) {
                siblings.remove(&id);
            }
        }
        state.children.entry(new_parent).or_default().insert(id);
        if let Some(node) = state.nodes.get_mut(&id) {
            node.parent_id = Some(new_parent);
        }
        let description = match record.parent_id {
            Some(old) => format!("Moved from node {} to node {}", old, new_parent),
            None => format!("Moved under node {}", new_parent),
        };
        state.log_change(record.asset_id, AssetChange::Reparented, actor, description);

        info!(node_id = %id, old_parent = ?record.parent_id, new_parent = %new_parent, "Node re-parented");
        state.view(id)
    }

    /// Updates a node's descriptive fields and, for splitters, capacity.
    #[instrument(skip(self, update))]
    pub fn update_node(&self, actor: &str, id: NodeId, update: NodeUpdate) -> FiberResult<HierarchyNode> {
        let mut state = self.state.write();
        let record = state.record(id)?.clone();

        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(FiberError::validation("name", "must not be empty"));
            }
        }
        if let Some(capacity) = update.port_capacity {
            let (_, ports) = state.splitter(id).map_err(|_| {
                FiberError::validation("portCapacity", format!("a {} has no ports", record.level))
            })?;
            if capacity == 0 {
                return Err(FiberError::validation(
                    "portCapacity",
                    "a splitter needs at least one port",
                ));
            }
            if capacity < ports.used_ports {
                return Err(FiberError::validation(
                    "portCapacity",
                    format!("{} is below the {} ports in use", capacity, ports.used_ports),
                ));
            }
            if let Some(highest) = state.highest_occupied_port(id) {
                if capacity < highest {
                    return Err(FiberError::validation(
                        "portCapacity",
                        format!("port {} is still reserved", highest),
                    ));
                }
            }
        }

        let mut changes = Vec::new();
        if let Some(node) = state.nodes.get_mut(&id) {
            if let Some(name) = update.name {
                changes.push(format!("name '{}' -> '{}'", node.name, name.trim()));
                node.name = name.trim().to_string();
            }
            if let Some(locality) = update.locality.clone() {
                changes.push(format!("locality '{}'", locality));
                node.locality = Some(locality);
            }
        }
        if let Some(asset) = state.assets.get_mut(&record.asset_id) {
            if let Some(model) = update.model {
                changes.push(format!("model '{}' -> '{}'", asset.model, model));
                asset.model = model;
            }
            if let Some(locality) = update.locality {
                asset.location = Some(locality);
            }
        }
        if let (Some(capacity), Some(ports)) = (update.port_capacity, state.ports.get_mut(&id)) {
            changes.push(format!("portCapacity {} -> {}", ports.port_capacity, capacity));
            ports.port_capacity = capacity;
        }

        if !changes.is_empty() {
            state.log_change(
                record.asset_id,
                AssetChange::NodeUpdated,
                actor,
                format!("Updated {}", changes.join(", ")),
            );
        }
        state.view(id)
    }

    /// Deletes a childless node and its asset. A splitter must have no
    /// ports in use.
    #[instrument(skip(self))]
    pub fn delete_node(&self, actor: &str, id: NodeId) -> FiberResult<()> {
        let serial = self.state.write().remove_node(id)?;
        info!(node_id = %id, %serial, actor, "Hierarchy node deleted");
        Ok(())
    }

    /// Administrative override of a splitter's `usedPorts` counter.
    #[instrument(skip(self))]
    pub fn set_used_ports(&self, actor: &str, splitter: NodeId, used: i64) -> FiberResult<HierarchyNode> {
        let mut state = self.state.write();
        let (record, ports) = state.splitter(splitter)?;
        let asset_id = record.asset_id;

        let used = u32::try_from(used)
            .ok()
            .filter(|u| *u <= ports.port_capacity)
            .ok_or_else(|| {
                FiberError::validation(
                    "usedPorts",
                    format!("{} is outside 0..={}", used, ports.port_capacity),
                )
            })?;
        let live = state.live_reservations(splitter);
        if (used as usize) < live {
            return Err(FiberError::conflict(format!(
                "splitter {} has {} live port reservation(s); usedPorts cannot drop to {}",
                splitter, live, used
            )));
        }

        if let Some(counter) = state.ports.get_mut(&splitter) {
            counter.set_used(used);
        }
        state.log_change(
            asset_id,
            AssetChange::PortsUpdated,
            actor,
            format!("usedPorts {} -> {}", ports.used_ports, used),
        );
        warn!(splitter_id = %splitter, old = ports.used_ports, new = used, "usedPorts overridden");
        state.view(splitter)
    }

    // ---------------------------------------------------------------------
    // Port reservations
    // ---------------------------------------------------------------------

    /// Live reservations on a splitter, ordered by port.
    pub fn list_reservations(&self, splitter: NodeId) -> FiberResult<Vec<PortReservation>> {
        let state = self.state.read();
        state.splitter(splitter)?;
        Ok(state
            .occupied
            .get(&splitter)
            .into_iter()
            .flat_map(|ports| ports.values())
            .filter_map(|id| state.reservations.get(id).cloned())
            .collect())
    }

    /// Reserves a port or fails without side effects.
    ///
    /// Checks run in order: port range, capacity, occupancy. Replaying a
    /// known reservation id with the same splitter, port and customer
    /// returns the stored reservation.
    #[instrument(skip(self, request), fields(reservation_id = %request.reservation_id, port = request.port))]
    pub fn reserve_port(
        &self,
        actor: &str,
        splitter: NodeId,
        request: &ReservePortRequest,
    ) -> FiberResult<PortReservation> {
        let mut state = self.state.write();

        if let Some(existing) = state.reservations.get(&request.reservation_id) {
            if existing.splitter_id == splitter
                && existing.port == request.port
                && existing.customer_id == request.customer_id
            {
                debug!("Replayed reservation");
                return Ok(existing.clone());
            }
            return Err(FiberError::conflict(format!(
                "reservation {} already holds port {} on splitter {}",
                existing.id, existing.port, existing.splitter_id
            )));
        }

        let (record, ports) = state.splitter(splitter)?;
        let asset_id = record.asset_id;
        let serial = state.serial_of(asset_id);
        if !ports.is_valid_port(request.port) {
            return Err(FiberError::validation(
                "port",
                format!(
                    "port {} is outside 1..={} on splitter '{}'",
                    request.port, ports.port_capacity, serial
                ),
            ));
        }
        if !ports.has_free_port() {
            return Err(FiberError::CapacityExceeded {
                splitter: serial,
                capacity: ports.port_capacity,
            });
        }
        if state
            .occupied
            .get(&splitter)
            .is_some_and(|taken| taken.contains_key(&request.port))
        {
            return Err(FiberError::PortConflict {
                splitter: serial,
                port: request.port,
            });
        }

        let used = state.ports.acquire(&splitter).map_err(|e| {
            FiberError::internal(format!("splitter {} counter: {}", splitter, e))
        })?;
        let reservation = PortReservation {
            id: request.reservation_id,
            splitter_id: splitter,
            port: request.port,
            customer_id: request.customer_id,
            reserved_at: Utc::now(),
        };
        state
            .occupied
            .entry(splitter)
            .or_default()
            .insert(request.port, reservation.id);
        state.reservations.insert(reservation.id, reservation.clone());
        state.log_change(
            asset_id,
            AssetChange::PortReserved,
            actor,
            format!(
                "Port {} reserved for customer {} (reservation {})",
                request.port, request.customer_id, reservation.id
            ),
        );

        info!(splitter_id = %splitter, customer_id = %request.customer_id, used_ports = used, "Port reserved");
        Ok(reservation)
    }

    /// Releases a reservation. Returns false if the id is unknown or was
    /// already released.
    #[instrument(skip(self))]
    pub fn release_port(&self, actor: &str, reservation: ReservationId) -> FiberResult<bool> {
        let mut state = self.state.write();
        let Some(held) = state.reservations.get(&reservation).cloned() else {
            debug!("Reservation unknown or already released");
            return Ok(false);
        };

        let used = state.ports.release(&held.splitter_id).map_err(|e| {
            FiberError::internal(format!("splitter {} counter: {}", held.splitter_id, e))
        })?;
        state.reservations.remove(&reservation);
        if let Some(taken) = state.occupied.get_mut(&held.splitter_id) {
            taken.remove(&held.port);
        }
        if let Some(asset_id) = state.nodes.get(&held.splitter_id).map(|n| n.asset_id) {
            state.log_change(
                asset_id,
                AssetChange::PortReleased,
                actor,
                format!(
                    "Port {} released by customer {} (reservation {})",
                    held.port, held.customer_id, reservation
                ),
            );
        }

        info!(splitter_id = %held.splitter_id, port = held.port, used_ports = used, "Port released");
        Ok(true)
    }
}

/// Validates the parent reference of a node at `level`.
fn check_parent(state: &LedgerState, level: HierarchyLevel, parent: Option<NodeId>) -> FiberResult<()> {
    match (level.parent_level(), parent) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(FiberError::validation(
            "parentId",
            "a headend has no parent",
        )),
        (Some(expected), None) => Err(FiberError::validation(
            "parentId",
            format!("a {} must have a {} parent", level, expected),
        )),
        (Some(expected), Some(parent)) => {
            let record = state.record(parent)?;
            if record.level != expected {
                return Err(FiberError::validation(
                    "parentId",
                    format!(
                        "node {} is a {}; a {} must have a {} parent",
                        parent, record.level, level, expected
                    ),
                ));
            }
            Ok(())
        }
    }
}

fn default_serial(level: HierarchyLevel, name: &str, parent: Option<NodeId>) -> String {
    match (level, parent) {
        (HierarchyLevel::Splitter, Some(fdh)) => {
            format!("SPLITTER-{}-{}", fdh, Utc::now().timestamp_millis())
        }
        _ => name.to_string(),
    }
}

fn default_model(level: HierarchyLevel, ports: Option<&SplitterPorts>) -> String {
    match (level, ports) {
        (HierarchyLevel::CoreSwitch, _) => "Core Infrastructure".to_string(),
        (HierarchyLevel::Splitter, Some(ports)) => format!("{}-Port Splitter", ports.port_capacity),
        _ => "Infrastructure".to_string(),
    }
}

#[async_trait]
impl LedgerApi for ResourceLedger {
    async fn get_node(&self, id: NodeId) -> FiberResult<HierarchyNode> {
        ResourceLedger::get_node(self, id)
    }

    async fn get_node_by_serial(&self, serial: &str) -> FiberResult<HierarchyNode> {
        ResourceLedger::get_node_by_serial(self, serial)
    }

    async fn subtree(&self, root: NodeId) -> FiberResult<SubtreeNode> {
        ResourceLedger::subtree(self, root)
    }

    async fn get_asset_by_serial(&self, serial: &str) -> FiberResult<Asset> {
        ResourceLedger::get_asset_by_serial(self, serial)
    }

    async fn list_reservations(&self, splitter: NodeId) -> FiberResult<Vec<PortReservation>> {
        ResourceLedger::list_reservations(self, splitter)
    }

    async fn reserve_port(
        &self,
        actor: &str,
        splitter: NodeId,
        request: &ReservePortRequest,
    ) -> FiberResult<PortReservation> {
        ResourceLedger::reserve_port(self, actor, splitter, request)
    }

    async fn release_port(&self, actor: &str, reservation: ReservationId) -> FiberResult<bool> {
        ResourceLedger::release_port(self, actor, reservation)
    }

    async fn assets_for_customer(&self, customer: CustomerId) -> FiberResult<Vec<Asset>> {
        Ok(ResourceLedger::assets_for_customer(self, customer))
    }

    async fn assign_asset(
        &self,
        actor: &str,
        serial: &str,
        customer: CustomerId,
    ) -> FiberResult<Asset> {
        ResourceLedger::assign_asset(self, actor, serial, customer)
    }

    async fn unassign_assets(
        &self,
        actor: &str,
        customer: CustomerId,
        status: AssetStatus,
    ) -> FiberResult<Vec<Asset>> {
        ResourceLedger::unassign_assets(self, actor, customer, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibernet_common::ErrorKind;
    use fibernet_types::AssetType;
    use pretty_assertions::assert_eq;

    const ADMIN: &str = "admin";

    struct Hierarchy {
        ledger: ResourceLedger,
        headend: NodeId,
        core: NodeId,
        fdh: NodeId,
        splitter: NodeId,
    }

    fn hierarchy(capacity: u32) -> Hierarchy {
        let ledger = ResourceLedger::new();
        let headend = ledger
            .create_node(ADMIN, NewHierarchyNode::headend("H1").with_locality("Downtown"))
            .unwrap()
            .id;
        let core = ledger
            .create_node(ADMIN, NewHierarchyNode::core_switch("X1", headend))
            .unwrap()
            .id;
        let fdh = ledger
            .create_node(ADMIN, NewHierarchyNode::fdh("F1", core))
            .unwrap()
            .id;
        let splitter = ledger
            .create_node(
                ADMIN,
                NewHierarchyNode::splitter("S1", fdh, capacity).with_serial("S1"),
            )
            .unwrap()
            .id;
        Hierarchy {
            ledger,
            headend,
            core,
            fdh,
            splitter,
        }
    }

    fn reserve(ledger: &ResourceLedger, splitter: NodeId, customer: u64, port: u32) -> FiberResult<PortReservation> {
        ledger.reserve_port(
            ADMIN,
            splitter,
            &ReservePortRequest {
                reservation_id: ReservationId::new(),
                customer_id: CustomerId(customer),
                port,
            },
        )
    }

    fn used(ledger: &ResourceLedger, splitter: NodeId) -> u32 {
        ledger.get_node(splitter).unwrap().ports.unwrap().used_ports
    }

    #[test]
    fn test_create_node_defaults() {
        let h = hierarchy(8);
        let headend = h.ledger.get_node(h.headend).unwrap();
        assert_eq!(headend.serial_number, "H1");
        assert_eq!(headend.model, "Infrastructure");
        assert_eq!(headend.locality.as_deref(), Some("Downtown"));

        let core = h.ledger.get_node(h.core).unwrap();
        assert_eq!(core.model, "Core Infrastructure");
        assert_eq!(core.parent_id, Some(h.headend));

        let splitter = h.ledger.get_node(h.splitter).unwrap();
        assert_eq!(splitter.model, "8-Port Splitter");
        assert_eq!(splitter.ports, Some(SplitterPorts::new(8)));

        let generated = h
            .ledger
            .create_node(ADMIN, NewHierarchyNode::splitter("S2", h.fdh, 4))
            .unwrap();
        assert!(generated
            .serial_number
            .starts_with(&format!("SPLITTER-{}-", h.fdh)));

        let asset = h.ledger.get_asset_by_serial("S1").unwrap();
        assert_eq!(asset.asset_type, AssetType::Splitter);
        assert_eq!(asset.id, splitter.asset_id);
    }

    #[test]
    fn test_create_node_parent_checks() {
        let h = hierarchy(8);

        let err = h
            .ledger
            .create_node(ADMIN, NewHierarchyNode::fdh("F2", NodeId(999)))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // FDH under a headend skips a level.
        let err = h
            .ledger
            .create_node(ADMIN, NewHierarchyNode::fdh("F2", h.headend))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut orphan = NewHierarchyNode::core_switch("X2", h.headend);
        orphan.parent_id = None;
        assert!(h.ledger.create_node(ADMIN, orphan).is_err());

        let err = h
            .ledger
            .create_node(ADMIN, NewHierarchyNode::splitter("S0", h.fdh, 0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_duplicate_serial_rejected() {
        let h = hierarchy(8);
        let err = h
            .ledger
            .create_node(ADMIN, NewHierarchyNode::splitter("other", h.fdh, 8).with_serial("S1"))
            .unwrap_err();
        assert_eq!(err, FiberError::DuplicateSerial { serial: "S1".to_string() });

        let err = h
            .ledger
            .create_asset(ADMIN, NewAsset::new(AssetType::Ont, "H1", "ONT-X"))
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_SERIAL");
    }

    #[test]
    fn test_children_and_subtree() {
        let h = hierarchy(8);
        let s2 = h
            .ledger
            .create_node(ADMIN, NewHierarchyNode::splitter("S2", h.fdh, 16))
            .unwrap();

        let children: Vec<NodeId> = h
            .ledger
            .list_children(h.fdh)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(children, vec![h.splitter, s2.id]);

        let tree = h.ledger.subtree(h.headend).unwrap();
        let names: Vec<&str> = tree.walk().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["H1", "X1", "F1", "S1", "S2"]);

        assert!(h.ledger.list_children(NodeId(999)).is_err());
        assert_eq!(
            h.ledger.list_nodes(Some(HierarchyLevel::Splitter)).unwrap().len(),
            2
        );
        assert_eq!(h.ledger.list_nodes(None).unwrap().len(), 5);
    }

    #[test]
    fn test_reparent() {
        let h = hierarchy(8);
        let f2 = h
            .ledger
            .create_node(ADMIN, NewHierarchyNode::fdh("F2", h.core))
            .unwrap();

        let moved = h.ledger.reparent(ADMIN, h.splitter, f2.id).unwrap();
        assert_eq!(moved.parent_id, Some(f2.id));
        assert!(h.ledger.list_children(h.fdh).unwrap().is_empty());
        assert_eq!(h.ledger.list_children(f2.id).unwrap().len(), 1);

        let err = h.ledger.reparent(ADMIN, h.splitter, NodeId(999)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = h.ledger.reparent(ADMIN, h.splitter, h.core).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = h.ledger.reparent(ADMIN, h.headend, h.core).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let history = h.ledger.asset_history(moved.asset_id).unwrap();
        assert_eq!(history[0].change_type, AssetChange::Reparented);
    }

    #[test]
    fn test_delete_node_in_use() {
        let h = hierarchy(8);

        let err = h.ledger.delete_node(ADMIN, h.fdh).unwrap_err();
        assert_eq!(err.code(), "RESOURCE_IN_USE");

        reserve(&h.ledger, h.splitter, 1, 1).unwrap();
        let err = h.ledger.delete_node(ADMIN, h.splitter).unwrap_err();
        assert_eq!(err.code(), "RESOURCE_IN_USE");

        let empty = h
            .ledger
            .create_node(ADMIN, NewHierarchyNode::splitter("S2", h.fdh, 8).with_serial("S2"))
            .unwrap();
        h.ledger.delete_node(ADMIN, empty.id).unwrap();
        assert!(h.ledger.get_node(empty.id).is_err());
        assert!(h.ledger.get_asset_by_serial("S2").is_err());
        assert_eq!(h.ledger.list_children(h.fdh).unwrap().len(), 1);
    }

    #[test]
    fn test_set_used_ports_bounds() {
        let h = hierarchy(8);

        assert_eq!(
            h.ledger.set_used_ports(ADMIN, h.splitter, -1).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            h.ledger.set_used_ports(ADMIN, h.splitter, 9).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            h.ledger.set_used_ports(ADMIN, h.fdh, 1).unwrap_err().kind(),
            ErrorKind::Validation
        );

        let node = h.ledger.set_used_ports(ADMIN, h.splitter, 8).unwrap();
        assert_eq!(node.ports.unwrap().used_ports, 8);

        h.ledger.set_used_ports(ADMIN, h.splitter, 0).unwrap();
        reserve(&h.ledger, h.splitter, 1, 1).unwrap();
        reserve(&h.ledger, h.splitter, 2, 2).unwrap();
        let err = h.ledger.set_used_ports(ADMIN, h.splitter, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(used(&h.ledger, h.splitter), 2);
    }

    #[test]
    fn test_reserve_full_splitter_fails() {
        let h = hierarchy(8);
        h.ledger.set_used_ports(ADMIN, h.splitter, 8).unwrap();

        let err = reserve(&h.ledger, h.splitter, 1, 3).unwrap_err();
        assert_eq!(
            err,
            FiberError::CapacityExceeded {
                splitter: "S1".to_string(),
                capacity: 8
            }
        );
        assert_eq!(used(&h.ledger, h.splitter), 8);
    }

    #[test]
    fn test_reserve_occupied_port_conflicts() {
        let h = hierarchy(8);
        reserve(&h.ledger, h.splitter, 1, 3).unwrap();

        let err = reserve(&h.ledger, h.splitter, 2, 3).unwrap_err();
        assert_eq!(err.code(), "PORT_CONFLICT");
        assert!(err.is_conflict());
        assert_eq!(used(&h.ledger, h.splitter), 1);

        let err = reserve(&h.ledger, h.splitter, 2, 9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = reserve(&h.ledger, h.splitter, 2, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_reserve_is_idempotent() {
        let h = hierarchy(8);
        let request = ReservePortRequest {
            reservation_id: ReservationId::new(),
            customer_id: CustomerId(1),
            port: 4,
        };
        let first = h.ledger.reserve_port(ADMIN, h.splitter, &request).unwrap();
        let replay = h.ledger.reserve_port(ADMIN, h.splitter, &request).unwrap();
        assert_eq!(first, replay);
        assert_eq!(used(&h.ledger, h.splitter), 1);

        let mut different = request.clone();
        different.port = 5;
        let err = h.ledger.reserve_port(ADMIN, h.splitter, &different).unwrap_err();
        assert_eq!(err.code(), "RESERVATION_CONFLICT");
    }

    #[test]
    fn test_release_never_double_decrements() {
        let h = hierarchy(8);
        let reservation = reserve(&h.ledger, h.splitter, 1, 2).unwrap();
        assert_eq!(used(&h.ledger, h.splitter), 1);

        assert!(h.ledger.release_port(ADMIN, reservation.id).unwrap());
        assert_eq!(used(&h.ledger, h.splitter), 0);
        assert!(!h.ledger.release_port(ADMIN, reservation.id).unwrap());
        assert!(!h.ledger.release_port(ADMIN, ReservationId::new()).unwrap());
        assert_eq!(used(&h.ledger, h.splitter), 0);

        // The port is free again.
        reserve(&h.ledger, h.splitter, 2, 2).unwrap();
    }

    #[test]
    fn test_concurrent_reservations_respect_capacity() {
        let h = hierarchy(4);
        let ledger = std::sync::Arc::new(h.ledger);
        let splitter = h.splitter;

        let handles: Vec<_> = (1..=16u32)
            .map(|i| {
                let ledger = ledger.clone();
                std::thread::spawn(move || reserve(&ledger, splitter, i as u64, (i % 4) + 1))
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(granted, 4);

        let reservations = ledger.list_reservations(splitter).unwrap();
        let ports: Vec<u32> = reservations.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![1, 2, 3, 4]);
        assert_eq!(used(&ledger, splitter), 4);
    }

    #[test]
    fn test_update_node_capacity_rules() {
        let h = hierarchy(8);
        reserve(&h.ledger, h.splitter, 1, 6).unwrap();

        let shrink = |capacity| NodeUpdate {
            port_capacity: Some(capacity),
            ..Default::default()
        };
        let err = h.ledger.update_node(ADMIN, h.splitter, shrink(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = h.ledger.update_node(ADMIN, h.fdh, shrink(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let node = h
            .ledger
            .update_node(
                ADMIN,
                h.splitter,
                NodeUpdate {
                    name: Some("Oak St".to_string()),
                    locality: Some("Riverside".to_string()),
                    port_capacity: Some(6),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(node.name, "Oak St");
        assert_eq!(node.locality.as_deref(), Some("Riverside"));
        assert_eq!(node.ports, Some(SplitterPorts { port_capacity: 6, used_ports: 1 }));
    }

    #[test]
    fn test_asset_assignment_and_reclaim() {
        let h = hierarchy(8);
        h.ledger
            .create_asset(ADMIN, NewAsset::new(AssetType::Ont, "ONT-1", "G-240"))
            .unwrap();
        h.ledger
            .create_asset(ADMIN, NewAsset::new(AssetType::Router, "RTR-1", "AX-3000"))
            .unwrap();

        let ont = h.ledger.assign_asset(ADMIN, "ONT-1", CustomerId(7)).unwrap();
        assert_eq!(ont.status, AssetStatus::Assigned);
        assert_eq!(ont.assigned_to_customer_id, Some(CustomerId(7)));
        h.ledger.assign_asset(ADMIN, "RTR-1", CustomerId(7)).unwrap();

        // Overwrites the previous owner.
        let ont = h.ledger.assign_asset(ADMIN, "ONT-1", CustomerId(8)).unwrap();
        assert_eq!(ont.assigned_to_customer_id, Some(CustomerId(8)));
        assert_eq!(h.ledger.assets_for_customer(CustomerId(7)).len(), 1);

        let err = h.ledger.assign_asset(ADMIN, "S1", CustomerId(7)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = h.ledger.assign_asset(ADMIN, "NOPE", CustomerId(7)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let freed = h
            .ledger
            .unassign_assets(ADMIN, CustomerId(7), AssetStatus::Available)
            .unwrap();
        assert_eq!(freed.len(), 1);
        assert_eq!(freed[0].serial_number, "RTR-1");
        assert_eq!(freed[0].status, AssetStatus::Available);
        assert!(h.ledger.assets_for_customer(CustomerId(7)).is_empty());
        assert!(h
            .ledger
            .unassign_assets(ADMIN, CustomerId(7), AssetStatus::Available)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_asset_status_and_delete() {
        let h = hierarchy(8);
        let ont = h
            .ledger
            .create_asset(ADMIN, NewAsset::new(AssetType::Ont, "ONT-1", "G-240").with_location("Depot"))
            .unwrap();

        let same = h
            .ledger
            .update_asset_status(ADMIN, ont.id, AssetStatus::Available)
            .unwrap();
        assert_eq!(same, ont);
        h.ledger
            .update_asset_status(ADMIN, ont.id, AssetStatus::Maintenance)
            .unwrap();

        h.ledger.assign_asset(ADMIN, "ONT-1", CustomerId(1)).unwrap();
        let err = h.ledger.delete_asset(ADMIN, ont.id).unwrap_err();
        assert_eq!(err.code(), "RESOURCE_IN_USE");
        let err = h
            .ledger
            .update_asset_status(ADMIN, ont.id, AssetStatus::Faulty)
            .unwrap_err();
        assert_eq!(err.code(), "RESOURCE_IN_USE");

        h.ledger
            .unassign_assets(ADMIN, CustomerId(1), AssetStatus::Available)
            .unwrap();
        h.ledger.delete_asset(ADMIN, ont.id).unwrap();
        assert!(h.ledger.get_asset(ont.id).is_err());
        assert!(h.ledger.asset_history(ont.id).is_err());
    }

    #[test]
    fn test_delete_never_removes_concurrently_assigned_asset() {
        let ledger = std::sync::Arc::new(ResourceLedger::new());
        for round in 0..200 {
            let serial = format!("ONT-{}", round);
            let ont = ledger
                .create_asset(ADMIN, NewAsset::new(AssetType::Ont, &serial, "G-240"))
                .unwrap();
            let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));

            let assigner = {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                let serial = serial.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    ledger.assign_asset(ADMIN, &serial, CustomerId(1)).is_ok()
                })
            };
            barrier.wait();
            let deleted = ledger.delete_asset(ADMIN, ont.id).is_ok();
            let assigned = assigner.join().unwrap();

            // Exactly one side wins; an assigned asset is never deleted.
            assert!(deleted != assigned, "round {}: deleted={} assigned={}", round, deleted, assigned);
            assert_eq!(ledger.get_asset(ont.id).is_ok(), assigned);
        }
    }

    #[test]
    fn test_filter_assets() {
        let h = hierarchy(8);
        h.ledger
            .create_asset(ADMIN, NewAsset::new(AssetType::Ont, "ONT-1", "G-240").with_location("Depot"))
            .unwrap();
        h.ledger
            .create_asset(ADMIN, NewAsset::new(AssetType::Ont, "ONT-2", "G-240"))
            .unwrap();

        let onts = h.ledger.filter_assets(&AssetFilter {
            asset_type: Some(AssetType::Ont),
            ..Default::default()
        });
        assert_eq!(onts.len(), 2);

        let depot = h.ledger.filter_assets(&AssetFilter {
            location: Some("depot".to_string()),
            ..Default::default()
        });
        assert_eq!(depot.len(), 1);
        assert_eq!(depot[0].serial_number, "ONT-1");

        // Four infrastructure assets plus two ONTs.
        assert_eq!(h.ledger.filter_assets(&AssetFilter::default()).len(), 6);
    }

    #[test]
    fn test_history_newest_first() {
        let h = hierarchy(8);
        let ont = h
            .ledger
            .create_asset(ADMIN, NewAsset::new(AssetType::Ont, "ONT-1", "G-240"))
            .unwrap();
        h.ledger.assign_asset("tech-1", "ONT-1", CustomerId(3)).unwrap();

        let history = h.ledger.asset_history(ont.id).unwrap();
        let changes: Vec<AssetChange> = history.iter().map(|e| e.change_type).collect();
        assert_eq!(changes, vec![AssetChange::AssetAssigned, AssetChange::AssetCreated]);
        assert_eq!(history[0].changed_by, "tech-1");
    }

    #[test]
    fn test_create_asset_rejects_infrastructure() {
        let ledger = ResourceLedger::new();
        let err = ledger
            .create_asset(ADMIN, NewAsset::new(AssetType::Splitter, "S9", "8-Port"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
