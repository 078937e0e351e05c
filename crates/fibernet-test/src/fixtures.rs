//! Seeded network fixtures.

use fibernet_common::LedgerApi;
use fibernet_inventoryd::ResourceLedger;
use fibernet_types::{
    Asset, AssetType, CustomerProfile, HierarchyNode, NewAsset, NewHierarchyNode, NodeId,
};
use std::sync::Arc;

/// Actor recorded for fixture setup.
pub const FIXTURE_ACTOR: &str = "fixture";

/// A ledger seeded with `H1 -> X1 -> F1 -> S1`.
///
/// Every node's serial number equals its name.
pub struct NetworkFixture {
    pub ledger: Arc<ResourceLedger>,
    pub headend: HierarchyNode,
    pub core_switch: HierarchyNode,
    pub fdh: HierarchyNode,
    pub splitter: HierarchyNode,
}

impl NetworkFixture {
    /// Chain with an 8-port splitter.
    pub fn new() -> Self {
        Self::with_capacity(8)
    }

    pub fn with_capacity(capacity: u32) -> Self {
        let ledger = Arc::new(ResourceLedger::new());
        let create = |request: NewHierarchyNode| {
            ledger
                .create_node(FIXTURE_ACTOR, request)
                .expect("fixture node")
        };

        let headend = create(NewHierarchyNode::headend("H1").with_serial("H1").with_locality("Metro"));
        let core_switch = create(NewHierarchyNode::core_switch("X1", headend.id).with_serial("X1"));
        let fdh = create(NewHierarchyNode::fdh("F1", core_switch.id).with_serial("F1").with_locality("North"));
        let splitter = create(
            NewHierarchyNode::splitter("S1", fdh.id, capacity)
                .with_serial("S1")
                .with_locality("Riverside"),
        );

        Self {
            ledger,
            headend,
            core_switch,
            fdh,
            splitter,
        }
    }

    /// The ledger behind the collaborator trait.
    pub fn ledger_api(&self) -> Arc<dyn LedgerApi> {
        self.ledger.clone()
    }

    /// Adds another splitter under `F1`, serial equal to `name`.
    pub fn add_splitter(&self, name: &str, capacity: u32) -> HierarchyNode {
        self.ledger
            .create_node(
                FIXTURE_ACTOR,
                NewHierarchyNode::splitter(name, self.fdh.id, capacity).with_serial(name),
            )
            .expect("fixture splitter")
    }

    /// Adds a second FDH under `X1`.
    pub fn add_fdh(&self, name: &str) -> HierarchyNode {
        self.ledger
            .create_node(
                FIXTURE_ACTOR,
                NewHierarchyNode::fdh(name, self.core_switch.id).with_serial(name),
            )
            .expect("fixture fdh")
    }

    /// Provisions a customer-premises device in stock.
    pub fn add_device(&self, asset_type: AssetType, serial: &str) -> Asset {
        self.ledger
            .create_asset(FIXTURE_ACTOR, NewAsset::new(asset_type, serial, "Fixture Model"))
            .expect("fixture asset")
    }

    /// Current `usedPorts` of a splitter.
    pub fn used_ports(&self, splitter: NodeId) -> u32 {
        self.ledger
            .get_node(splitter)
            .ok()
            .and_then(|n| n.ports)
            .map(|p| p.used_ports)
            .unwrap_or_default()
    }

    /// Marks every port of a splitter as used without reservations.
    pub fn fill(&self, splitter: &HierarchyNode) {
        let capacity = splitter.ports.map(|p| p.port_capacity).unwrap_or_default();
        self.ledger
            .set_used_ports(FIXTURE_ACTOR, splitter.id, i64::from(capacity))
            .expect("fixture fill");
    }
}

impl Default for NetworkFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A customer profile with a predictable address.
pub fn profile(name: &str) -> CustomerProfile {
    CustomerProfile::new(name, format!("{} Fiber Way", name)).with_neighborhood("Riverside")
}
