//! Read-only path tracing over the hierarchy.
//!
//! The resolver never writes. Upward traces read one node per hop, so a
//! trace from a splitter costs four ledger reads. Downward renders fetch the
//! whole subtree in one call and then read splitter occupancy from the
//! customer service, at most `fanout_limit` requests at a time.

use fibernet_common::{CustomerApi, FiberError, FiberResult, LedgerApi};
use fibernet_types::{
    CoreSwitchTopology, CustomerAssignment, CustomerId, CustomerPath, CustomerStatus, DevicePath,
    FdhTopology, HeadendTopology, HierarchyLevel, HierarchyNode, InfrastructurePath, NodeId,
    PathNode, SplitterTopology, SubtreeNode,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Upper bound on nodes visited by an upward walk (splitter to headend).
pub const MAX_HOPS: usize = 4;

type Occupancy = HashMap<NodeId, Vec<CustomerAssignment>>;

pub struct TopologyResolver {
    ledger: Arc<dyn LedgerApi>,
    customers: Arc<dyn CustomerApi>,
    fanout_limit: usize,
}

impl TopologyResolver {
    pub fn new(
        ledger: Arc<dyn LedgerApi>,
        customers: Arc<dyn CustomerApi>,
        fanout_limit: usize,
    ) -> Self {
        Self {
            ledger,
            customers,
            fanout_limit: fanout_limit.max(1),
        }
    }

    /// Path from the headend down to an ACTIVE customer.
    #[instrument(skip(self))]
    pub async fn trace_customer(&self, customer: CustomerId) -> FiberResult<CustomerPath> {
        let view = self.customers.get_assignment(customer).await?;
        if view.status != CustomerStatus::Active {
            return Err(FiberError::CustomerInactive {
                customer: customer.to_string(),
            });
        }
        let splitter_id = view.splitter_id.ok_or_else(|| {
            FiberError::internal(format!("active customer {} has no splitter", customer))
        })?;

        let splitter = self.ledger.get_node(splitter_id).await?;
        let mut nodes = self.ascend(splitter).await?;
        nodes.push(PathNode::customer(&view));

        Ok(CustomerPath {
            customer_id: view.customer_id,
            customer_name: view.name,
            path: root_of(nodes)?,
        })
    }

    /// Path for any serial number.
    ///
    /// Customer-premises devices resolve through their owner; hierarchy
    /// nodes resolve to their own position under the headend.
    #[instrument(skip(self))]
    pub async fn trace_serial(&self, serial: &str) -> FiberResult<DevicePath> {
        let asset = self.ledger.get_asset_by_serial(serial).await?;

        if asset.asset_type.is_customer_premises() {
            let owner = asset
                .assigned_to_customer_id
                .ok_or_else(|| FiberError::not_found("Customer owning device", serial))?;
            debug!(customer_id = %owner, "Device resolved to customer");
            return Ok(DevicePath::Customer(self.trace_customer(owner).await?));
        }

        if !asset.asset_type.is_infrastructure() {
            return Err(FiberError::UnsupportedAssetType {
                asset_type: asset.asset_type.to_string(),
            });
        }

        let node = self.ledger.get_node_by_serial(serial).await?;
        let nodes = self.ascend(node).await?;
        Ok(DevicePath::Infrastructure(InfrastructurePath {
            serial_number: asset.serial_number,
            asset_type: asset.asset_type,
            path: root_of(nodes)?,
        }))
    }

    /// Everything under a headend with the ACTIVE customers of each splitter.
    #[instrument(skip(self))]
    pub async fn full_topology(&self, headend: NodeId) -> FiberResult<HeadendTopology> {
        let tree = self.subtree_at(headend, HierarchyLevel::Headend).await?;
        let mut occupancy = self.occupancy(&tree).await?;

        let core_switches = tree
            .children
            .iter()
            .map(|switch| CoreSwitchTopology {
                core_switch: switch.node.clone(),
                fdhs: switch
                    .children
                    .iter()
                    .map(|fdh| fdh_view(fdh, &mut occupancy))
                    .collect(),
            })
            .collect();

        Ok(HeadendTopology {
            headend: tree.node,
            core_switches,
        })
    }

    /// One FDH with its splitters and their ACTIVE customers.
    #[instrument(skip(self))]
    pub async fn fdh_topology(&self, fdh: NodeId) -> FiberResult<FdhTopology> {
        let tree = self.subtree_at(fdh, HierarchyLevel::Fdh).await?;
        let mut occupancy = self.occupancy(&tree).await?;
        Ok(fdh_view(&tree, &mut occupancy))
    }

    /// Walks from `start` to the headend and returns the nodes root first.
    async fn ascend(&self, start: HierarchyNode) -> FiberResult<Vec<PathNode>> {
        let mut nodes = vec![PathNode::infrastructure(&start)];
        let mut current = start;

        while current.level != HierarchyLevel::Headend {
            if nodes.len() >= MAX_HOPS {
                return Err(FiberError::internal(format!(
                    "no headend within {} hops of {}",
                    MAX_HOPS, current.serial_number
                )));
            }
            let parent = current.parent_id.ok_or_else(|| {
                FiberError::internal(format!(
                    "{} {} has no parent",
                    current.level, current.serial_number
                ))
            })?;
            current = self.ledger.get_node(parent).await?;
            debug!(node = %current.serial_number, level = %current.level, "Ascended");
            nodes.push(PathNode::infrastructure(&current));
        }

        nodes.reverse();
        Ok(nodes)
    }

    async fn subtree_at(&self, root: NodeId, level: HierarchyLevel) -> FiberResult<SubtreeNode> {
        let tree = self.ledger.subtree(root).await?;
        if tree.node.level != level {
            return Err(FiberError::validation(
                "id",
                format!("node {} is a {}, not a {}", root, tree.node.level, level),
            ));
        }
        Ok(tree)
    }

    /// Reads the ACTIVE customers of every splitter in `tree`.
    async fn occupancy(&self, tree: &SubtreeNode) -> FiberResult<Occupancy> {
        let splitters: Vec<NodeId> = tree
            .walk()
            .into_iter()
            .filter(|n| n.level == HierarchyLevel::Splitter)
            .map(|n| n.id)
            .collect();
        debug!(splitters = splitters.len(), limit = self.fanout_limit, "Fetching occupancy");

        stream::iter(splitters)
            .map(|id| async move {
                let customers = self.customers.customers_by_splitter(id).await?;
                Ok::<_, FiberError>((id, customers))
            })
            .buffered(self.fanout_limit)
            .try_collect()
            .await
    }
}

fn root_of(nodes: Vec<PathNode>) -> FiberResult<PathNode> {
    PathNode::chain(nodes).ok_or_else(|| FiberError::internal("empty path"))
}

fn fdh_view(fdh: &SubtreeNode, occupancy: &mut Occupancy) -> FdhTopology {
    FdhTopology {
        fdh: fdh.node.clone(),
        splitters: fdh
            .children
            .iter()
            .map(|splitter| SplitterTopology {
                splitter: splitter.node.clone(),
                customers: occupancy.remove(&splitter.node.id).unwrap_or_default(),
            })
            .collect(),
    }
}
