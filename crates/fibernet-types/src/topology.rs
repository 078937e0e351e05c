//! Rendered topology views.
//!
//! Paths are singly-linked chains rooted at the headend: every node points
//! at its child, and the leaf is either a customer or the traced
//! infrastructure node.

use crate::{
    Asset, AssetType, CustomerAssignment, CustomerId, HierarchyLevel, HierarchyNode,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a node in a rendered path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathNodeType {
    Headend,
    CoreSwitch,
    Fdh,
    Splitter,
    Customer,
}

impl From<HierarchyLevel> for PathNodeType {
    fn from(level: HierarchyLevel) -> Self {
        match level {
            HierarchyLevel::Headend => PathNodeType::Headend,
            HierarchyLevel::CoreSwitch => PathNodeType::CoreSwitch,
            HierarchyLevel::Fdh => PathNodeType::Fdh,
            HierarchyLevel::Splitter => PathNodeType::Splitter,
        }
    }
}

impl fmt::Display for PathNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PathNodeType::Headend => "HEADEND",
            PathNodeType::CoreSwitch => "CORE_SWITCH",
            PathNodeType::Fdh => "FDH",
            PathNodeType::Splitter => "SPLITTER",
            PathNodeType::Customer => "CUSTOMER",
        };
        write!(f, "{}", s)
    }
}

/// One hop of a rendered path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathNode {
    #[serde(rename = "type")]
    pub node_type: PathNodeType,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<Box<PathNode>>,
}

impl PathNode {
    /// Renders an infrastructure node.
    ///
    /// Splitters are identified as `Splitter-<id>` and described by their
    /// capacity and neighborhood; other tiers use their name and locality.
    pub fn infrastructure(node: &HierarchyNode) -> Self {
        let (identifier, detail) = match (node.level, node.ports) {
            (HierarchyLevel::Splitter, Some(ports)) => {
                let mut detail = format!("{} Ports", ports.port_capacity);
                if let Some(neighborhood) = node.locality.as_deref().filter(|n| !n.is_empty()) {
                    detail.push_str(", ");
                    detail.push_str(neighborhood);
                }
                (format!("Splitter-{}", node.id), Some(detail))
            }
            _ => (node.name.clone(), node.locality.clone()),
        };
        Self {
            node_type: node.level.into(),
            identifier,
            detail,
            serial_number: Some(node.serial_number.clone()),
            model: Some(node.model.clone()),
            assets: Vec::new(),
            child: None,
        }
    }

    /// Renders the customer leaf.
    pub fn customer(assignment: &CustomerAssignment) -> Self {
        Self {
            node_type: PathNodeType::Customer,
            identifier: assignment.name.clone(),
            detail: assignment.assigned_port.map(|p| format!("Port: {}", p)),
            serial_number: None,
            model: None,
            assets: assignment.assigned_assets.clone(),
            child: None,
        }
    }

    /// Links `nodes` root-first into one chain and returns its root.
    pub fn chain(nodes: Vec<PathNode>) -> Option<PathNode> {
        nodes.into_iter().rev().fold(None, |child, mut node| {
            node.child = child.map(Box::new);
            Some(node)
        })
    }

    /// Node types from this node down to the leaf.
    pub fn types(&self) -> Vec<PathNodeType> {
        self.iter().map(|n| n.node_type).collect()
    }

    /// Identifiers from this node down to the leaf.
    pub fn identifiers(&self) -> Vec<&str> {
        self.iter().map(|n| n.identifier.as_str()).collect()
    }

    /// Iterates from this node down to the leaf.
    pub fn iter(&self) -> impl Iterator<Item = &PathNode> {
        std::iter::successors(Some(self), |n| n.child.as_deref())
    }

    /// Returns the last node of the chain.
    pub fn leaf(&self) -> &PathNode {
        let mut current = self;
        while let Some(child) = current.child.as_deref() {
            current = child;
        }
        current
    }
}

/// Path from the headend to an active customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPath {
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub path: PathNode,
}

/// Path from the headend to an infrastructure node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructurePath {
    pub serial_number: String,
    pub asset_type: AssetType,
    pub path: PathNode,
}

/// Result of tracing an arbitrary serial number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DevicePath {
    /// The serial belongs to a customer-premises device.
    Customer(CustomerPath),
    /// The serial belongs to a hierarchy node.
    Infrastructure(InfrastructurePath),
}

impl DevicePath {
    pub fn path(&self) -> &PathNode {
        match self {
            DevicePath::Customer(p) => &p.path,
            DevicePath::Infrastructure(p) => &p.path,
        }
    }
}

/// Splitter with its active customers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitterTopology {
    pub splitter: HierarchyNode,
    pub customers: Vec<CustomerAssignment>,
}

/// FDH with its splitters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FdhTopology {
    pub fdh: HierarchyNode,
    pub splitters: Vec<SplitterTopology>,
}

/// Core switch with its FDHs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreSwitchTopology {
    pub core_switch: HierarchyNode,
    pub fdhs: Vec<FdhTopology>,
}

/// Full subtree under a headend with live customer occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadendTopology {
    pub headend: HierarchyNode,
    pub core_switches: Vec<CoreSwitchTopology>,
}

impl HeadendTopology {
    /// Iterates every splitter in the topology.
    pub fn splitters(&self) -> impl Iterator<Item = &SplitterTopology> {
        self.core_switches
            .iter()
            .flat_map(|x| x.fdhs.iter())
            .flat_map(|f| f.splitters.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetId, CustomerStatus, NodeId, SplitterPorts};
    use pretty_assertions::assert_eq;

    fn node(id: u64, level: HierarchyLevel, name: &str) -> HierarchyNode {
        HierarchyNode {
            id: NodeId(id),
            asset_id: AssetId(id),
            level,
            serial_number: format!("SN-{}", id),
            model: "Infrastructure".to_string(),
            name: name.to_string(),
            locality: Some("Riverside".to_string()),
            parent_id: None,
            ports: (level == HierarchyLevel::Splitter).then(|| SplitterPorts::new(8)),
        }
    }

    #[test]
    fn test_splitter_rendering() {
        let rendered = PathNode::infrastructure(&node(9, HierarchyLevel::Splitter, "ignored"));
        assert_eq!(rendered.identifier, "Splitter-9");
        assert_eq!(rendered.detail.as_deref(), Some("8 Ports, Riverside"));
        assert_eq!(rendered.node_type, PathNodeType::Splitter);
    }

    #[test]
    fn test_chain_links_root_first() {
        let customer = CustomerAssignment {
            customer_id: CustomerId(1),
            name: "C1".to_string(),
            status: CustomerStatus::Active,
            splitter_id: Some(NodeId(4)),
            assigned_port: Some(1),
            assigned_assets: Vec::new(),
        };
        let root = PathNode::chain(vec![
            PathNode::infrastructure(&node(1, HierarchyLevel::Headend, "H1")),
            PathNode::infrastructure(&node(2, HierarchyLevel::CoreSwitch, "X1")),
            PathNode::customer(&customer),
        ])
        .unwrap();

        assert_eq!(
            root.types(),
            vec![
                PathNodeType::Headend,
                PathNodeType::CoreSwitch,
                PathNodeType::Customer
            ]
        );
        assert_eq!(root.leaf().detail.as_deref(), Some("Port: 1"));
        assert!(PathNode::chain(Vec::new()).is_none());
    }
}
