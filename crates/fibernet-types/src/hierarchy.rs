//! Physical hierarchy: Headend -> Core Switch -> FDH -> Splitter.

use crate::{AssetId, AssetType, CustomerId, NodeId, ParseError, ReservationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four infrastructure tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HierarchyLevel {
    Headend,
    CoreSwitch,
    Fdh,
    Splitter,
}

impl HierarchyLevel {
    /// All levels, root first.
    pub const ALL: [HierarchyLevel; 4] = [
        HierarchyLevel::Headend,
        HierarchyLevel::CoreSwitch,
        HierarchyLevel::Fdh,
        HierarchyLevel::Splitter,
    ];

    /// Level a node of this level must be parented to.
    pub const fn parent_level(&self) -> Option<HierarchyLevel> {
        match self {
            HierarchyLevel::Headend => None,
            HierarchyLevel::CoreSwitch => Some(HierarchyLevel::Headend),
            HierarchyLevel::Fdh => Some(HierarchyLevel::CoreSwitch),
            HierarchyLevel::Splitter => Some(HierarchyLevel::Fdh),
        }
    }

    /// Level of this node's children.
    pub const fn child_level(&self) -> Option<HierarchyLevel> {
        match self {
            HierarchyLevel::Headend => Some(HierarchyLevel::CoreSwitch),
            HierarchyLevel::CoreSwitch => Some(HierarchyLevel::Fdh),
            HierarchyLevel::Fdh => Some(HierarchyLevel::Splitter),
            HierarchyLevel::Splitter => None,
        }
    }

    /// Asset type wrapped by nodes of this level.
    pub const fn asset_type(&self) -> AssetType {
        match self {
            HierarchyLevel::Headend => AssetType::Headend,
            HierarchyLevel::CoreSwitch => AssetType::CoreSwitch,
            HierarchyLevel::Fdh => AssetType::Fdh,
            HierarchyLevel::Splitter => AssetType::Splitter,
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.asset_type(), f)
    }
}

impl FromStr for HierarchyLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<AssetType>()
            .ok()
            .and_then(|t| t.hierarchy_level())
            .ok_or_else(|| ParseError::InvalidHierarchyLevel(s.to_string()))
    }
}

/// Port counters carried by a splitter.
///
/// `0 <= used_ports <= port_capacity` holds for every stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitterPorts {
    pub port_capacity: u32,
    pub used_ports: u32,
}

impl SplitterPorts {
    /// Creates an empty splitter of the given capacity.
    pub const fn new(port_capacity: u32) -> Self {
        Self {
            port_capacity,
            used_ports: 0,
        }
    }

    /// Returns the number of unused ports.
    pub const fn free_ports(&self) -> u32 {
        self.port_capacity.saturating_sub(self.used_ports)
    }

    /// Returns true if another port can be taken.
    pub const fn has_free_port(&self) -> bool {
        self.used_ports < self.port_capacity
    }

    /// Returns true if `port` is a valid port number on this splitter.
    pub const fn is_valid_port(&self, port: u32) -> bool {
        port >= 1 && port <= self.port_capacity
    }
}

/// A Headend, Core Switch, FDH or Splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub id: NodeId,
    /// The asset carrying this node's serial and model.
    pub asset_id: AssetId,
    pub level: HierarchyLevel,
    pub serial_number: String,
    pub model: String,
    pub name: String,
    /// Location for headends and core switches, region for FDHs,
    /// neighborhood for splitters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    /// Always set except for headends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    /// Only set for splitters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<SplitterPorts>,
}

impl HierarchyNode {
    pub fn is_splitter(&self) -> bool {
        self.level == HierarchyLevel::Splitter
    }
}

/// Request body for creating a hierarchy node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHierarchyNode {
    pub level: HierarchyLevel,
    pub name: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    /// Required for splitters, ignored otherwise.
    #[serde(default)]
    pub port_capacity: Option<u32>,
}

impl NewHierarchyNode {
    pub fn headend(name: impl Into<String>) -> Self {
        Self::new(HierarchyLevel::Headend, name, None)
    }

    pub fn core_switch(name: impl Into<String>, headend: NodeId) -> Self {
        Self::new(HierarchyLevel::CoreSwitch, name, Some(headend))
    }

    pub fn fdh(name: impl Into<String>, core_switch: NodeId) -> Self {
        Self::new(HierarchyLevel::Fdh, name, Some(core_switch))
    }

    pub fn splitter(name: impl Into<String>, fdh: NodeId, port_capacity: u32) -> Self {
        let mut node = Self::new(HierarchyLevel::Splitter, name, Some(fdh));
        node.port_capacity = Some(port_capacity);
        node
    }

    fn new(level: HierarchyLevel, name: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            level,
            name: name.into(),
            serial_number: None,
            model: None,
            locality: None,
            parent_id,
            port_capacity: None,
        }
    }

    /// Sets an explicit serial number.
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    /// Sets the locality (location, region or neighborhood).
    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }
}

/// Partial update of a node's descriptive fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub port_capacity: Option<u32>,
}

/// A node with all of its descendants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtreeNode {
    pub node: HierarchyNode,
    #[serde(default)]
    pub children: Vec<SubtreeNode>,
}

impl SubtreeNode {
    /// Visits every node in the subtree, parents before children.
    pub fn walk(&self) -> Vec<&HierarchyNode> {
        let mut out = vec![&self.node];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// An occupied splitter port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortReservation {
    pub id: ReservationId,
    pub splitter_id: NodeId,
    pub port: u32,
    pub customer_id: CustomerId,
    pub reserved_at: DateTime<Utc>,
}

/// Request body for reserving a splitter port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservePortRequest {
    /// Idempotency key chosen by the caller.
    pub reservation_id: ReservationId,
    pub customer_id: CustomerId,
    pub port: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_chain() {
        assert_eq!(HierarchyLevel::Headend.parent_level(), None);
        assert_eq!(
            HierarchyLevel::Splitter.parent_level(),
            Some(HierarchyLevel::Fdh)
        );
        assert_eq!(HierarchyLevel::Splitter.child_level(), None);
        for level in HierarchyLevel::ALL {
            if let Some(child) = level.child_level() {
                assert_eq!(child.parent_level(), Some(level));
            }
        }
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("fdh".parse::<HierarchyLevel>().unwrap(), HierarchyLevel::Fdh);
        assert!("ONT".parse::<HierarchyLevel>().is_err());
    }

    #[test]
    fn test_splitter_ports() {
        let mut ports = SplitterPorts::new(8);
        assert!(ports.has_free_port());
        assert!(ports.is_valid_port(8));
        assert!(!ports.is_valid_port(0));
        assert!(!ports.is_valid_port(9));
        ports.used_ports = 8;
        assert!(!ports.has_free_port());
        assert_eq!(ports.free_ports(), 0);
    }
}
