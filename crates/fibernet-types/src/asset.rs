//! Asset definitions.

use crate::{AssetId, CustomerId, HierarchyLevel, ParseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of physical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    /// Root of the hierarchy.
    Headend,
    /// Aggregation switch under a headend.
    CoreSwitch,
    /// Fiber Distribution Hub.
    Fdh,
    /// Passive optical splitter feeding customer ports.
    Splitter,
    /// Optical Network Terminal at the customer premises.
    Ont,
    /// Customer premises router.
    Router,
    /// Spool of fiber kept in stock.
    FiberRoll,
}

impl AssetType {
    /// Returns the hierarchy level for infrastructure types.
    pub const fn hierarchy_level(&self) -> Option<HierarchyLevel> {
        match self {
            AssetType::Headend => Some(HierarchyLevel::Headend),
            AssetType::CoreSwitch => Some(HierarchyLevel::CoreSwitch),
            AssetType::Fdh => Some(HierarchyLevel::Fdh),
            AssetType::Splitter => Some(HierarchyLevel::Splitter),
            _ => None,
        }
    }

    /// Returns true for the four hierarchy tiers.
    pub const fn is_infrastructure(&self) -> bool {
        self.hierarchy_level().is_some()
    }

    /// Returns true for devices installed at a customer premises.
    pub const fn is_customer_premises(&self) -> bool {
        matches!(self, AssetType::Ont | AssetType::Router)
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetType::Headend => "HEADEND",
            AssetType::CoreSwitch => "CORE_SWITCH",
            AssetType::Fdh => "FDH",
            AssetType::Splitter => "SPLITTER",
            AssetType::Ont => "ONT",
            AssetType::Router => "ROUTER",
            AssetType::FiberRoll => "FIBER_ROLL",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AssetType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "HEADEND" => Ok(AssetType::Headend),
            "CORE_SWITCH" => Ok(AssetType::CoreSwitch),
            "FDH" => Ok(AssetType::Fdh),
            "SPLITTER" => Ok(AssetType::Splitter),
            "ONT" => Ok(AssetType::Ont),
            "ROUTER" => Ok(AssetType::Router),
            "FIBER_ROLL" => Ok(AssetType::FiberRoll),
            _ => Err(ParseError::InvalidAssetType(s.to_string())),
        }
    }
}

/// Operational status of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    /// In stock and free to assign (default for new assets).
    #[default]
    Available,
    /// Assigned to a customer.
    Assigned,
    /// Out of service for maintenance.
    Maintenance,
    /// Reported faulty.
    Faulty,
    /// Permanently withdrawn.
    Retired,
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetStatus::Available => "AVAILABLE",
            AssetStatus::Assigned => "ASSIGNED",
            AssetStatus::Maintenance => "MAINTENANCE",
            AssetStatus::Faulty => "FAULTY",
            AssetStatus::Retired => "RETIRED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for AssetStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AVAILABLE" => Ok(AssetStatus::Available),
            "ASSIGNED" => Ok(AssetStatus::Assigned),
            "MAINTENANCE" => Ok(AssetStatus::Maintenance),
            "FAULTY" => Ok(AssetStatus::Faulty),
            "RETIRED" => Ok(AssetStatus::Retired),
            _ => Err(ParseError::InvalidAssetStatus(s.to_string())),
        }
    }
}

/// A physical unit tracked by serial number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub asset_type: AssetType,
    /// Unique across all assets.
    pub serial_number: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub status: AssetStatus,
    /// Back-reference to the owning customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_customer_id: Option<CustomerId>,
    pub created_at: DateTime<Utc>,
}

/// Request body for provisioning an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAsset {
    pub asset_type: AssetType,
    pub serial_number: String,
    pub model: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<AssetStatus>,
}

impl NewAsset {
    /// Creates a request with no location and default status.
    pub fn new(
        asset_type: AssetType,
        serial_number: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            asset_type,
            serial_number: serial_number.into(),
            model: model.into(),
            location: None,
            status: None,
        }
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Optional, combinable asset filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFilter {
    #[serde(default, rename = "type")]
    pub asset_type: Option<AssetType>,
    #[serde(default)]
    pub status: Option<AssetStatus>,
    #[serde(default)]
    pub location: Option<String>,
}

impl AssetFilter {
    /// Returns true if the asset satisfies every filter that is set.
    /// Location matches case-insensitively.
    pub fn matches(&self, asset: &Asset) -> bool {
        if self.asset_type.is_some_and(|t| t != asset.asset_type) {
            return false;
        }
        if self.status.is_some_and(|s| s != asset.status) {
            return false;
        }
        match (&self.location, &asset.location) {
            (Some(wanted), Some(actual)) => wanted.eq_ignore_ascii_case(actual),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

/// Kind of change recorded in an asset's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetChange {
    AssetCreated,
    AssetAssigned,
    AssetUnassigned,
    StatusUpdate,
    NodeUpdated,
    Reparented,
    PortsUpdated,
    PortReserved,
    PortReleased,
}

impl fmt::Display for AssetChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetChange::AssetCreated => "ASSET_CREATED",
            AssetChange::AssetAssigned => "ASSET_ASSIGNED",
            AssetChange::AssetUnassigned => "ASSET_UNASSIGNED",
            AssetChange::StatusUpdate => "STATUS_UPDATE",
            AssetChange::NodeUpdated => "NODE_UPDATED",
            AssetChange::Reparented => "REPARENTED",
            AssetChange::PortsUpdated => "PORTS_UPDATED",
            AssetChange::PortReserved => "PORT_RESERVED",
            AssetChange::PortReleased => "PORT_RELEASED",
        };
        write!(f, "{}", s)
    }
}

/// One entry of an asset's change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetHistoryEntry {
    pub asset_id: AssetId,
    pub change_type: AssetChange,
    pub description: String,
    pub changed_by: String,
    pub timestamp: DateTime<Utc>,
}
