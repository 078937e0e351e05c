//! Common fiber-access network types.
//!
//! This crate provides the data model shared by every fibernet service:
//!
//! - [`Asset`]: a physical unit tracked by serial number
//! - [`HierarchyNode`]: a Headend, Core Switch, FDH or Splitter wrapping one asset
//! - [`PortReservation`]: an occupied `(splitter, port)` pair
//! - [`Customer`]: lifecycle status plus at most one [`PortAssignment`]
//! - [`FiberDropLine`]: the cable record between a customer and a splitter
//! - [`PathNode`] and [`HeadendTopology`]: rendered topology views
//! - [`DeploymentTask`]: a scheduled installation visit

mod asset;
mod customer;
mod fiber;
mod hierarchy;
mod ids;
mod task;
mod topology;

pub use asset::{Asset, AssetChange, AssetFilter, AssetHistoryEntry, AssetStatus, AssetType, NewAsset};
pub use customer::{
    AssignPortRequest, Customer, CustomerAssignment, CustomerProfile, CustomerSearch,
    CustomerStatus, PortAssignment, ProfileUpdate, StatusChangeRequest,
};
pub use fiber::{FiberDropLine, FiberStatus};
pub use hierarchy::{
    HierarchyLevel, HierarchyNode, NewHierarchyNode, NodeUpdate, PortReservation,
    ReservePortRequest, SplitterPorts, SubtreeNode,
};
pub use ids::{AssetId, CustomerId, FiberLineId, NodeId, ReservationId, TaskId, TechnicianId};
pub use task::{CompleteTaskRequest, DeploymentTask, NewDeploymentTask, TaskStatus};
pub use topology::{
    CoreSwitchTopology, CustomerPath, DevicePath, FdhTopology, HeadendTopology,
    InfrastructurePath, PathNode, PathNodeType, SplitterTopology,
};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid asset type: {0}")]
    InvalidAssetType(String),

    #[error("invalid asset status: {0}")]
    InvalidAssetStatus(String),

    #[error("invalid hierarchy level: {0}")]
    InvalidHierarchyLevel(String),

    #[error("invalid customer status: {0}")]
    InvalidCustomerStatus(String),

    #[error("invalid fiber line status: {0}")]
    InvalidFiberStatus(String),

    #[error("invalid task status: {0}")]
    InvalidTaskStatus(String),
}
