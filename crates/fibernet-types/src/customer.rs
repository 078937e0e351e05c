//! Customer lifecycle types.

use crate::{Asset, CustomerId, NodeId, ParseError, ReservationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
    /// Initial state, no assignment.
    #[default]
    Pending,
    /// Assigned and serving.
    Active,
    /// Assignment cleared; may be deleted or left dormant.
    Inactive,
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CustomerStatus::Pending => "PENDING",
            CustomerStatus::Active => "ACTIVE",
            CustomerStatus::Inactive => "INACTIVE",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CustomerStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(CustomerStatus::Pending),
            "ACTIVE" => Ok(CustomerStatus::Active),
            "INACTIVE" => Ok(CustomerStatus::Inactive),
            _ => Err(ParseError::InvalidCustomerStatus(s.to_string())),
        }
    }
}

/// Descriptive customer fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
}

impl CustomerProfile {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_neighborhood(mut self, neighborhood: impl Into<String>) -> Self {
        self.neighborhood = Some(neighborhood.into());
        self
    }
}

/// Partial profile update; unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub connection_type: Option<String>,
}

impl ProfileUpdate {
    /// Applies the set fields to `profile`.
    pub fn apply(self, profile: &mut CustomerProfile) {
        if let Some(name) = self.name {
            profile.name = name;
        }
        if let Some(address) = self.address {
            profile.address = address;
        }
        if self.neighborhood.is_some() {
            profile.neighborhood = self.neighborhood;
        }
        if self.plan.is_some() {
            profile.plan = self.plan;
        }
        if self.connection_type.is_some() {
            profile.connection_type = self.connection_type;
        }
    }
}

/// A customer's splitter port. Splitter and port are set together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortAssignment {
    pub splitter_id: NodeId,
    pub splitter_serial_number: String,
    #[serde(rename = "assignedPort")]
    pub port: u32,
    /// Reservation held on the splitter for this assignment.
    pub reservation_id: ReservationId,
}

/// A customer record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    #[serde(flatten)]
    pub profile: CustomerProfile,
    pub status: CustomerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<PortAssignment>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn splitter_id(&self) -> Option<NodeId> {
        self.assignment.as_ref().map(|a| a.splitter_id)
    }

    pub fn assigned_port(&self) -> Option<u32> {
        self.assignment.as_ref().map(|a| a.port)
    }
}

/// Optional, combinable customer search criteria.
///
/// Text fields match as case-insensitive substrings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSearch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub status: Option<CustomerStatus>,
}

impl CustomerSearch {
    pub fn matches(&self, customer: &Customer) -> bool {
        fn contains(haystack: Option<&str>, needle: &Option<String>) -> bool {
            match needle {
                None => true,
                Some(n) => haystack
                    .map(|h| h.to_lowercase().contains(&n.to_lowercase()))
                    .unwrap_or(false),
            }
        }

        contains(Some(&customer.profile.name), &self.name)
            && contains(Some(&customer.profile.address), &self.address)
            && contains(customer.profile.neighborhood.as_deref(), &self.neighborhood)
            && self.status.map_or(true, |s| s == customer.status)
    }
}

/// Assignment view consumed by the topology resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerAssignment {
    pub customer_id: CustomerId,
    pub name: String,
    pub status: CustomerStatus,
    #[serde(default)]
    pub splitter_id: Option<NodeId>,
    #[serde(default)]
    pub assigned_port: Option<u32>,
    #[serde(default)]
    pub assigned_assets: Vec<Asset>,
}

/// Request body for assigning or reassigning a splitter port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPortRequest {
    pub splitter_serial_number: String,
    pub port_number: u32,
    pub length_meters: f64,
}

impl AssignPortRequest {
    pub fn new(
        splitter_serial_number: impl Into<String>,
        port_number: u32,
        length_meters: f64,
    ) -> Self {
        Self {
            splitter_serial_number: splitter_serial_number.into(),
            port_number,
            length_meters,
        }
    }
}

/// Request body for a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub status: CustomerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
