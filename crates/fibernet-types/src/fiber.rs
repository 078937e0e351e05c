//! Fiber drop line records.

use crate::{CustomerId, FiberLineId, NodeId, ParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a drop line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiberStatus {
    Active,
    Inactive,
    /// Set on deactivation; the record is kept.
    Disconnected,
}

impl fmt::Display for FiberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FiberStatus::Active => "ACTIVE",
            FiberStatus::Inactive => "INACTIVE",
            FiberStatus::Disconnected => "DISCONNECTED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for FiberStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(FiberStatus::Active),
            "INACTIVE" => Ok(FiberStatus::Inactive),
            "DISCONNECTED" => Ok(FiberStatus::Disconnected),
            _ => Err(ParseError::InvalidFiberStatus(s.to_string())),
        }
    }
}

/// The cable record connecting a customer to a splitter.
///
/// At most one line exists per customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiberDropLine {
    pub id: FiberLineId,
    pub customer_id: CustomerId,
    pub from_splitter_id: NodeId,
    pub length_meters: f64,
    pub status: FiberStatus,
}
