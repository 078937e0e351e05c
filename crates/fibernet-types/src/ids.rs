//! Identifier newtypes.
//!
//! Every entity is keyed by a generated numeric id, except port
//! reservations which are keyed by a caller-chosen UUID so that a retried
//! reservation can be recognised.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Returns the raw numeric value.
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| ParseError::InvalidId(s.to_string()))
            }
        }
    };
}

numeric_id!(
    /// Identifier of an [`Asset`](crate::Asset).
    AssetId
);
numeric_id!(
    /// Identifier of a [`HierarchyNode`](crate::HierarchyNode).
    NodeId
);
numeric_id!(
    /// Identifier of a [`Customer`](crate::Customer).
    CustomerId
);
numeric_id!(
    /// Identifier of a [`FiberDropLine`](crate::FiberDropLine).
    FiberLineId
);
numeric_id!(
    /// Identifier of a [`DeploymentTask`](crate::DeploymentTask).
    TaskId
);
numeric_id!(
    /// Identifier of a field technician.
    TechnicianId
);

/// Idempotency key of a port reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub Uuid);

impl ReservationId {
    /// Generates a fresh random reservation id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReservationId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ParseError::InvalidId(s.to_string()))
    }
}
