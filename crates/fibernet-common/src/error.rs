//! Error types for fibernet services.
//!
//! Every service operation returns [`FiberResult`]. Each [`FiberError`]
//! variant maps to one machine-readable [`ErrorKind`], a finer-grained
//! `code()` and an HTTP status, which together form the structured error
//! body returned to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for fibernet operations.
pub type FiberResult<T> = Result<T, FiberError>;

/// Machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    CapacityExceeded,
    Conflict,
    InvalidStateTransition,
    CustomerInactive,
    UnsupportedAssetType,
    Validation,
    Unauthorized,
    Forbidden,
    ServiceCommunication,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::CapacityExceeded => "CAPACITY_EXCEEDED",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorKind::CustomerInactive => "CUSTOMER_INACTIVE",
            ErrorKind::UnsupportedAssetType => "UNSUPPORTED_ASSET_TYPE",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::ServiceCommunication => "SERVICE_COMMUNICATION",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in fibernet operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FiberError {
    /// Customer, asset or hierarchy node absent.
    #[error("{entity} '{key}' not found")]
    NotFound {
        /// Entity kind ("Customer", "Asset", "Splitter", ...).
        entity: String,
        /// The key that was looked up.
        key: String,
    },

    /// A collaborator answered 404.
    #[error("{service}: {message}")]
    RemoteNotFound {
        /// The collaborator that answered.
        service: String,
        /// The collaborator's message.
        message: String,
    },

    /// Splitter has no free port.
    #[error("Splitter '{splitter}' is at full capacity ({capacity} ports)")]
    CapacityExceeded {
        /// Splitter serial number.
        splitter: String,
        /// Its port capacity.
        capacity: u32,
    },

    /// Port already held by another customer.
    #[error("Port {port} on splitter '{splitter}' is already in use")]
    PortConflict {
        /// Splitter serial number.
        splitter: String,
        /// The requested port.
        port: u32,
    },

    /// Customer already holds a splitter port.
    #[error("Customer {customer} is already assigned to splitter '{splitter}' port {port}")]
    AlreadyAssigned {
        customer: String,
        splitter: String,
        port: u32,
    },

    /// Deletion or shrink blocked by dependent state.
    #[error("{entity} '{key}' is in use: {reason}")]
    ResourceInUse {
        entity: String,
        key: String,
        reason: String,
    },

    /// Serial number already registered.
    #[error("Serial number '{serial}' already exists")]
    DuplicateSerial {
        serial: String,
    },

    /// Reservation bookkeeping disagreement, e.g. an idempotency key reused
    /// for a different port.
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// Illegal lifecycle move or unmet precondition.
    #[error("Customer {customer} cannot move from {from} to {to}: {reason}")]
    InvalidStateTransition {
        customer: String,
        from: String,
        to: String,
        reason: String,
    },

    /// Path requested for a customer that is not ACTIVE.
    #[error("Customer {customer} is not active and has no assigned network path")]
    CustomerInactive {
        customer: String,
    },

    /// Walker reached a node type it cannot ascend or descend from.
    #[error("Unsupported asset type for topology traversal: {asset_type}")]
    UnsupportedAssetType {
        asset_type: String,
    },

    /// Request validation failed.
    #[error("Invalid value for {field}: {message}")]
    Validation {
        field: String,
        message: String,
    },

    /// A remote collaborator failed: unreachable, timed out, or answered
    /// with a non-404 error status.
    #[error("Service '{service}' call failed: {message}")]
    ServiceCommunication {
        /// The collaborator called.
        service: String,
        /// Remote HTTP status; `None` if no response arrived.
        status: Option<u16>,
        /// Remote error kind, if the body carried one.
        remote_kind: Option<ErrorKind>,
        message: String,
    },

    /// Caller identity missing.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
    },

    /// Caller lacks the required role.
    #[error("Forbidden: {message}")]
    Forbidden {
        message: String,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl FiberError {
    /// Creates a not found error.
    pub fn not_found(entity: impl Into<String>, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.to_string(),
        }
    }

    /// Creates a resource in use error.
    pub fn in_use(
        entity: impl Into<String>,
        key: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::ResourceInUse {
            entity: entity.into(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid state transition error.
    pub fn invalid_transition(
        customer: impl fmt::Display,
        from: impl fmt::Display,
        to: impl fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidStateTransition {
            customer: customer.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a service communication error for a call that got no response.
    pub fn unreachable(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ServiceCommunication {
            service: service.into(),
            status: None,
            remote_kind: None,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the machine-readable kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FiberError::NotFound { .. } | FiberError::RemoteNotFound { .. } => ErrorKind::NotFound,
            FiberError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            FiberError::PortConflict { .. }
            | FiberError::AlreadyAssigned { .. }
            | FiberError::ResourceInUse { .. }
            | FiberError::DuplicateSerial { .. }
            | FiberError::Conflict { .. } => ErrorKind::Conflict,
            FiberError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            FiberError::CustomerInactive { .. } => ErrorKind::CustomerInactive,
            FiberError::UnsupportedAssetType { .. } => ErrorKind::UnsupportedAssetType,
            FiberError::Validation { .. } => ErrorKind::Validation,
            FiberError::ServiceCommunication { .. } => ErrorKind::ServiceCommunication,
            FiberError::Unauthorized { .. } => ErrorKind::Unauthorized,
            FiberError::Forbidden { .. } => ErrorKind::Forbidden,
            FiberError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns the fine-grained reason code.
    pub fn code(&self) -> &'static str {
        match self {
            FiberError::PortConflict { .. } => "PORT_CONFLICT",
            FiberError::AlreadyAssigned { .. } => "ALREADY_ASSIGNED",
            FiberError::ResourceInUse { .. } => "RESOURCE_IN_USE",
            FiberError::DuplicateSerial { .. } => "DUPLICATE_SERIAL",
            FiberError::Conflict { .. } => "RESERVATION_CONFLICT",
            FiberError::ServiceCommunication { status: None, .. } => "SERVICE_UNREACHABLE",
            FiberError::ServiceCommunication { .. } => "REMOTE_ERROR",
            other => other.kind().as_str(),
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound | ErrorKind::CustomerInactive => 404,
            ErrorKind::CapacityExceeded
            | ErrorKind::Conflict
            | ErrorKind::InvalidStateTransition => 409,
            ErrorKind::UnsupportedAssetType => 422,
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::ServiceCommunication => match self {
                FiberError::ServiceCommunication { status: None, .. } => 503,
                _ => 502,
            },
            ErrorKind::Internal => 500,
        }
    }

    /// Returns true if the caller should refresh state and retry with
    /// different parameters (e.g. pick another port).
    pub fn is_conflict(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Conflict | ErrorKind::CapacityExceeded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FiberError::not_found("Customer", 42);
        assert_eq!(err.to_string(), "Customer '42' not found");

        let err = FiberError::CapacityExceeded {
            splitter: "SPL-1".to_string(),
            capacity: 8,
        };
        assert_eq!(
            err.to_string(),
            "Splitter 'SPL-1' is at full capacity (8 ports)"
        );
    }

    #[test]
    fn test_kind_and_status_mapping() {
        let conflict = FiberError::PortConflict {
            splitter: "SPL-1".to_string(),
            port: 3,
        };
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert_eq!(conflict.code(), "PORT_CONFLICT");
        assert_eq!(conflict.status_code(), 409);

        let inactive = FiberError::CustomerInactive {
            customer: "7".to_string(),
        };
        assert_eq!(inactive.status_code(), 404);

        assert_eq!(
            FiberError::validation("port", "must be positive").status_code(),
            400
        );
        assert_eq!(FiberError::internal("bug").code(), "INTERNAL");
    }

    #[test]
    fn test_service_communication_status() {
        let unreachable = FiberError::unreachable("inventory", "connection refused");
        assert_eq!(unreachable.status_code(), 503);
        assert_eq!(unreachable.code(), "SERVICE_UNREACHABLE");

        let remote = FiberError::ServiceCommunication {
            service: "inventory".to_string(),
            status: Some(500),
            remote_kind: Some(ErrorKind::Internal),
            message: "boom".to_string(),
        };
        assert_eq!(remote.status_code(), 502);
        assert_eq!(remote.kind(), ErrorKind::ServiceCommunication);
    }

    #[test]
    fn test_is_conflict() {
        assert!(FiberError::CapacityExceeded {
            splitter: "S".to_string(),
            capacity: 1
        }
        .is_conflict());
        assert!(FiberError::in_use("Splitter", 1, "has children").is_conflict());
        assert!(!FiberError::unreachable("customer", "timeout").is_conflict());
        assert!(!FiberError::not_found("Asset", "X").is_conflict());
    }
}
