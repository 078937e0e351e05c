//! Shared infrastructure for fibernet services.
//!
//! - [`error`]: the [`FiberError`] taxonomy and its HTTP mapping
//! - [`audit`]: audit entries, sinks and the `audit_log!` macro
//! - [`table`]: keyed tables without auto-vivification and capacity counters
//! - [`identity`]: caller identity and role gating
//! - [`api`]: the REST response envelope
//! - [`clients`]: collaborator traits and their HTTP implementations
//! - [`config`] / [`logging`] / [`daemon`]: daemon bootstrap

pub mod api;
pub mod audit;
pub mod clients;
pub mod config;
pub mod daemon;
pub mod error;
pub mod identity;
pub mod logging;
pub mod table;

pub use api::{ok, ApiError, ApiResponse, ApiResult, ErrorBody};
pub use audit::{AuditAction, AuditEntry, AuditOutcome, AuditQuery, AuditSink, InMemoryAuditLog};
pub use clients::{CustomerApi, LedgerApi};
pub use config::{CliArgs, ConfigError, ServiceConfig};
pub use error::{ErrorKind, FiberError, FiberResult};
pub use identity::{Caller, Role};
pub use logging::init_logging;
pub use table::{CapacityCounter, IdSequence, Table, TableError};
