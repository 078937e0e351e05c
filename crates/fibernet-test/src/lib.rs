//! Test infrastructure for fibernet services.
//!
//! Provides:
//! - a seeded Resource Ledger with a Headend -> Core Switch -> FDH -> Splitter chain
//! - collaborator wrappers that inject `ServiceCommunication` failures and count calls
//! - an audit sink that always fails
//! - assertion helpers over the audit log and splitter counters

pub mod faults;
pub mod fixtures;
mod verification;

pub use faults::{
    CustomerOp, FailingAuditSink, FaultPlan, FaultyCustomers, FaultyLedger, LedgerOp, ReserveHook,
};
pub use fixtures::*;
pub use verification::*;
