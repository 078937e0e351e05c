//! Customer lifecycle daemon for fibernet.
//!
//! Hosts the Customer State Machine and the Allocation Coordinator. The
//! coordinator reserves splitter ports on the Resource Ledger and records
//! the resulting assignment and fiber drop line locally.
//!
//! ```text
//! rest_api ──> CustomerService ──transition──> CustomerStore
//!                    │
//!                    └──> AllocationCoordinator ──reserve/release──> LedgerApi
//!                                 │
//!                                 └──attach/move/detach──> CustomerStore
//! ```

pub mod allocation;
pub mod lifecycle;
pub mod rest_api;
pub mod service;
pub mod store;

pub use allocation::AllocationCoordinator;
pub use rest_api::router;
pub use service::{CustomerDetails, CustomerService};
pub use store::CustomerStore;
