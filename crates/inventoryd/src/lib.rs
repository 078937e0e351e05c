//! Resource Ledger daemon for fibernet.
//!
//! Owns the physical hierarchy (Headend -> Core Switch -> FDH -> Splitter),
//! the assets wrapped by hierarchy nodes, customer-premises equipment and
//! splitter port occupancy.
//!
//! # Architecture
//!
//! ```text
//! allocation coordinator ──reserve/release──┐
//! deactivation saga ───────reclaim──────────┤
//! topology resolver ───────reads────────────┤
//!                                           ▼
//!                                  ┌─────────────────┐
//!                                  │  rest_api       │
//!                                  │       │         │
//!                                  │       ▼         │
//!                                  │  ResourceLedger │
//!                                  │  (one lock)     │
//!                                  └─────────────────┘
//! ```

pub mod ledger;
pub mod rest_api;

pub use ledger::ResourceLedger;
pub use rest_api::router;
