//! Topology daemon for fibernet.
//!
//! Renders physical paths between customers, devices and the network root.
//! All state lives in the inventory and customer services; this daemon only
//! reads.
//!
//! ```text
//!              ┌───────────── TopologyResolver ─────────────┐
//! trace ──────>│ get_node x4 (splitter -> fdh -> xs -> he)  │──> inventoryd
//! render ─────>│ subtree x1, customers_by_splitter x N      │──> customerd
//!              └────────────────────────────────────────────┘
//! ```

pub mod resolver;
pub mod rest_api;

pub use resolver::{TopologyResolver, MAX_HOPS};
pub use rest_api::router;
