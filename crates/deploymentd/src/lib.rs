//! Deployment daemon for fibernet.
//!
//! Runs the field installation workflow, the customer deactivation saga and
//! hosts the append-only audit log that every workflow writes to.
//!
//! ```text
//! PATCH /tasks/{id}/complete ──> TaskService ──activate──> customerd
//!
//! POST /deactivate ──> DeactivationSaga ──deactivate──> customerd
//!                             │
//!                             ├──reclaim assets──> inventoryd
//!                             │
//!                             └──audit──> InMemoryAuditLog <── POST /api/audit
//! ```

pub mod rest_api;
pub mod saga;
pub mod tasks;

pub use rest_api::{router, AppState};
pub use saga::{DeactivationReport, DeactivationSaga};
pub use tasks::{TaskBoard, TaskService};
