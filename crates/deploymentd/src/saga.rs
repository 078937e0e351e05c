//! Customer deactivation saga.
//!
//! Two steps, each committed by its own service:
//!
//! 1. the Customer State Machine moves the customer ACTIVE -> INACTIVE,
//!    which releases its splitter port
//! 2. the Resource Ledger returns every asset the customer owns to stock
//!
//! A failure in either step is audited and returned to the caller. Step 1
//! is never undone when step 2 fails; reclaiming the assets again is an
//! operator action, done by re-running the saga. A run on a customer that is
//! already INACTIVE skips the deactivation audit entry and only reclaims.

use fibernet_common::{
    AuditAction, AuditEntry, AuditSink, CustomerApi, FiberError, FiberResult, LedgerApi,
};
use fibernet_types::{Asset, AssetStatus, Customer, CustomerId, CustomerStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of a completed deactivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivationReport {
    pub customer: Customer,
    pub reclaimed_assets: Vec<Asset>,
    /// Shared by the audit entries of this run.
    pub correlation_id: String,
}

pub struct DeactivationSaga {
    customers: Arc<dyn CustomerApi>,
    ledger: Arc<dyn LedgerApi>,
    audit: Arc<dyn AuditSink>,
}

impl DeactivationSaga {
    pub fn new(
        customers: Arc<dyn CustomerApi>,
        ledger: Arc<dyn LedgerApi>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            customers,
            ledger,
            audit,
        }
    }

    #[instrument(skip(self, reason), fields(
        customer_id = %customer,
        correlation_id = tracing::field::Empty,
    ))]
    pub async fn deactivate(
        &self,
        actor: &str,
        customer: CustomerId,
        reason: Option<&str>,
    ) -> FiberResult<DeactivationReport> {
        let correlation_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("correlation_id", correlation_id.as_str());
        let reason_text = reason.map(str::trim).filter(|r| !r.is_empty());

        let step1 = async {
            let before = self.customers.get_assignment(customer).await?.status;
            let after = self
                .customers
                .transition(actor, customer, CustomerStatus::Inactive, reason_text)
                .await?;
            Ok::<_, FiberError>((before, after))
        };
        let (before, deactivated) = match step1.await {
            Ok(applied) => applied,
            Err(e) => {
                warn!(error = %e, "Deactivation failed");
                self.record(
                    AuditEntry::new(
                        actor,
                        AuditAction::CustomerDeactivationFailed,
                        format!("Failed to deactivate customer {}", customer),
                    )
                    .with_error(&e),
                    &correlation_id,
                )
                .await;
                return Err(e);
            }
        };

        if before == CustomerStatus::Inactive {
            info!("Customer already INACTIVE; reclaiming assets only");
        } else {
            let mut description = format!("Customer {} deactivated", customer);
            if let Some(reason) = reason_text {
                description.push_str(&format!(": {}", reason));
            }
            self.record(
                AuditEntry::new(actor, AuditAction::CustomerDeactivation, description),
                &correlation_id,
            )
            .await;
        }

        let reclaimed = match self
            .ledger
            .unassign_assets(actor, customer, AssetStatus::Available)
            .await
        {
            Ok(reclaimed) => reclaimed,
            Err(e) => {
                warn!(error = %e, "Asset reclamation failed; customer stays INACTIVE");
                self.record(
                    AuditEntry::new(
                        actor,
                        AuditAction::AssetReclamationFailed,
                        format!("Failed to reclaim assets of customer {}", customer),
                    )
                    .with_error(&e),
                    &correlation_id,
                )
                .await;
                return Err(e);
            }
        };

        let serials: Vec<&str> = reclaimed.iter().map(|a| a.serial_number.as_str()).collect();
        self.record(
            AuditEntry::new(
                actor,
                AuditAction::AssetReclamation,
                format!(
                    "Reclaimed {} asset(s) from customer {}: [{}]",
                    reclaimed.len(),
                    customer,
                    serials.join(", ")
                ),
            ),
            &correlation_id,
        )
        .await;

        info!(reclaimed = reclaimed.len(), "Customer deactivated");
        Ok(DeactivationReport {
            customer: deactivated,
            reclaimed_assets: reclaimed,
            correlation_id,
        })
    }

    async fn record(&self, entry: AuditEntry, correlation_id: &str) {
        self.audit
            .emit(entry.with_correlation_id(correlation_id))
            .await;
    }
}
