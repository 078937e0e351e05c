//! Deactivation saga across in-process customer and inventory services.

use fibernet_common::{AuditAction, CustomerApi, ErrorKind, InMemoryAuditLog};
use fibernet_customerd::CustomerService;
use fibernet_deploymentd::DeactivationSaga;
use fibernet_test::{
    assert_audited, assert_failure_audited, audit_trail, profile, CustomerOp, FaultyCustomers,
    FaultyLedger, LedgerOp, NetworkFixture,
};
use fibernet_types::{AssetStatus, AssetType, AssignPortRequest, CustomerId, CustomerStatus};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const ACTOR: &str = "support-3";

struct Platform {
    net: NetworkFixture,
    ledger: Arc<FaultyLedger>,
    customers: Arc<CustomerService>,
    audit: Arc<InMemoryAuditLog>,
}

impl Platform {
    fn new() -> Self {
        let net = NetworkFixture::new();
        let audit = Arc::new(InMemoryAuditLog::new());
        let customers = Arc::new(CustomerService::new(net.ledger_api(), audit.clone()));
        let ledger = Arc::new(FaultyLedger::new(net.ledger_api()));
        Self {
            net,
            ledger,
            customers,
            audit,
        }
    }

    fn saga(&self) -> DeactivationSaga {
        DeactivationSaga::new(self.customers.clone(), self.ledger.clone(), self.audit.clone())
    }

    /// An ACTIVE customer on S1 port 2 owning an ONT and a router.
    async fn subscriber(&self) -> CustomerId {
        let id = self.customers.create(ACTOR, profile("Ada")).unwrap().id;
        self.customers
            .allocation()
            .assign(ACTOR, id, &AssignPortRequest::new("S1", 2, 18.0))
            .await
            .unwrap();
        self.customers
            .transition(ACTOR, id, CustomerStatus::Active, None)
            .await
            .unwrap();
        for (asset_type, serial) in [(AssetType::Ont, "ONT-1"), (AssetType::Router, "RT-1")] {
            self.net.add_device(asset_type, serial);
            self.customers.assign_asset(ACTOR, id, serial).await.unwrap();
        }
        id
    }
}

#[tokio::test]
async fn test_deactivation_releases_port_and_reclaims_assets() {
    let p = Platform::new();
    let ada = p.subscriber().await;
    assert_eq!(p.net.used_ports(p.net.splitter.id), 1);

    let report = p.saga().deactivate(ACTOR, ada, Some("moved away")).await.unwrap();
    assert_eq!(report.customer.status, CustomerStatus::Inactive);
    assert!(report.customer.assignment.is_none());
    assert_eq!(report.reclaimed_assets.len(), 2);
    assert_eq!(p.net.used_ports(p.net.splitter.id), 0);

    let ont = p.net.ledger.get_asset_by_serial("ONT-1").unwrap();
    assert_eq!(ont.status, AssetStatus::Available);
    assert_eq!(ont.assigned_to_customer_id, None);

    assert_eq!(
        audit_trail(&p.audit),
        vec![
            "PORT_ASSIGNED",
            "CUSTOMER_STATUS_CHANGED",
            "CUSTOMER_STATUS_CHANGED",
            "CUSTOMER_DEACTIVATION",
            "ASSET_RECLAMATION",
        ]
    );
    let step1 = assert_audited(&p.audit, AuditAction::CustomerDeactivation, 1).remove(0);
    let step2 = assert_audited(&p.audit, AuditAction::AssetReclamation, 1).remove(0);
    assert_eq!(step1.correlation_id.as_deref(), Some(report.correlation_id.as_str()));
    assert_eq!(step2.correlation_id, step1.correlation_id);
    assert!(step1.description.ends_with("moved away"));
    assert!(step2.description.contains("ONT-1"));
}

#[tokio::test]
async fn test_unreachable_reclamation_keeps_customer_inactive() {
    let p = Platform::new();
    let ada = p.subscriber().await;
    p.ledger.faults().fail(LedgerOp::UnassignAssets);

    let err = p.saga().deactivate(ACTOR, ada, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceCommunication);

    // Step 1 is not rolled back.
    let customer = p.customers.store().get(ada).unwrap();
    assert_eq!(customer.status, CustomerStatus::Inactive);
    assert_eq!(p.net.used_ports(p.net.splitter.id), 0);
    assert_audited(&p.audit, AuditAction::CustomerDeactivation, 1);
    assert_failure_audited(&p.audit, AuditAction::AssetReclamationFailed, "injected fault");

    // Assets stay with the customer until an operator retries.
    let ont = p.net.ledger.get_asset_by_serial("ONT-1").unwrap();
    assert_eq!(ont.assigned_to_customer_id, Some(ada));
}

#[tokio::test]
async fn test_unreachable_customer_service_stops_saga() {
    let p = Platform::new();
    let ada = p.subscriber().await;
    let customers = Arc::new(FaultyCustomers::new(p.customers.clone()));
    customers.faults().fail(CustomerOp::Transition);
    let saga = DeactivationSaga::new(customers, p.ledger.clone(), p.audit.clone());

    let err = saga.deactivate(ACTOR, ada, None).await.unwrap_err();
    assert_eq!(err.code(), "SERVICE_UNREACHABLE");
    assert_failure_audited(&p.audit, AuditAction::CustomerDeactivationFailed, "injected fault");
    assert_eq!(p.ledger.faults().calls(LedgerOp::UnassignAssets), 0);
    assert_eq!(
        p.customers.store().get(ada).unwrap().status,
        CustomerStatus::Active
    );
}

#[tokio::test]
async fn test_pending_or_unknown_customer_is_rejected() {
    let p = Platform::new();
    let pending = p.customers.create(ACTOR, profile("Bob")).unwrap().id;

    let err = p.saga().deactivate(ACTOR, pending, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    let err = p.saga().deactivate(ACTOR, CustomerId(77), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_audited(&p.audit, AuditAction::CustomerDeactivationFailed, 2);
    assert_audited(&p.audit, AuditAction::AssetReclamation, 0);
}

#[tokio::test]
async fn test_repeated_deactivation_is_harmless() {
    let p = Platform::new();
    let ada = p.subscriber().await;

    p.saga().deactivate(ACTOR, ada, None).await.unwrap();
    let again = p.saga().deactivate(ACTOR, ada, None).await.unwrap();
    assert!(again.reclaimed_assets.is_empty());
    assert_eq!(p.net.used_ports(p.net.splitter.id), 0);
    // Only the run that changed the status records a deactivation.
    assert_audited(&p.audit, AuditAction::CustomerDeactivation, 1);
    let reclamations = assert_audited(&p.audit, AuditAction::AssetReclamation, 2);
    assert_eq!(reclamations[1].correlation_id.as_deref(), Some(again.correlation_id.as_str()));
}

#[tokio::test]
async fn test_rerun_reclaims_after_failed_reclamation() {
    let p = Platform::new();
    let ada = p.subscriber().await;
    p.ledger.faults().fail_times(LedgerOp::UnassignAssets, 1);
    p.saga().deactivate(ACTOR, ada, None).await.unwrap_err();

    let report = p.saga().deactivate(ACTOR, ada, None).await.unwrap();
    assert_eq!(report.reclaimed_assets.len(), 2);
    assert_eq!(
        p.net.ledger.get_asset_by_serial("RT-1").unwrap().status,
        AssetStatus::Available
    );
    assert_audited(&p.audit, AuditAction::CustomerDeactivation, 1);
    assert_audited(&p.audit, AuditAction::AssetReclamationFailed, 1);
    assert_audited(&p.audit, AuditAction::AssetReclamation, 1);
}
