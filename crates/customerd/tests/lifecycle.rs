//! Customer State Machine transitions and read views.

use fibernet_common::{AuditAction, CustomerApi, ErrorKind, InMemoryAuditLog};
use fibernet_customerd::CustomerService;
use fibernet_test::{
    assert_audited, assert_failure_audited, audit_trail, profile, FaultyLedger, LedgerOp,
    NetworkFixture,
};
use fibernet_types::{
    AssetType, AssignPortRequest, CustomerId, CustomerSearch, CustomerStatus, FiberStatus,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const ACTOR: &str = "agent-7";

struct Harness {
    net: NetworkFixture,
    ledger: Arc<FaultyLedger>,
    audit: Arc<InMemoryAuditLog>,
    service: CustomerService,
}

fn harness() -> Harness {
    let net = NetworkFixture::new();
    let ledger = Arc::new(FaultyLedger::new(net.ledger_api()));
    let audit = Arc::new(InMemoryAuditLog::new());
    let service = CustomerService::new(ledger.clone(), audit.clone());
    Harness {
        net,
        ledger,
        audit,
        service,
    }
}

/// Creates a customer on `port` of S1 and activates it.
async fn active_customer(h: &Harness, name: &str, port: u32) -> CustomerId {
    let id = h.service.create(ACTOR, profile(name)).unwrap().id;
    h.service
        .allocation()
        .assign(ACTOR, id, &AssignPortRequest::new("S1", port, 30.0))
        .await
        .unwrap();
    h.service
        .change_status(ACTOR, id, CustomerStatus::Active, None)
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn test_activation_requires_assignment() {
    let h = harness();
    let ada = h.service.create(ACTOR, profile("Ada")).unwrap().id;

    let err = h
        .service
        .change_status(ACTOR, ada, CustomerStatus::Active, Some("install done"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    let entry = assert_failure_audited(
        &h.audit,
        AuditAction::CustomerStatusChangeFailed,
        "no splitter port",
    );
    assert!(entry.description.contains("install done"));
}

#[tokio::test]
async fn test_full_lifecycle() {
    let h = harness();
    let ada = active_customer(&h, "Ada", 2).await;
    assert_eq!(
        h.service.store().line_for(ada).unwrap().status,
        FiberStatus::Active
    );
    assert_eq!(h.net.used_ports(h.net.splitter.id), 1);

    let inactive = h
        .service
        .change_status(ACTOR, ada, CustomerStatus::Inactive, Some("moved away"))
        .await
        .unwrap();
    assert_eq!(inactive.status, CustomerStatus::Inactive);
    assert!(inactive.assignment.is_none());
    assert_eq!(h.net.used_ports(h.net.splitter.id), 0);
    assert_eq!(
        h.service.store().line_for(ada).unwrap().status,
        FiberStatus::Disconnected
    );

    // Repeating the transition or releasing again never decrements twice.
    h.service
        .change_status(ACTOR, ada, CustomerStatus::Inactive, None)
        .await
        .unwrap();
    h.service.allocation().release(ACTOR, ada).await.unwrap();
    assert_eq!(h.net.used_ports(h.net.splitter.id), 0);

    let changes = assert_audited(&h.audit, AuditAction::CustomerStatusChanged, 2);
    assert!(changes[1].description.contains("ACTIVE to INACTIVE (moved away)"));
    assert_eq!(
        audit_trail(&h.audit),
        vec![
            "PORT_ASSIGNED",
            "CUSTOMER_STATUS_CHANGED",
            "CUSTOMER_STATUS_CHANGED"
        ]
    );

    h.service.delete(ACTOR, ada).unwrap();
    assert_eq!(h.service.store().get(ada).unwrap_err().kind(), ErrorKind::NotFound);
    assert!(h.service.store().line_for(ada).is_none());
}

#[tokio::test]
async fn test_illegal_transitions() {
    let h = harness();
    let ada = active_customer(&h, "Ada", 1).await;

    let err = h
        .service
        .change_status(ACTOR, ada, CustomerStatus::Pending, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    h.service
        .change_status(ACTOR, ada, CustomerStatus::Inactive, None)
        .await
        .unwrap();
    let err = h
        .service
        .change_status(ACTOR, ada, CustomerStatus::Active, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    assert_audited(&h.audit, AuditAction::CustomerStatusChangeFailed, 2);
}

#[tokio::test]
async fn test_delete_requires_inactive() {
    let h = harness();
    let ada = active_customer(&h, "Ada", 1).await;
    let err = h.service.delete(ACTOR, ada).unwrap_err();
    assert_eq!(err.code(), "RESOURCE_IN_USE");
}

#[tokio::test]
async fn test_deactivation_survives_release_failure() {
    let h = harness();
    let ada = active_customer(&h, "Ada", 4).await;
    let held = h.service.store().get(ada).unwrap().assignment.unwrap();
    h.ledger.faults().fail(LedgerOp::ReleasePort);

    let customer = h
        .service
        .change_status(ACTOR, ada, CustomerStatus::Inactive, None)
        .await
        .unwrap();
    assert_eq!(customer.status, CustomerStatus::Inactive);
    // The reservation stays live until released by id.
    assert_eq!(h.net.used_ports(h.net.splitter.id), 1);

    let changes = assert_audited(&h.audit, AuditAction::CustomerStatusChanged, 2);
    let description = &changes[1].description;
    assert!(description.contains("ACTIVE to INACTIVE"));
    assert!(description.contains(&format!(
        "port not released: reservation {} on splitter 'S1' port 4",
        held.reservation_id
    )));

    // The audited id is enough to free the port for the next customer.
    h.ledger.faults().heal(LedgerOp::ReleasePort);
    assert!(h.net.ledger.release_port(ACTOR, held.reservation_id).unwrap());
    assert_eq!(h.net.used_ports(h.net.splitter.id), 0);
    active_customer(&h, "Bob", 4).await;
    assert_eq!(h.net.used_ports(h.net.splitter.id), 1);
}

#[tokio::test]
async fn test_customers_by_splitter_lists_active_with_assets() {
    let h = harness();
    let ada = active_customer(&h, "Ada", 5).await;
    let bob = active_customer(&h, "Bob", 2).await;
    let carol = h.service.create(ACTOR, profile("Carol")).unwrap().id;
    h.service
        .allocation()
        .assign(ACTOR, carol, &AssignPortRequest::new("S1", 3, 10.0))
        .await
        .unwrap();

    h.net.add_device(AssetType::Ont, "ONT-ADA");
    h.service.assign_asset(ACTOR, ada, "ONT-ADA").await.unwrap();

    let views = h
        .service
        .customers_by_splitter(h.net.splitter.id)
        .await
        .unwrap();
    let ids: Vec<CustomerId> = views.iter().map(|v| v.customer_id).collect();
    assert_eq!(ids, vec![bob, ada]);
    assert_eq!(views[1].assigned_port, Some(5));
    assert_eq!(views[1].assigned_assets[0].serial_number, "ONT-ADA");
    assert!(views[0].assigned_assets.is_empty());

    let view = h.service.get_assignment(carol).await.unwrap();
    assert_eq!(view.status, CustomerStatus::Pending);
    assert_eq!(view.splitter_id, Some(h.net.splitter.id));
}

#[tokio::test]
async fn test_asset_assignment_requires_customer() {
    let h = harness();
    h.net.add_device(AssetType::Router, "RT-1");
    let err = h
        .service
        .assign_asset(ACTOR, CustomerId(42), "RT-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.ledger.faults().calls(LedgerOp::AssignAsset), 0);
}

#[tokio::test]
async fn test_details_and_search() {
    let h = harness();
    let ada = active_customer(&h, "Ada", 1).await;
    h.service.create(ACTOR, profile("Bob")).unwrap();

    let details = h.service.details(ada).await.unwrap();
    assert_eq!(details.customer.profile.name, "Ada");
    assert_eq!(details.fiber_line.unwrap().length_meters, 30.0);

    let active = h.service.search(&CustomerSearch {
        status: Some(CustomerStatus::Active),
        ..Default::default()
    });
    assert_eq!(active.len(), 1);

    let by_name = h.service.search(&CustomerSearch {
        name: Some("bo".to_string()),
        ..Default::default()
    });
    assert_eq!(by_name[0].profile.name, "Bob");
}
