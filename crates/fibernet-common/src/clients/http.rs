//! HTTP implementations of the collaborator traits.
//!
//! Failure mapping:
//! - no response (connect error, timeout) -> `ServiceCommunication` without status
//! - remote 404 -> `RemoteNotFound`, for mutations as well as reads
//! - any other remote 4xx/5xx -> `ServiceCommunication` with the remote status and kind

use super::{CustomerApi, LedgerApi};
use crate::api::ApiResponse;
use crate::audit::{AuditEntry, AuditSink};
use crate::error::{FiberError, FiberResult};
use crate::identity::{Role, USER_ID_HEADER, USER_ROLES_HEADER};
use async_trait::async_trait;
use fibernet_types::{
    Asset, AssetStatus, Customer, CustomerAssignment, CustomerId, CustomerStatus, HierarchyNode,
    NodeId, PortReservation, ReservationId, ReservePortRequest, StatusChangeRequest, SubtreeNode,
};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// JSON-over-HTTP client for one collaborator.
#[derive(Debug, Clone)]
pub struct HttpClient {
    service: String,
    base_url: String,
    caller_id: String,
    client: reqwest::Client,
}

impl HttpClient {
    /// Creates a client for `service` at `base_url`.
    ///
    /// `caller_id` identifies this process on read requests; mutating
    /// requests carry the acting user instead.
    pub fn new(
        service: impl Into<String>,
        base_url: impl Into<String>,
        caller_id: impl Into<String>,
        timeout: Duration,
    ) -> FiberResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FiberError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            service: service.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            caller_id: caller_id.into(),
            client,
        })
    }

    fn request(&self, method: Method, path: &str, actor: Option<&str>) -> RequestBuilder {
        let actor = actor.unwrap_or(&self.caller_id);
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(USER_ID_HEADER, actor)
            .header(USER_ROLES_HEADER, Role::Service.as_str())
    }

    /// GET `path` and unwrap the response envelope.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> FiberResult<T> {
        self.send(self.request(Method::GET, path, None)).await
    }

    /// Send `body` with `method` on behalf of `actor`.
    pub async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        actor: &str,
        body: &B,
    ) -> FiberResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.send(self.request(method, path, Some(actor)).json(body))
            .await
    }

    /// DELETE `path` on behalf of `actor`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, actor: &str) -> FiberResult<T> {
        self.send(self.request(Method::DELETE, path, Some(actor)))
            .await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> FiberResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| FiberError::unreachable(&self.service, e.to_string()))?;
        let status = response.status();

        if status.is_success() {
            let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
                self.remote_error(status, None, format!("invalid response body: {}", e))
            })?;
            return envelope
                .data
                .ok_or_else(|| self.remote_error(status, None, "response carried no data".into()));
        }

        let body = response
            .json::<ApiResponse<serde_json::Value>>()
            .await
            .ok()
            .and_then(|envelope| envelope.error);
        let message = body
            .as_ref()
            .map(|b| b.message.clone())
            .unwrap_or_else(|| status.to_string());
        debug!(service = %self.service, status = status.as_u16(), %message, "Remote call failed");

        if status == StatusCode::NOT_FOUND {
            return Err(FiberError::RemoteNotFound {
                service: self.service.clone(),
                message,
            });
        }
        Err(self.remote_error(status, body.map(|b| b.kind), message))
    }

    fn remote_error(
        &self,
        status: StatusCode,
        remote_kind: Option<crate::error::ErrorKind>,
        message: String,
    ) -> FiberError {
        FiberError::ServiceCommunication {
            service: self.service.clone(),
            status: Some(status.as_u16()),
            remote_kind,
            message,
        }
    }
}

/// Resource Ledger over HTTP.
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    http: HttpClient,
}

impl HttpLedgerClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignAssetBody {
    customer_id: CustomerId,
}

#[derive(Serialize)]
struct ReclaimBody {
    status: AssetStatus,
}

#[async_trait]
impl LedgerApi for HttpLedgerClient {
    async fn get_node(&self, id: NodeId) -> FiberResult<HierarchyNode> {
        self.http.get(&format!("/api/inventory/nodes/{}", id)).await
    }

    async fn get_node_by_serial(&self, serial: &str) -> FiberResult<HierarchyNode> {
        self.http
            .get(&format!("/api/inventory/nodes/serial/{}", urlencoding::encode(serial)))
            .await
    }

    async fn subtree(&self, root: NodeId) -> FiberResult<SubtreeNode> {
        self.http
            .get(&format!("/api/inventory/nodes/{}/subtree", root))
            .await
    }

    async fn get_asset_by_serial(&self, serial: &str) -> FiberResult<Asset> {
        self.http
            .get(&format!("/api/inventory/assets/serial/{}", urlencoding::encode(serial)))
            .await
    }

    async fn list_reservations(&self, splitter: NodeId) -> FiberResult<Vec<PortReservation>> {
        self.http
            .get(&format!("/api/inventory/splitters/{}/reservations", splitter))
            .await
    }

    async fn reserve_port(
        &self,
        actor: &str,
        splitter: NodeId,
        request: &ReservePortRequest,
    ) -> FiberResult<PortReservation> {
        self.http
            .send_json(
                Method::POST,
                &format!("/api/inventory/splitters/{}/reservations", splitter),
                actor,
                request,
            )
            .await
    }

    async fn release_port(&self, actor: &str, reservation: ReservationId) -> FiberResult<bool> {
        self.http
            .delete(&format!("/api/inventory/reservations/{}", reservation), actor)
            .await
    }

    async fn assets_for_customer(&self, customer: CustomerId) -> FiberResult<Vec<Asset>> {
        self.http
            .get(&format!("/api/inventory/customers/{}/assets", customer))
            .await
    }

    async fn assign_asset(
        &self,
        actor: &str,
        serial: &str,
        customer: CustomerId,
    ) -> FiberResult<Asset> {
        self.http
            .send_json(
                Method::POST,
                &format!("/api/inventory/assets/serial/{}/assign", urlencoding::encode(serial)),
                actor,
                &AssignAssetBody {
                    customer_id: customer,
                },
            )
            .await
    }

    async fn unassign_assets(
        &self,
        actor: &str,
        customer: CustomerId,
        status: AssetStatus,
    ) -> FiberResult<Vec<Asset>> {
        self.http
            .send_json(
                Method::POST,
                &format!("/api/inventory/customers/{}/assets/reclaim", customer),
                actor,
                &ReclaimBody { status },
            )
            .await
    }
}

/// Customer State Machine over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCustomerClient {
    http: HttpClient,
}

impl HttpCustomerClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CustomerApi for HttpCustomerClient {
    async fn get_assignment(&self, customer: CustomerId) -> FiberResult<CustomerAssignment> {
        self.http
            .get(&format!("/api/customers/{}/assignment", customer))
            .await
    }

    async fn customers_by_splitter(
        &self,
        splitter: NodeId,
    ) -> FiberResult<Vec<CustomerAssignment>> {
        self.http
            .get(&format!("/api/customers/by-splitter/{}", splitter))
            .await
    }

    async fn transition(
        &self,
        actor: &str,
        customer: CustomerId,
        status: CustomerStatus,
        reason: Option<&str>,
    ) -> FiberResult<Customer> {
        self.http
            .send_json(
                Method::PUT,
                &format!("/api/customers/{}/status", customer),
                actor,
                &StatusChangeRequest {
                    status,
                    reason: reason.map(str::to_string),
                },
            )
            .await
    }
}

/// Audit collaborator over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAuditSink {
    http: HttpClient,
}

impl HttpAuditSink {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn record(&self, entry: AuditEntry) -> FiberResult<()> {
        let actor = entry.actor_id.clone();
        let _: AuditEntry = self
            .http
            .send_json(Method::POST, "/api/audit", &actor, &entry)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ok, ApiError, ApiResult};
    use crate::error::ErrorKind;
    use axum::{extract::Path, routing::get, Router};

    async fn node(Path(id): Path<u64>) -> ApiResult<HierarchyNode> {
        match id {
            404 => Err(ApiError(FiberError::not_found("Node", id))),
            500 => Err(ApiError(FiberError::internal("disk on fire"))),
            _ => ok(HierarchyNode {
                id: NodeId(id),
                asset_id: fibernet_types::AssetId(id),
                level: fibernet_types::HierarchyLevel::Headend,
                serial_number: "HE-1".to_string(),
                model: "Infrastructure".to_string(),
                name: "H1".to_string(),
                locality: None,
                parent_id: None,
                ports: None,
            }),
        }
    }

    async fn serve() -> String {
        let app = Router::new().route("/api/inventory/nodes/{id}", get(node));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn ledger(base: &str) -> HttpLedgerClient {
        HttpLedgerClient::new(
            HttpClient::new("inventory", base, "test", Duration::from_millis(500)).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_success_unwraps_envelope() {
        let base = serve().await;
        let node = ledger(&base).get_node(NodeId(7)).await.unwrap();
        assert_eq!(node.id, NodeId(7));
    }

    #[tokio::test]
    async fn test_remote_404_is_not_found() {
        let base = serve().await;
        let err = ledger(&base).get_node(NodeId(404)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("Node '404' not found"));
    }

    #[tokio::test]
    async fn test_remote_500_is_service_communication() {
        let base = serve().await;
        let err = ledger(&base).get_node(NodeId(500)).await.unwrap_err();
        match err {
            FiberError::ServiceCommunication {
                status,
                remote_kind,
                ..
            } => {
                assert_eq!(status, Some(500));
                assert_eq!(remote_kind, Some(ErrorKind::Internal));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remote_404_on_mutation_is_not_found() {
        use axum::routing::put;

        async fn status(Path(id): Path<u64>) -> ApiResult<Customer> {
            Err(ApiError(FiberError::not_found("Customer", id)))
        }
        let app = Router::new().route("/api/customers/{id}/status", put(status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let customers = HttpCustomerClient::new(
            HttpClient::new(
                "customer",
                format!("http://{}", addr),
                "test",
                Duration::from_millis(500),
            )
            .unwrap(),
        );
        let err = customers
            .transition("support-3", CustomerId(77), CustomerStatus::Inactive, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unreachable_is_service_communication() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = ledger(&format!("http://{}", addr))
            .get_node(NodeId(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceCommunication);
        assert_eq!(err.code(), "SERVICE_UNREACHABLE");
    }

    #[tokio::test]
    async fn test_serial_with_reserved_characters_stays_one_segment() {
        async fn by_serial(Path(serial): Path<String>) -> ApiResult<String> {
            ok(serial)
        }
        let app = Router::new().route("/api/inventory/assets/serial/{serial}", get(by_serial));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let http = HttpClient::new(
            "inventory",
            format!("http://{}", addr),
            "test",
            Duration::from_millis(500),
        )
        .unwrap();
        let path = format!("/api/inventory/assets/serial/{}", urlencoding::encode("ONT 1/a"));
        let echoed: String = http.get(&path).await.unwrap();
        assert_eq!(echoed, "ONT 1/a");
    }
}
