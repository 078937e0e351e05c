//! REST envelope shared by every fibernet service.
//!
//! Successful responses are wrapped in [`ApiResponse::success`]; errors are
//! rendered from [`FiberError`] into a structured [`ErrorBody`] carrying the
//! HTTP status, machine-readable kind, reason code and message.

use crate::error::{ErrorKind, FiberError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// JSON response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Success flag
    pub success: bool,
    /// Response data
    pub data: Option<T>,
    /// Error info if failed
    pub error: Option<ErrorBody>,
}

impl<T> ApiResponse<T> {
    /// Create successful response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create error response
    pub fn error(error: ErrorBody) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Structured error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code
    pub status: u16,
    /// Machine-readable kind
    pub kind: ErrorKind,
    /// Fine-grained reason code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl From<&FiberError> for ErrorBody {
    fn from(error: &FiberError) -> Self {
        Self {
            status: error.status_code(),
            kind: error.kind(),
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Handler error: a [`FiberError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub FiberError);

impl From<FiberError> for ApiError {
    fn from(error: FiberError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody::from(&self.0);
        let status =
            StatusCode::from_u16(body.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(kind = %body.kind, code = %body.code, error = %self.0, "Request failed");
        } else {
            debug!(kind = %body.kind, code = %body.code, error = %self.0, "Request rejected");
        }
        (status, Json(ApiResponse::<()>::error(body))).into_response()
    }
}

/// Handler result type.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wraps `data` in a successful response.
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

/// Liveness information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    pub status: String,
    pub version: String,
}

/// Handle /health endpoint
pub async fn health() -> Json<ApiResponse<HealthInfo>> {
    Json(ApiResponse::success(HealthInfo {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_error_response_body() {
        let response = ApiError(FiberError::PortConflict {
            splitter: "SPL-1".to_string(),
            port: 3,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ApiResponse<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
        assert!(!body.success);
        let error = body.error.unwrap();
        assert_eq!(error.kind, ErrorKind::Conflict);
        assert_eq!(error.code, "PORT_CONFLICT");
        assert_eq!(error.status, 409);
    }

    #[test]
    fn test_success_envelope() {
        let json = serde_json::to_value(ApiResponse::success(5)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 5);
        assert!(json["error"].is_null());
    }
}
