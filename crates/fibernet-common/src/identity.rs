//! Caller identity attached by the gateway.
//!
//! The gateway authenticates users and forwards the result as two headers:
//! `X-User-Id` and a comma-separated `X-User-Roles`. Services trust these
//! headers and gate endpoints on role sets.

use crate::api::ApiError;
use crate::error::{FiberError, FiberResult};
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// Platform roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Planner,
    Technician,
    SupportAgent,
    /// Another fibernet service calling on a user's behalf.
    Service,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Planner => "PLANNER",
            Role::Technician => "TECHNICIAN",
            Role::SupportAgent => "SUPPORT_AGENT",
            Role::Service => "SERVICE",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = FiberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        match upper.strip_prefix("ROLE_").unwrap_or(&upper) {
            "ADMIN" => Ok(Role::Admin),
            "PLANNER" => Ok(Role::Planner),
            "TECHNICIAN" => Ok(Role::Technician),
            "SUPPORT_AGENT" => Ok(Role::SupportAgent),
            "SERVICE" => Ok(Role::Service),
            _ => Err(FiberError::validation("role", format!("unknown role '{}'", s))),
        }
    }
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub roles: Vec<Role>,
}

impl Caller {
    pub fn new(user_id: impl Into<String>, roles: &[Role]) -> Self {
        Self {
            user_id: user_id.into(),
            roles: roles.to_vec(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Fails with `Forbidden` unless the caller holds one of `allowed`.
    pub fn require_any(&self, allowed: &[Role]) -> FiberResult<()> {
        if allowed.iter().any(|r| self.has_role(*r)) {
            return Ok(());
        }
        let wanted: Vec<&str> = allowed.iter().map(Role::as_str).collect();
        Err(FiberError::Forbidden {
            message: format!(
                "user '{}' requires one of [{}]",
                self.user_id,
                wanted.join(", ")
            ),
        })
    }

    /// Reads the identity headers. Unknown roles are ignored.
    pub fn from_headers(headers: &HeaderMap) -> FiberResult<Self> {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| FiberError::Unauthorized {
                message: "missing X-User-Id header".to_string(),
            })?;

        let roles = headers
            .get(USER_ROLES_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .split(',')
            .filter(|r| !r.trim().is_empty())
            .filter_map(|r| match r.parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => {
                    debug!(role = r, "Ignoring unknown role");
                    None
                }
            })
            .collect();

        Ok(Self {
            user_id: user_id.to_string(),
            roles,
        })
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Caller::from_headers(&parts.headers).map_err(ApiError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::http::HeaderValue;

    fn headers(user: Option<&str>, roles: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(user) = user {
            headers.insert(USER_ID_HEADER, HeaderValue::from_str(user).unwrap());
        }
        headers.insert(USER_ROLES_HEADER, HeaderValue::from_str(roles).unwrap());
        headers
    }

    #[test]
    fn test_parse_roles() {
        let caller = Caller::from_headers(&headers(Some("alice"), "ADMIN, role_planner,bogus"))
            .unwrap();
        assert_eq!(caller.user_id, "alice");
        assert_eq!(caller.roles, vec![Role::Admin, Role::Planner]);
    }

    #[test]
    fn test_missing_user_is_unauthorized() {
        let err = Caller::from_headers(&headers(None, "ADMIN")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_require_any() {
        let caller = Caller::new("bob", &[Role::Technician]);
        assert!(caller.require_any(&[Role::Admin, Role::Technician]).is_ok());
        let err = caller.require_any(&[Role::Admin]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
