//! Auth context middleware.
//!
//! Extracts caller identity (tenant_id, user_id, role) from request
//! headers. These headers are set by the gateway after authenticating
//! the caller and validating their tenant membership, so a missing or
//! malformed header means the request did not come through the gateway.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

/// Caller role as asserted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Staff,
    Customer,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "staff" => Some(Role::Staff),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }
}

/// Authenticated caller context extracted from request headers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    /// Staff act on any customer; customers only on themselves.
    pub fn authorize_customer(&self, customer_id: Uuid) -> Result<(), AppError> {
        if self.is_staff() || self.user_id == customer_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(anyhow::anyhow!(
                "Not permitted to access this customer's data"
            )))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!(
                "Missing {} header (required from gateway)",
                name
            ))
        })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header(parts, "X-Tenant-ID")?.parse::<Uuid>().map_err(|_| {
            AppError::Unauthorized(anyhow::anyhow!("Invalid X-Tenant-ID header"))
        })?;

        let user_id = header(parts, "X-User-ID")?.parse::<Uuid>().map_err(|_| {
            AppError::Unauthorized(anyhow::anyhow!("Invalid X-User-ID header"))
        })?;

        let role = Role::from_str(header(parts, "X-Role")?)
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid X-Role header")))?;

        // Add to tracing span for observability
        let span = tracing::Span::current();
        span.record("tenant_id", tenant_id.to_string().as_str());
        span.record("user_id", user_id.to_string().as_str());

        Ok(AuthContext {
            tenant_id,
            user_id,
            role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_known_values() {
        assert_eq!(Role::from_str("staff"), Some(Role::Staff));
        assert_eq!(Role::from_str("customer"), Some(Role::Customer));
        assert_eq!(Role::from_str("admin"), None);
    }

    #[test]
    fn staff_may_access_any_customer() {
        let ctx = AuthContext {
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: Role::Staff,
        };
        assert!(ctx.authorize_customer(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn customer_limited_to_own_data() {
        let user_id = Uuid::new_v4();
        let ctx = AuthContext {
            tenant_id: Uuid::new_v4(),
            user_id,
            role: Role::Customer,
        };
        assert!(ctx.authorize_customer(user_id).is_ok());
        assert!(matches!(
            ctx.authorize_customer(Uuid::new_v4()),
            Err(AppError::Forbidden(_))
        ));
    }
}
