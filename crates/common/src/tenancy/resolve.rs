//! Request → tenant resolution

use super::{SchemaName, PUBLIC_SCHEMA};
use crate::db::models::Center;
use crate::db::{DbPool, Repository};
use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use serde::Serialize;
use uuid::Uuid;

/// The center a request (or an administrative task) is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    pub center_id: Uuid,
    pub center_name: String,
    pub schema_name: SchemaName,
}

impl TenantContext {
    /// Build the context for a stored center
    pub fn from_center(center: &Center) -> Result<Self> {
        Ok(Self {
            center_id: center.id,
            center_name: center.name.clone(),
            schema_name: SchemaName::parse(center.schema_name.clone())?,
        })
    }
}

/// Where a request's host points: a registered center, or the shared schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestScope {
    /// Host unknown (or absent); only shared-schema operations apply
    Public { host: Option<String> },
    /// Host registered as a domain of this center
    Tenant(TenantContext),
}

impl RequestScope {
    /// Schema the request's data lives in
    pub fn schema_name(&self) -> &str {
        match self {
            RequestScope::Public { .. } => PUBLIC_SCHEMA,
            RequestScope::Tenant(tenant) => tenant.schema_name.as_str(),
        }
    }

    /// The resolved tenant, if any
    pub fn tenant(&self) -> Option<&TenantContext> {
        match self {
            RequestScope::Public { .. } => None,
            RequestScope::Tenant(tenant) => Some(tenant),
        }
    }

    /// Require a tenant, failing with `TenantNotFound` on shared-schema hosts
    pub fn into_tenant(self) -> Result<TenantContext> {
        match self {
            RequestScope::Tenant(tenant) => Ok(tenant),
            RequestScope::Public { host } => Err(AppError::TenantNotFound {
                host: host.unwrap_or_default(),
            }),
        }
    }
}

/// Normalize a `Host` header value for domain lookup
///
/// Lower-cases, strips a trailing port and a trailing dot. Bracketed IPv6
/// literals keep their brackets. Returns `None` for an empty host.
pub fn normalize_host(raw: &str) -> Option<String> {
    let raw = raw.trim();

    let host = if raw.starts_with('[') {
        match raw.find(']') {
            Some(end) => &raw[..=end],
            None => raw,
        }
    } else {
        match raw.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
            _ => raw,
        }
    };

    let host = host.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

fn request_host(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.host())
        .and_then(normalize_host)
}

/// Axum extractor resolving the request host to a [`RequestScope`]
///
/// The result is cached in the request extensions so a handler that also
/// extracts [`TenantContext`] triggers a single lookup.
impl<S> FromRequestParts<S> for RequestScope
where
    DbPool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        if let Some(scope) = parts.extensions.get::<RequestScope>() {
            return Ok(scope.clone());
        }

        let scope = match request_host(parts) {
            None => RequestScope::Public { host: None },
            Some(host) => {
                let repo = Repository::new(DbPool::from_ref(state));
                match repo.resolve_tenant(&host).await? {
                    Some(center) => {
                        let tenant = TenantContext::from_center(&center)?;
                        tracing::debug!(
                            host = %host,
                            schema = %tenant.schema_name,
                            "Resolved tenant"
                        );
                        RequestScope::Tenant(tenant)
                    }
                    None => RequestScope::Public { host: Some(host) },
                }
            }
        };

        parts.extensions.insert(scope.clone());
        Ok(scope)
    }
}

/// Axum extractor requiring the request host to belong to a center
impl<S> FromRequestParts<S> for TenantContext
where
    DbPool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        RequestScope::from_request_parts(parts, state)
            .await?
            .into_tenant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host_strips_port_and_case() {
        assert_eq!(normalize_host("LabX.localhost:8000").as_deref(), Some("labx.localhost"));
        assert_eq!(normalize_host("acme.localhost").as_deref(), Some("acme.localhost"));
        assert_eq!(normalize_host("acme.localhost.").as_deref(), Some("acme.localhost"));
    }

    #[test]
    fn test_normalize_host_ipv6() {
        assert_eq!(normalize_host("[::1]:8000").as_deref(), Some("[::1]"));
        assert_eq!(normalize_host("[::1]").as_deref(), Some("[::1]"));
    }

    #[test]
    fn test_normalize_host_empty() {
        assert_eq!(normalize_host(""), None);
        assert_eq!(normalize_host("   "), None);
        assert_eq!(normalize_host(":8000"), None);
    }

    #[test]
    fn test_public_scope_reports_public_schema() {
        let scope = RequestScope::Public { host: Some("unknown.example".into()) };
        assert_eq!(scope.schema_name(), PUBLIC_SCHEMA);
        assert!(scope.tenant().is_none());

        let err = scope.into_tenant().unwrap_err();
        assert!(matches!(err, AppError::TenantNotFound { ref host } if host == "unknown.example"));
    }

    #[test]
    fn test_tenant_scope_reports_center_schema() {
        let tenant = TenantContext {
            center_id: Uuid::new_v4(),
            center_name: "Acme".into(),
            schema_name: SchemaName::parse("acme").unwrap(),
        };
        let scope = RequestScope::Tenant(tenant.clone());
        assert_eq!(scope.schema_name(), "acme");
        assert_eq!(scope.into_tenant().unwrap(), tenant);
    }
}
