//! Identity-extraction middleware.
//!
//! There is no JWT validator in this workspace (see `context.rs`): the
//! headers below are trusted verbatim, the same way the teacher's
//! `auth_middleware` trusted a validated bearer token's claims.

use axum::{http::HeaderMap, middleware::Next, response::IntoResponse, response::Response};

use reconap_auth::{PrincipalId, Role};
use reconap_core::TenantId;

use crate::app::errors::ApiError;
use crate::context::{PrincipalContext, TenantContext};

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const PRINCIPAL_HEADER: &str = "x-principal-id";
pub const ROLES_HEADER: &str = "x-roles";

pub async fn identity_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    match extract_identity(req.headers()) {
        Ok((tenant, principal)) => {
            req.extensions_mut().insert(tenant);
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

fn extract_identity(headers: &HeaderMap) -> Result<(TenantContext, PrincipalContext), ApiError> {
    let tenant_id = header_str(headers, TENANT_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("missing x-tenant-id header".to_string()))?
        .parse::<TenantId>()
        .map_err(|_| ApiError::Unauthorized("x-tenant-id is not a valid tenant id".to_string()))?;

    let principal_id = header_str(headers, PRINCIPAL_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("missing x-principal-id header".to_string()))?
        .parse::<PrincipalId>()
        .map_err(|_| ApiError::Unauthorized("x-principal-id is not a valid principal id".to_string()))?;

    let roles = header_str(headers, ROLES_HEADER)
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Role::new(s.to_string()))
        .collect();

    Ok((TenantContext::new(tenant_id), PrincipalContext::new(principal_id, roles)))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
