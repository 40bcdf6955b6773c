//! Per-request identity, derived from headers set by the upstream
//! authentication subsystem rather than validated here.
//!
//! Per spec.md §6, end-user authentication and JWT verification are an
//! external collaborator's responsibility: the gateway in front of this
//! service terminates auth and forwards the already-verified
//! `(tenant_id, principal_id, roles)` triple as request headers. This crate
//! trusts those headers and builds the tenant-isolation and authorization
//! context from them.

use reconap_auth::{PrincipalId, Role};
use reconap_core::TenantId;

/// Tenant context for a request. Immutable and required on every
/// tenant-scoped route.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Authenticated principal for a request: identity plus the roles the
/// upstream collaborator asserts for this tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
