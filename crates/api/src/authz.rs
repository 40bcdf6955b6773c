//! API-side authorization: maps the roles an upstream collaborator asserts
//! onto the permission set `reconap_auth::authorize` checks against, and
//! enforces that check at the handler boundary.
//!
//! `reconap-auth` deliberately carries no default role→permission mapping
//! (see its crate doc comment) since it only models the policy surface, not
//! a directory service. That mapping is a property of this deployment, so
//! it lives here.

use reconap_auth::{authorize, AuthzError, Permission, Principal, Role, TenantMembership};

use crate::context::{PrincipalContext, TenantContext};

/// Default roles this deployment recognizes, and the permissions each one
/// grants. `admin` is deliberately not a superset wildcard: every
/// permission it needs is listed explicitly so the table stays the
/// single source of truth for what a role can do.
fn default_role_permissions(role: &str) -> &'static [&'static str] {
    match role {
        "admin" => &[
            "vendors.read", "vendors.write",
            "purchase_orders.read", "purchase_orders.write",
            "receipts.read", "receipts.write",
            "invoices.read", "invoices.write",
            "imports.write",
            "matches.read", "matches.run", "matches.decide",
            "exceptions.read", "exceptions.claim", "exceptions.decide",
            "tolerances.read", "tolerances.write",
        ],
        "ap_clerk" => &[
            "vendors.read",
            "purchase_orders.read", "purchase_orders.write",
            "receipts.read", "receipts.write",
            "invoices.read", "invoices.write",
            "imports.write",
            "matches.read", "matches.run",
            "exceptions.read", "exceptions.claim",
        ],
        "approver" => &[
            "vendors.read",
            "purchase_orders.read",
            "receipts.read",
            "invoices.read",
            "matches.read", "matches.decide",
            "exceptions.read", "exceptions.claim", "exceptions.decide",
        ],
        "viewer" => &[
            "vendors.read", "purchase_orders.read", "receipts.read",
            "invoices.read", "matches.read", "exceptions.read", "tolerances.read",
        ],
        _ => &[],
    }
}

pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    use std::collections::HashSet;

    let mut granted: HashSet<&'static str> = HashSet::new();
    for role in roles {
        granted.extend(default_role_permissions(role.as_str()));
    }
    granted.into_iter().map(Permission::new).collect()
}

/// Checks that `principal` holds `required` within `tenant`. Intended to be
/// called at the top of every handler that mutates or reads tenant data,
/// before touching any repository.
pub fn require_permission(tenant: &TenantContext, principal: &PrincipalContext, required: &str) -> Result<(), AuthzError> {
    let membership = TenantMembership {
        tenant_id: tenant.tenant_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };
    let principal = Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership,
    };
    authorize(&principal, &Permission::new(required))
}
