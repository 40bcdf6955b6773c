//! Authorization primitives consumed at the API boundary.
//!
//! Per spec.md §1/§6, end-user authentication (credential handling, MFA,
//! token issuance/verification) is an external collaborator: "the core
//! trusts this identity; it performs no credential handling itself." This
//! crate therefore only models the *policy* surface — principal identity,
//! roles, permissions, and a pure authorization check — operating on an
//! already-verified `(tenant_id, user_id, role)` triple.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError, Principal};
pub use permissions::Permission;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;
