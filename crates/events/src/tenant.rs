use reconap_core::TenantId;

use crate::EventEnvelope;

/// Helper trait for tenant-scoped messages.
///
/// Marks types that carry an associated tenant id, enabling tenant-aware
/// filtering in subscribers (e.g. a worker pinned to a single tenant rejects
/// messages belonging to any other tenant as defense in depth).
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

impl<E> TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id()
    }
}
