use reconap_core::{DomainError, DomainResult, TenantId, VendorId};
use reconap_store::{InMemoryTenantTable, InMemoryUniqueIndex, Session, StoreError};

use crate::vendor::Vendor;

/// Tenant-scoped vendor repository.
///
/// Enforces the `(tenant, normalized_name)` uniqueness constraint via a
/// secondary index alongside the primary versioned table, and stages both
/// writes onto a caller-supplied [`Session`] so a vendor write can commit
/// atomically alongside other entities (e.g. registering a vendor inline
/// while ingesting a CSV row that references it for the first time).
#[derive(Clone, Default)]
pub struct VendorRepository {
    by_id: InMemoryTenantTable<VendorId, Vendor>,
    by_normalized_name: InMemoryUniqueIndex<String, VendorId>,
}

impl VendorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, id: VendorId) -> Option<Vendor> {
        self.by_id.get(tenant_id, &id).map(|v| v.value)
    }

    pub fn find_by_normalized_name(&self, tenant_id: TenantId, normalized_name: &str) -> Option<Vendor> {
        let id = self.by_normalized_name.get(tenant_id, &normalized_name.to_string())?;
        self.get(tenant_id, id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<Vendor> {
        self.by_id.list(tenant_id).into_iter().map(|v| v.value).collect()
    }

    /// Stage the creation of a brand-new vendor. Fails validation at
    /// `session.commit()` if the vendor id or its normalized name is
    /// already taken.
    pub fn stage_create(&self, session: &mut Session, vendor: Vendor) {
        session.stage(
            self.by_id
                .stage_insert(vendor.tenant_id(), *vendor.id(), vendor.clone()),
        );
        session.stage(self.by_normalized_name.stage_claim(
            vendor.tenant_id(),
            vendor.normalized_name().to_string(),
            *vendor.id(),
        ));
    }

    /// Stage an update to an existing vendor, read at `expected_version`.
    ///
    /// Renaming a vendor does not re-stage the normalized-name index: the
    /// spec's uniqueness constraint is enforced at creation time, and a
    /// free-standing index update here could race an unrelated insert.
    /// Operators renaming a vendor into collision with another are expected
    /// to resolve it explicitly (merge, not silently overwrite).
    pub fn stage_update(
        &self,
        session: &mut Session,
        tenant_id: TenantId,
        id: VendorId,
        expected_version: u64,
        vendor: Vendor,
    ) {
        session.stage(self.by_id.stage_update(tenant_id, id, expected_version, vendor));
    }

    pub fn create_now(&self, tenant_id: TenantId, vendor: Vendor) -> DomainResult<()> {
        self.by_id
            .insert_now(tenant_id, *vendor.id(), vendor.clone())
            .map_err(map_store_error)?;
        self.by_normalized_name
            .claim_now(tenant_id, vendor.normalized_name().to_string(), *vendor.id())
            .map_err(map_store_error)
    }
}

fn map_store_error(err: StoreError) -> DomainError {
    match err {
        StoreError::DuplicateKey => DomainError::conflict("vendor already exists"),
        StoreError::Conflict { .. } => DomainError::conflict("vendor changed concurrently"),
        StoreError::NotFound => DomainError::not_found(),
        other => DomainError::invariant(other.to_string()),
    }
}
