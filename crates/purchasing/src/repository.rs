use reconap_core::{DomainError, DomainResult, Entity, PurchaseOrderId, TenantId, VendorId};
use reconap_store::{InMemoryTenantTable, InMemoryUniqueIndex, Session, StoreError};

use crate::purchase_order::PurchaseOrder;

#[derive(Clone, Default)]
pub struct PurchaseOrderRepository {
    by_id: InMemoryTenantTable<PurchaseOrderId, PurchaseOrder>,
    by_po_number: InMemoryUniqueIndex<String, PurchaseOrderId>,
}

impl PurchaseOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, id: PurchaseOrderId) -> Option<PurchaseOrder> {
        self.by_id.get(tenant_id, &id).map(|v| v.value)
    }

    pub fn get_versioned(&self, tenant_id: TenantId, id: PurchaseOrderId) -> Option<(PurchaseOrder, u64)> {
        self.by_id.get(tenant_id, &id).map(|v| (v.value, v.version))
    }

    pub fn find_by_po_number(&self, tenant_id: TenantId, po_number: &str) -> Option<PurchaseOrder> {
        let id = self.by_po_number.get(tenant_id, &po_number.to_string())?;
        self.get(tenant_id, id)
    }

    /// Candidate purchase orders for a vendor that could still receive a
    /// matching invoice — not yet closed or cancelled.
    pub fn list_open_by_vendor(&self, tenant_id: TenantId, vendor_id: VendorId) -> Vec<PurchaseOrder> {
        use crate::purchase_order::PurchaseOrderStatus;
        self.by_id.scan(tenant_id, |po| {
            po.vendor_id() == vendor_id
                && !matches!(po.status(), PurchaseOrderStatus::Closed | PurchaseOrderStatus::Cancelled)
        })
    }

    pub fn stage_create(&self, session: &mut Session, po: PurchaseOrder) {
        session.stage(self.by_id.stage_insert(po.tenant_id(), *po.id(), po.clone()));
        session.stage(
            self.by_po_number
                .stage_claim(po.tenant_id(), po.po_number().to_string(), *po.id()),
        );
    }

    pub fn stage_update(
        &self,
        session: &mut Session,
        tenant_id: TenantId,
        id: PurchaseOrderId,
        expected_version: u64,
        po: PurchaseOrder,
    ) {
        session.stage(self.by_id.stage_update(tenant_id, id, expected_version, po));
    }

    pub fn create_now(&self, tenant_id: TenantId, po: PurchaseOrder) -> DomainResult<()> {
        self.by_id
            .insert_now(tenant_id, *po.id(), po.clone())
            .map_err(map_store_error)?;
        self.by_po_number
            .claim_now(tenant_id, po.po_number().to_string(), *po.id())
            .map_err(map_store_error)
    }
}

fn map_store_error(err: StoreError) -> DomainError {
    match err {
        StoreError::DuplicateKey => DomainError::conflict("purchase order number already exists"),
        StoreError::Conflict { .. } => DomainError::conflict("purchase order changed concurrently"),
        StoreError::NotFound => DomainError::not_found(),
        other => DomainError::invariant(other.to_string()),
    }
}
