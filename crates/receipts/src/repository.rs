use reconap_core::{PurchaseOrderId, ReceiptId, TenantId};
use reconap_store::{InMemoryTenantTable, Session};

use crate::receipt::Receipt;

#[derive(Clone, Default)]
pub struct ReceiptRepository {
    by_id: InMemoryTenantTable<ReceiptId, Receipt>,
}

impl ReceiptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, id: ReceiptId) -> Option<Receipt> {
        self.by_id.get(tenant_id, &id).map(|v| v.value)
    }

    pub fn list_by_po(&self, tenant_id: TenantId, po_id: PurchaseOrderId) -> Vec<Receipt> {
        self.by_id.scan(tenant_id, |r| r.po_id() == po_id)
    }

    pub fn stage_create(&self, session: &mut Session, receipt: Receipt) {
        use reconap_core::Entity;
        session.stage(
            self.by_id
                .stage_insert(receipt.tenant_id(), *receipt.id(), receipt),
        );
    }
}
