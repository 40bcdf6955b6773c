use reconap_core::{DomainError, DomainResult, Entity, InvoiceId, TenantId, VendorId};
use reconap_store::{InMemoryTenantTable, InMemoryUniqueIndex, Session, StoreError};

use crate::invoice::Invoice;

/// Business key for an invoice: `(invoice_number, vendor)`, unique per
/// tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InvoiceBusinessKey {
    pub invoice_number: String,
    pub vendor_id: VendorId,
}

#[derive(Clone, Default)]
pub struct InvoiceRepository {
    by_id: InMemoryTenantTable<InvoiceId, Invoice>,
    by_business_key: InMemoryUniqueIndex<InvoiceBusinessKey, InvoiceId>,
}

impl InvoiceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, id: InvoiceId) -> Option<Invoice> {
        self.by_id.get(tenant_id, &id).map(|v| v.value)
    }

    pub fn get_versioned(&self, tenant_id: TenantId, id: InvoiceId) -> Option<(Invoice, u64)> {
        self.by_id.get(tenant_id, &id).map(|v| (v.value, v.version))
    }

    pub fn find_by_business_key(&self, tenant_id: TenantId, invoice_number: &str, vendor_id: VendorId) -> Option<Invoice> {
        let key = InvoiceBusinessKey {
            invoice_number: invoice_number.to_string(),
            vendor_id,
        };
        let id = self.by_business_key.get(tenant_id, &key)?;
        self.get(tenant_id, id)
    }

    /// All non-cancelled invoices for a vendor, the candidate pool the
    /// matching engine scans before narrowing by amount/date/currency.
    pub fn list_by_vendor(&self, tenant_id: TenantId, vendor_id: VendorId) -> Vec<Invoice> {
        self.by_id.scan(tenant_id, |inv| inv.vendor_id() == vendor_id)
    }

    pub fn list_open_matching_work(&self, tenant_id: TenantId) -> Vec<Invoice> {
        use crate::invoice::MatchingStatus;
        self.by_id.scan(tenant_id, |inv| {
            matches!(inv.matching_status(), MatchingStatus::Unmatched | MatchingStatus::InProgress)
        })
    }

    pub fn stage_create(&self, session: &mut Session, invoice: Invoice) {
        let key = InvoiceBusinessKey {
            invoice_number: invoice.invoice_number().to_string(),
            vendor_id: invoice.vendor_id(),
        };
        session.stage(
            self.by_id
                .stage_insert(invoice.tenant_id(), *invoice.id(), invoice.clone()),
        );
        session.stage(self.by_business_key.stage_claim(invoice.tenant_id(), key, *invoice.id()));
    }

    pub fn stage_update(
        &self,
        session: &mut Session,
        tenant_id: TenantId,
        id: InvoiceId,
        expected_version: u64,
        invoice: Invoice,
    ) {
        session.stage(self.by_id.stage_update(tenant_id, id, expected_version, invoice));
    }

    pub fn create_now(&self, tenant_id: TenantId, invoice: Invoice) -> DomainResult<()> {
        let key = InvoiceBusinessKey {
            invoice_number: invoice.invoice_number().to_string(),
            vendor_id: invoice.vendor_id(),
        };
        self.by_id
            .insert_now(tenant_id, *invoice.id(), invoice.clone())
            .map_err(map_store_error)?;
        self.by_business_key
            .claim_now(tenant_id, key, *invoice.id())
            .map_err(map_store_error)
    }
}

fn map_store_error(err: StoreError) -> DomainError {
    match err {
        StoreError::DuplicateKey => DomainError::conflict("invoice already exists for this vendor"),
        StoreError::Conflict { .. } => DomainError::conflict("invoice changed concurrently"),
        StoreError::NotFound => DomainError::not_found(),
        other => DomainError::invariant(other.to_string()),
    }
}
