use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use reconap_core::{DomainError, DomainResult, Entity, InvoiceId, Money, PurchaseOrderId, TenantId, VendorId};

/// Approval/lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Processing,
    Matched,
    Exception,
    Approved,
    Rejected,
    Cancelled,
}

/// Where this invoice currently stands with respect to the matching engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingStatus {
    Unmatched,
    InProgress,
    AutoMatched,
    RequiresReview,
    ManuallyMatched,
    Unmatchable,
}

/// Where an invoice entered the system from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportSource {
    CsvBatch,
    DirectApi,
}

/// An accounts-payable invoice awaiting reconciliation against a purchase
/// order and receipt.
///
/// `raw_row` preserves the original ingested representation (CSV row, or
/// the as-submitted API payload) verbatim, so a reviewer can always see
/// what was actually received independent of any normalization this crate
/// has since applied to the typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: TenantId,
    invoice_number: String,
    vendor_id: VendorId,
    po_id: Option<PurchaseOrderId>,
    subtotal: Money,
    tax_amount: Money,
    total_amount: Money,
    currency: String,
    invoice_date: NaiveDate,
    due_date: Option<NaiveDate>,
    received_date: NaiveDate,
    status: InvoiceStatus,
    matching_status: MatchingStatus,
    import_source: ImportSource,
    raw_row: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const TOTAL_TOLERANCE_CENTS: i64 = 1;

#[allow(clippy::too_many_arguments)]
impl Invoice {
    pub fn new(
        id: InvoiceId,
        tenant_id: TenantId,
        invoice_number: String,
        vendor_id: VendorId,
        po_id: Option<PurchaseOrderId>,
        subtotal: Money,
        tax_amount: Money,
        total_amount: Money,
        currency: String,
        invoice_date: NaiveDate,
        due_date: Option<NaiveDate>,
        received_date: NaiveDate,
        import_source: ImportSource,
        raw_row: serde_json::Value,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let invoice_number = invoice_number.trim().to_string();
        if invoice_number.is_empty() {
            return Err(DomainError::validation("invoice_number cannot be empty"));
        }
        if total_amount.is_negative() {
            return Err(DomainError::invariant("total_amount must be >= 0"));
        }
        let expected = subtotal
            .checked_add(tax_amount)
            .ok_or_else(|| DomainError::invariant("subtotal + tax_amount overflowed"))?;
        if expected.abs_diff(total_amount) > Money::from_cents(TOTAL_TOLERANCE_CENTS) {
            return Err(DomainError::invariant(
                "total_amount does not equal subtotal + tax within tolerance",
            ));
        }

        Ok(Self {
            id,
            tenant_id,
            invoice_number,
            vendor_id,
            po_id,
            subtotal,
            tax_amount,
            total_amount,
            currency: currency.to_uppercase(),
            invoice_date,
            due_date,
            received_date,
            status: InvoiceStatus::Pending,
            matching_status: MatchingStatus::Unmatched,
            import_source,
            raw_row,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn vendor_id(&self) -> VendorId {
        self.vendor_id
    }

    pub fn po_id(&self) -> Option<PurchaseOrderId> {
        self.po_id
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn tax_amount(&self) -> Money {
        self.tax_amount
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn invoice_date(&self) -> NaiveDate {
        self.invoice_date
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn received_date(&self) -> NaiveDate {
        self.received_date
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn matching_status(&self) -> MatchingStatus {
        self.matching_status
    }

    pub fn import_source(&self) -> ImportSource {
        self.import_source
    }

    pub fn raw_row(&self) -> &serde_json::Value {
        &self.raw_row
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            InvoiceStatus::Approved | InvoiceStatus::Rejected | InvoiceStatus::Cancelled
        )
    }

    /// Transition driven by the matching engine (C4). Never moves status
    /// past `matched`/`exception`; approve/reject is the exception queue's
    /// (C6) call.
    pub fn apply_matching_status(&mut self, matching_status: MatchingStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_terminal() {
            return Err(DomainError::conflict("invoice is in a terminal status"));
        }
        self.matching_status = matching_status;
        self.status = match matching_status {
            MatchingStatus::Unmatched | MatchingStatus::InProgress => InvoiceStatus::Processing,
            MatchingStatus::AutoMatched | MatchingStatus::ManuallyMatched => InvoiceStatus::Matched,
            MatchingStatus::RequiresReview | MatchingStatus::Unmatchable => InvoiceStatus::Exception,
        };
        self.updated_at = now;
        Ok(())
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_terminal() {
            return Err(DomainError::conflict("invoice is already in a terminal status"));
        }
        self.status = InvoiceStatus::Approved;
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.is_terminal() {
            return Err(DomainError::conflict("invoice is already in a terminal status"));
        }
        self.status = InvoiceStatus::Rejected;
        self.updated_at = now;
        Ok(())
    }

    /// Soft-delete: administrative cancellation never removes the row.
    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = InvoiceStatus::Cancelled;
        self.updated_at = now;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(total: &str, subtotal: &str, tax: &str) -> DomainResult<Invoice> {
        Invoice::new(
            InvoiceId::new(),
            TenantId::new(),
            "INV-1001".to_string(),
            VendorId::new(),
            None,
            Money::parse(subtotal).unwrap(),
            Money::parse(tax).unwrap(),
            Money::parse(total).unwrap(),
            "usd".to_string(),
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            None,
            NaiveDate::from_ymd_opt(2026, 1, 16).unwrap(),
            ImportSource::DirectApi,
            serde_json::json!({}),
            Utc::now(),
        )
    }

    #[test]
    fn new_uppercases_currency_and_defaults_status() {
        let invoice = sample("110.00", "100.00", "10.00").unwrap();
        assert_eq!(invoice.currency(), "USD");
        assert_eq!(invoice.status(), InvoiceStatus::Pending);
        assert_eq!(invoice.matching_status(), MatchingStatus::Unmatched);
    }

    #[test]
    fn new_rejects_total_outside_tolerance() {
        let err = sample("200.00", "100.00", "10.00").unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn new_accepts_total_within_one_cent_tolerance() {
        let invoice = sample("110.01", "100.00", "10.00").unwrap();
        assert_eq!(invoice.total_amount(), Money::parse("110.01").unwrap());
    }

    #[test]
    fn apply_matching_status_maps_to_invoice_status() {
        let mut invoice = sample("110.00", "100.00", "10.00").unwrap();
        invoice.apply_matching_status(MatchingStatus::AutoMatched, Utc::now()).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Matched);

        invoice.apply_matching_status(MatchingStatus::RequiresReview, Utc::now()).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Exception);
    }

    #[test]
    fn terminal_invoice_rejects_further_matching_transitions() {
        let mut invoice = sample("110.00", "100.00", "10.00").unwrap();
        invoice.approve(Utc::now()).unwrap();
        let err = invoice
            .apply_matching_status(MatchingStatus::AutoMatched, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn cancel_is_a_soft_delete() {
        let mut invoice = sample("110.00", "100.00", "10.00").unwrap();
        invoice.cancel(Utc::now());
        assert_eq!(invoice.status(), InvoiceStatus::Cancelled);
        assert!(invoice.is_terminal());
    }
}
