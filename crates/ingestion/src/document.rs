use std::collections::HashMap;

use crate::error::{IngestionError, IngestionResult};

/// The document type a CSV upload declares itself as. The full pipeline is
/// implemented for invoices; purchase-order and receipt uploads follow the
/// same parse/normalize/validate/window-commit shape against their own
/// canonical field sets, which is why `CanonicalField` and `ColumnMapping`
/// are not invoice-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Invoice,
    PurchaseOrder,
    Receipt,
}

/// Canonical fields an invoice CSV row maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    InvoiceNumber,
    VendorName,
    PoReference,
    InvoiceDate,
    DueDate,
    Subtotal,
    TaxAmount,
    TotalAmount,
    Currency,
}

impl CanonicalField {
    pub fn is_required(self) -> bool {
        !matches!(self, CanonicalField::PoReference | CanonicalField::DueDate | CanonicalField::Currency)
    }

    pub fn all_invoice_fields() -> &'static [CanonicalField] {
        &[
            CanonicalField::InvoiceNumber,
            CanonicalField::VendorName,
            CanonicalField::PoReference,
            CanonicalField::InvoiceDate,
            CanonicalField::DueDate,
            CanonicalField::Subtotal,
            CanonicalField::TaxAmount,
            CanonicalField::TotalAmount,
            CanonicalField::Currency,
        ]
    }
}

/// Declares which CSV header maps to which canonical field.
#[derive(Debug, Clone, Default)]
pub struct ColumnMapping {
    header_to_field: HashMap<String, CanonicalField>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(mut self, header: impl Into<String>, field: CanonicalField) -> Self {
        self.header_to_field.insert(header.into(), field);
        self
    }

    pub fn field_for_header(&self, header: &str) -> Option<CanonicalField> {
        self.header_to_field.get(header).copied()
    }

    /// Checks that every required invoice field has a header mapped to it.
    pub fn validate_for_invoice(&self, headers: &[String]) -> IngestionResult<()> {
        for header in self.header_to_field.keys() {
            if !headers.iter().any(|h| h == header) {
                return Err(IngestionError::UnknownHeader(header.clone()));
            }
        }
        let mapped_fields: std::collections::HashSet<CanonicalField> = self.header_to_field.values().copied().collect();
        for field in CanonicalField::all_invoice_fields() {
            if field.is_required() && !mapped_fields.contains(field) {
                return Err(IngestionError::UnknownHeader(format!("{field:?}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> ColumnMapping {
        ColumnMapping::new()
            .map("Invoice #", CanonicalField::InvoiceNumber)
            .map("Vendor", CanonicalField::VendorName)
            .map("Invoice Date", CanonicalField::InvoiceDate)
            .map("Subtotal", CanonicalField::Subtotal)
            .map("Tax", CanonicalField::TaxAmount)
            .map("Total", CanonicalField::TotalAmount)
    }

    #[test]
    fn validate_accepts_complete_mapping() {
        let headers = vec!["Invoice #", "Vendor", "Invoice Date", "Subtotal", "Tax", "Total"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        assert!(mapping().validate_for_invoice(&headers).is_ok());
    }

    #[test]
    fn validate_rejects_missing_required_field() {
        let incomplete = ColumnMapping::new().map("Invoice #", CanonicalField::InvoiceNumber);
        let headers = vec!["Invoice #".to_string()];
        assert!(incomplete.validate_for_invoice(&headers).is_err());
    }

    #[test]
    fn validate_rejects_header_not_present_in_file() {
        let headers = vec!["Invoice #".to_string()];
        assert!(mapping().validate_for_invoice(&headers).is_err());
    }
}
