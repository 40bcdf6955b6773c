use reconap_core::{DateLocale, Money};

use crate::document::{CanonicalField, ColumnMapping};
use crate::normalize::{normalize_amount, normalize_currency, normalize_date, normalize_invoice_number, normalize_vendor_name};

/// One field-level problem found while validating a row. `row` and `column`
/// are 1-based, matching how a spreadsheet user would locate the cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row: u64,
    pub column: String,
    pub code: String,
    pub message: String,
    pub raw_value: String,
    pub suggested_fix: Option<String>,
}

/// An invoice row that has parsed and normalized cleanly. Still subject to
/// duplicate detection and PO-reference resolution before it is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInvoiceRow {
    pub row_number: u64,
    pub invoice_number: String,
    pub vendor_name: String,
    pub po_reference: Option<String>,
    pub invoice_date: chrono::NaiveDate,
    pub due_date: Option<chrono::NaiveDate>,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub currency: String,
    pub raw_row: serde_json::Value,
}

/// Parses and normalizes one CSV record into a [`ValidatedInvoiceRow`],
/// collecting every field-level error rather than stopping at the first one
/// so the error report can point a reviewer at everything wrong with a row
/// in one pass.
pub fn parse_invoice_row(
    record: &csv::StringRecord,
    headers: &[String],
    row_number: u64,
    mapping: &ColumnMapping,
    default_currency: &str,
    locale: DateLocale,
) -> Result<ValidatedInvoiceRow, Vec<RowError>> {
    let mut errors = Vec::new();
    let mut raw_row = serde_json::Map::new();
    let field_value = |field: CanonicalField| -> Option<&str> {
        headers
            .iter()
            .position(|h| mapping.field_for_header(h) == Some(field))
            .and_then(|idx| record.get(idx))
    };

    for (idx, header) in headers.iter().enumerate() {
        if let Some(value) = record.get(idx) {
            raw_row.insert(header.clone(), serde_json::Value::String(value.to_string()));
        }
    }

    let invoice_number = match field_value(CanonicalField::InvoiceNumber) {
        Some(raw) => match normalize_invoice_number(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                push_error(&mut errors, row_number, "invoice_number", raw, e.code, e.message, None);
                None
            }
        },
        None => {
            push_error(&mut errors, row_number, "invoice_number", "", "invoice_number_missing", "required column not present", None);
            None
        }
    };

    let vendor_name = match field_value(CanonicalField::VendorName) {
        Some(raw) if !raw.trim().is_empty() => Some(normalize_vendor_name(raw)),
        _ => {
            push_error(&mut errors, row_number, "vendor_name", "", "vendor_name_missing", "required column not present", None);
            None
        }
    };

    let po_reference = field_value(CanonicalField::PoReference)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let invoice_date = match field_value(CanonicalField::InvoiceDate) {
        Some(raw) => match normalize_date(raw, locale) {
            Ok(v) => Some(v),
            Err(e) => {
                push_error(&mut errors, row_number, "invoice_date", raw, e.code, e.message, Some("use ISO 8601 (YYYY-MM-DD)".to_string()));
                None
            }
        },
        None => {
            push_error(&mut errors, row_number, "invoice_date", "", "invoice_date_missing", "required column not present", None);
            None
        }
    };

    let due_date = match field_value(CanonicalField::DueDate).map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match normalize_date(raw, locale) {
            Ok(v) => Some(Some(v)),
            Err(e) => {
                push_error(&mut errors, row_number, "due_date", raw, e.code, e.message, None);
                None
            }
        },
        None => Some(None),
    };

    let subtotal = match field_value(CanonicalField::Subtotal) {
        Some(raw) => match normalize_amount(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                push_error(&mut errors, row_number, "subtotal", raw, e.code, e.message, None);
                None
            }
        },
        None => {
            push_error(&mut errors, row_number, "subtotal", "", "subtotal_missing", "required column not present", None);
            None
        }
    };

    let tax_amount = match field_value(CanonicalField::TaxAmount) {
        Some(raw) => match normalize_amount(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                push_error(&mut errors, row_number, "tax_amount", raw, e.code, e.message, None);
                None
            }
        },
        None => {
            push_error(&mut errors, row_number, "tax_amount", "", "tax_amount_missing", "required column not present", None);
            None
        }
    };

    let total_amount = match field_value(CanonicalField::TotalAmount) {
        Some(raw) => match normalize_amount(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                push_error(&mut errors, row_number, "total_amount", raw, e.code, e.message, None);
                None
            }
        },
        None => {
            push_error(&mut errors, row_number, "total_amount", "", "total_amount_missing", "required column not present", None);
            None
        }
    };

    let currency = match normalize_currency(field_value(CanonicalField::Currency), default_currency) {
        Ok(v) => Some(v),
        Err(e) => {
            push_error(&mut errors, row_number, "currency", field_value(CanonicalField::Currency).unwrap_or(""), e.code, e.message, None);
            None
        }
    };

    if let (Some(due), Some(invoice)) = (due_date.flatten(), invoice_date) {
        if due < invoice {
            push_error(&mut errors, row_number, "due_date", "", "due_before_invoice", "due_date must be on or after invoice_date", None);
        }
    }

    if let (Some(sub), Some(tax), Some(total)) = (subtotal, tax_amount, total_amount) {
        let expected = sub.checked_add(tax);
        let reconciles = expected.map(|e| e.abs_diff(total) <= Money::from_cents(1)).unwrap_or(false);
        if !reconciles {
            push_error(
                &mut errors,
                row_number,
                "total_amount",
                "",
                "total_does_not_reconcile",
                "total_amount must equal subtotal + tax_amount within 0.01",
                None,
            );
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedInvoiceRow {
        row_number,
        invoice_number: invoice_number.unwrap(),
        vendor_name: vendor_name.unwrap(),
        po_reference,
        invoice_date: invoice_date.unwrap(),
        due_date: due_date.unwrap(),
        subtotal: subtotal.unwrap(),
        tax_amount: tax_amount.unwrap(),
        total_amount: total_amount.unwrap(),
        currency: currency.unwrap(),
        raw_row: serde_json::Value::Object(raw_row),
    })
}

#[allow(clippy::too_many_arguments)]
fn push_error(errors: &mut Vec<RowError>, row: u64, column: &str, raw_value: &str, code: &str, message: impl Into<String>, suggested_fix: Option<String>) {
    errors.push(RowError {
        row,
        column: column.to_string(),
        code: code.to_string(),
        message: message.into(),
        raw_value: raw_value.to_string(),
        suggested_fix,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> ColumnMapping {
        ColumnMapping::new()
            .map("invoice_number", CanonicalField::InvoiceNumber)
            .map("vendor", CanonicalField::VendorName)
            .map("po_reference", CanonicalField::PoReference)
            .map("invoice_date", CanonicalField::InvoiceDate)
            .map("due_date", CanonicalField::DueDate)
            .map("subtotal", CanonicalField::Subtotal)
            .map("tax", CanonicalField::TaxAmount)
            .map("total", CanonicalField::TotalAmount)
            .map("currency", CanonicalField::Currency)
    }

    fn headers() -> Vec<String> {
        vec!["invoice_number", "vendor", "po_reference", "invoice_date", "due_date", "subtotal", "tax", "total", "currency"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn clean_row_parses() {
        let record = csv::StringRecord::from(vec!["INV-1001", "Acme Supply", "PO-1", "2026-01-10", "2026-02-10", "100.00", "10.00", "110.00", "USD"]);
        let row = parse_invoice_row(&record, &headers(), 2, &mapping(), "USD", DateLocale::Us).unwrap();
        assert_eq!(row.invoice_number, "INV-1001");
        assert_eq!(row.total_amount, Money::parse("110.00").unwrap());
    }

    #[test]
    fn due_date_before_invoice_date_is_rejected() {
        let record = csv::StringRecord::from(vec!["INV-1001", "Acme Supply", "", "2026-01-10", "2026-01-01", "100.00", "10.00", "110.00", "USD"]);
        let errors = parse_invoice_row(&record, &headers(), 2, &mapping(), "USD", DateLocale::Us).unwrap_err();
        assert!(errors.iter().any(|e| e.code == "due_before_invoice"));
    }

    #[test]
    fn total_mismatch_is_rejected() {
        let record = csv::StringRecord::from(vec!["INV-1001", "Acme Supply", "", "2026-01-10", "", "100.00", "10.00", "200.00", "USD"]);
        let errors = parse_invoice_row(&record, &headers(), 2, &mapping(), "USD", DateLocale::Us).unwrap_err();
        assert!(errors.iter().any(|e| e.code == "total_does_not_reconcile"));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let record = csv::StringRecord::from(vec!["", "Acme Supply", "", "2026-01-10", "", "100.00", "10.00", "110.00", "USD"]);
        let errors = parse_invoice_row(&record, &headers(), 2, &mapping(), "USD", DateLocale::Us).unwrap_err();
        assert!(errors.iter().any(|e| e.code == "invoice_number_empty"));
    }
}
