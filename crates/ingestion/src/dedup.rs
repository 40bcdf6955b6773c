use std::collections::HashSet;

use reconap_core::InvoiceId;

use crate::row::ValidatedInvoiceRow;

/// Outcome of duplicate detection for one validated row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateOutcome {
    Unique,
    DuplicateInBatch,
    DuplicateExisting(InvoiceId),
}

/// Tracks `(invoice_number, vendor_name)` seen so far within one import, so
/// later rows sharing a key with an earlier row in the same file are marked
/// `duplicate_in_batch` — the earlier occurrence wins and is the only one
/// that can still be persisted.
#[derive(Debug, Default)]
pub struct InBatchDuplicateTracker {
    seen: HashSet<(String, String)>,
}

impl InBatchDuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks `row` against rows already observed and against the
    /// tenant's existing persisted invoices (`existing_lookup`), in that
    /// order — cross-batch duplicates only matter once in-batch ones are
    /// ruled out. Marks `row` as seen regardless of outcome so a later row
    /// with the same key is always `duplicate_in_batch`, not
    /// `duplicate_existing`.
    pub fn check(&mut self, row: &ValidatedInvoiceRow, existing_lookup: impl Fn(&str, &str) -> Option<InvoiceId>) -> DuplicateOutcome {
        let key = (row.invoice_number.clone(), row.vendor_name.clone());
        if self.seen.contains(&key) {
            return DuplicateOutcome::DuplicateInBatch;
        }
        self.seen.insert(key);

        if let Some(existing_id) = existing_lookup(&row.invoice_number, &row.vendor_name) {
            return DuplicateOutcome::DuplicateExisting(existing_id);
        }
        DuplicateOutcome::Unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use reconap_core::Money;

    fn row(invoice_number: &str, vendor: &str) -> ValidatedInvoiceRow {
        ValidatedInvoiceRow {
            row_number: 1,
            invoice_number: invoice_number.to_string(),
            vendor_name: vendor.to_string(),
            po_reference: None,
            invoice_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            due_date: None,
            subtotal: Money::parse("100.00").unwrap(),
            tax_amount: Money::ZERO,
            total_amount: Money::parse("100.00").unwrap(),
            currency: "USD".to_string(),
            raw_row: serde_json::json!({}),
        }
    }

    #[test]
    fn second_occurrence_in_same_batch_is_marked_duplicate() {
        let mut tracker = InBatchDuplicateTracker::new();
        assert_eq!(tracker.check(&row("INV-1", "Acme"), |_, _| None), DuplicateOutcome::Unique);
        assert_eq!(tracker.check(&row("INV-1", "Acme"), |_, _| None), DuplicateOutcome::DuplicateInBatch);
    }

    #[test]
    fn different_vendor_is_not_a_duplicate() {
        let mut tracker = InBatchDuplicateTracker::new();
        assert_eq!(tracker.check(&row("INV-1", "Acme"), |_, _| None), DuplicateOutcome::Unique);
        assert_eq!(tracker.check(&row("INV-1", "Other Co"), |_, _| None), DuplicateOutcome::Unique);
    }

    #[test]
    fn cross_batch_collision_is_marked_existing() {
        let mut tracker = InBatchDuplicateTracker::new();
        let existing_id = InvoiceId::new();
        let outcome = tracker.check(&row("INV-1", "Acme"), |_, _| Some(existing_id));
        assert_eq!(outcome, DuplicateOutcome::DuplicateExisting(existing_id));
    }
}
