use chrono::{DateTime, Utc};

use reconap_core::{DateLocale, EngineConfig, Entity, TenantId, VendorId};
use reconap_invoicing::{ImportSource, Invoice, InvoiceRepository};
use reconap_store::{Isolation, Session};
use reconap_vendors::{Vendor, VendorRepository};

use crate::dedup::{DuplicateOutcome, InBatchDuplicateTracker};
use crate::document::ColumnMapping;
use crate::error::IngestionResult;
use crate::parser::parse_csv;
use crate::report::ImportReport;
use crate::row::parse_invoice_row;

/// Final disposition of one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Every window's error rate stayed under the abort threshold and the
    /// whole import committed atomically.
    Committed,
    /// The cumulative error rate crossed `csv_abort_on_error_rate` partway
    /// through the file; nothing was committed.
    AbortedOnErrorRate,
}

#[derive(Debug, Clone, Copy)]
pub struct ImportProgress {
    pub rows_processed: usize,
    pub rows_accepted: usize,
    pub rows_rejected: usize,
}

/// Streams a CSV invoice import: parses, normalizes, validates, and
/// deduplicates every row, staging accepted rows onto a single [`Session`]
/// so nothing is visible to readers until the whole import either commits
/// or is discarded. Rows are grouped into windows (`EngineConfig::csv_window_size`)
/// purely as checkpoints for progress reporting and the abort-on-error-rate
/// check — the store has no notion of a partially-committed import, so an
/// abort partway through always discards every window staged so far, not
/// just the one in progress.
pub fn run_invoice_import(
    bytes: &[u8],
    tenant_id: TenantId,
    mapping: &ColumnMapping,
    config: &EngineConfig,
    locale: DateLocale,
    invoices: &InvoiceRepository,
    vendors: &VendorRepository,
    now: DateTime<Utc>,
    mut on_progress: impl FnMut(ImportProgress),
) -> IngestionResult<(ImportOutcome, ImportReport)> {
    let parsed = parse_csv(bytes, config.csv_max_file_bytes)?;
    mapping.validate_for_invoice(&parsed.headers)?;

    let mut session = Session::begin(tenant_id, Isolation::ReadCommitted);
    let mut report = ImportReport::default();
    let mut dedup = InBatchDuplicateTracker::new();
    let mut rows_since_checkpoint = 0usize;

    for (row_number, record) in parsed.rows() {
        match parse_invoice_row(record, &parsed.headers, row_number, mapping, &config.default_currency, locale) {
            Ok(validated) => {
                let vendor = resolve_vendor(&mut session, vendors, tenant_id, &validated.vendor_name, now);
                let vendor_id: VendorId = *vendor.id();
                let outcome = dedup.check(&validated, |invoice_number, _vendor_name| {
                    invoices.find_by_business_key(tenant_id, invoice_number, vendor_id).map(|inv| *inv.id())
                });
                match outcome {
                    DuplicateOutcome::Unique => {
                        let invoice = Invoice::new(
                            reconap_core::InvoiceId::new(),
                            tenant_id,
                            validated.invoice_number.clone(),
                            vendor_id,
                            None,
                            validated.subtotal,
                            validated.tax_amount,
                            validated.total_amount,
                            validated.currency.clone(),
                            validated.invoice_date,
                            validated.due_date,
                            now.date_naive(),
                            ImportSource::CsvBatch,
                            validated.raw_row.clone(),
                            now,
                        );
                        match invoice {
                            Ok(invoice) => {
                                invoices.stage_create(&mut session, invoice);
                                report.record_accepted();
                            }
                            Err(err) => report.record_rejected(vec![crate::row::RowError {
                                row: row_number,
                                column: "total_amount".to_string(),
                                code: "invoice_invariant_violation".to_string(),
                                message: err.to_string(),
                                raw_value: String::new(),
                                suggested_fix: None,
                            }]),
                        }
                    }
                    DuplicateOutcome::DuplicateInBatch => report.record_duplicate_in_batch(row_number, &validated.invoice_number),
                    DuplicateOutcome::DuplicateExisting(_) => report.record_duplicate_existing(row_number, &validated.invoice_number),
                }
            }
            Err(errors) => report.record_rejected(errors),
        }

        rows_since_checkpoint += 1;
        if rows_since_checkpoint >= config.csv_window_size {
            rows_since_checkpoint = 0;
            on_progress(ImportProgress {
                rows_processed: report.summary.total_rows,
                rows_accepted: report.summary.accepted,
                rows_rejected: report.summary.total_rows - report.summary.accepted,
            });
            if error_rate(&report) > config.csv_abort_on_error_rate {
                session.rollback();
                return Ok((ImportOutcome::AbortedOnErrorRate, report));
            }
        }
    }

    on_progress(ImportProgress {
        rows_processed: report.summary.total_rows,
        rows_accepted: report.summary.accepted,
        rows_rejected: report.summary.total_rows - report.summary.accepted,
    });

    if error_rate(&report) > config.csv_abort_on_error_rate {
        session.rollback();
        return Ok((ImportOutcome::AbortedOnErrorRate, report));
    }

    session.commit().map_err(|e| crate::error::IngestionError::CommitConflict(e.to_string()))?;
    Ok((ImportOutcome::Committed, report))
}

fn error_rate(report: &ImportReport) -> f64 {
    if report.summary.total_rows == 0 {
        return 0.0;
    }
    let failed = report.summary.rejected + report.summary.duplicates_in_batch + report.summary.duplicates_existing;
    failed as f64 / report.summary.total_rows as f64
}

/// Looks up a vendor by its normalized name, registering a new one inline
/// (staged onto the same session) when this is the first row to reference
/// it — CSV uploads routinely reference vendors that have never been
/// entered into the system directly.
fn resolve_vendor(session: &mut Session, vendors: &VendorRepository, tenant_id: TenantId, vendor_name: &str, now: DateTime<Utc>) -> Vendor {
    let normalized = reconap_vendors::normalize_name(vendor_name);
    if let Some(existing) = vendors.find_by_normalized_name(tenant_id, &normalized) {
        return existing;
    }
    let vendor = Vendor::register(reconap_core::VendorId::new(), tenant_id, vendor_name.to_string(), None, None, 30, now)
        .expect("vendor_name was already validated non-empty by normalize_vendor_name");
    vendors.stage_create(session, vendor.clone());
    vendor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.csv_window_size = 2;
        cfg
    }

    #[test]
    fn clean_file_commits_every_row() {
        let csv_bytes = b"invoice_number,vendor,po_reference,invoice_date,due_date,subtotal,tax,total,currency\n\
INV-1,Acme Supply,,2026-01-10,2026-02-10,100.00,10.00,110.00,USD\n\
INV-2,Acme Supply,,2026-01-11,2026-02-11,200.00,20.00,220.00,USD\n";
        let mapping = mapping();
        let invoices = InvoiceRepository::new();
        let vendors = VendorRepository::new();
        let tenant = TenantId::new();

        let (outcome, report) = run_invoice_import(csv_bytes, tenant, &mapping, &config(), DateLocale::Us, &invoices, &vendors, Utc::now(), |_| {}).unwrap();

        assert_eq!(outcome, ImportOutcome::Committed);
        assert_eq!(report.summary.accepted, 2);
        let vendor_id = *vendors.find_by_normalized_name(tenant, "ACME SUPPLY").unwrap().id();
        assert_eq!(invoices.list_by_vendor(tenant, vendor_id).len(), 2);
    }

    #[test]
    fn high_error_rate_aborts_without_committing_anything() {
        let csv_bytes = b"invoice_number,vendor,po_reference,invoice_date,due_date,subtotal,tax,total,currency\n\
INV-1,Acme Supply,,2026-01-10,2026-02-10,100.00,10.00,999.00,USD\n\
INV-2,Acme Supply,,2026-01-11,2026-02-11,200.00,20.00,999.00,USD\n";
        let mapping = mapping();
        let invoices = InvoiceRepository::new();
        let vendors = VendorRepository::new();
        let tenant = TenantId::new();

        let (outcome, report) = run_invoice_import(csv_bytes, tenant, &mapping, &config(), DateLocale::Us, &invoices, &vendors, Utc::now(), |_| {}).unwrap();

        assert_eq!(outcome, ImportOutcome::AbortedOnErrorRate);
        assert_eq!(report.summary.rejected, 2);
        assert!(vendors.find_by_normalized_name(tenant, "ACME SUPPLY").is_none());
    }

    #[test]
    fn duplicate_invoice_number_in_same_file_is_flagged() {
        let csv_bytes = b"invoice_number,vendor,po_reference,invoice_date,due_date,subtotal,tax,total,currency\n\
INV-1,Acme Supply,,2026-01-10,2026-02-10,100.00,10.00,110.00,USD\n\
INV-1,Acme Supply,,2026-01-11,2026-02-11,200.00,20.00,220.00,USD\n";
        let mapping = mapping();
        let invoices = InvoiceRepository::new();
        let vendors = VendorRepository::new();
        let tenant = TenantId::new();

        let (_, report) = run_invoice_import(csv_bytes, tenant, &mapping, &config(), DateLocale::Us, &invoices, &vendors, Utc::now(), |_| {}).unwrap();

        assert_eq!(report.summary.duplicates_in_batch, 1);
    }

    fn mapping() -> ColumnMapping {
        use crate::document::CanonicalField;
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
}
