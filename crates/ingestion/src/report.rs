use crate::row::RowError;

/// Summary counts for one import run, independent of the per-row detail in
/// `row_errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub duplicates_in_batch: usize,
    pub duplicates_existing: usize,
}

/// Full report for one import: the summary counts plus every row-level
/// error, in the order encountered, so a reviewer can locate and fix each
/// problem without re-running the import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub summary: ImportSummary,
    pub row_errors: Vec<RowError>,
}

impl ImportReport {
    pub fn record_accepted(&mut self) {
        self.summary.total_rows += 1;
        self.summary.accepted += 1;
    }

    pub fn record_rejected(&mut self, errors: Vec<RowError>) {
        self.summary.total_rows += 1;
        self.summary.rejected += 1;
        self.row_errors.extend(errors);
    }

    pub fn record_duplicate_in_batch(&mut self, row_number: u64, invoice_number: &str) {
        self.summary.total_rows += 1;
        self.summary.duplicates_in_batch += 1;
        self.row_errors.push(RowError {
            row: row_number,
            column: "invoice_number".to_string(),
            code: "duplicate_in_batch".to_string(),
            message: format!("invoice {invoice_number:?} repeats an earlier row in this file"),
            raw_value: invoice_number.to_string(),
            suggested_fix: None,
        });
    }

    pub fn record_duplicate_existing(&mut self, row_number: u64, invoice_number: &str) {
        self.summary.total_rows += 1;
        self.summary.duplicates_existing += 1;
        self.row_errors.push(RowError {
            row: row_number,
            column: "invoice_number".to_string(),
            code: "duplicate_existing".to_string(),
            message: format!("invoice {invoice_number:?} already exists for this vendor"),
            raw_value: invoice_number.to_string(),
            suggested_fix: None,
        });
    }

    /// Renders the row errors as CSV text (row, column, code, message,
    /// raw_value, suggested_fix) so a reviewer can reopen the original
    /// sheet and filter by row number.
    pub fn errors_to_csv(&self) -> String {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer
            .write_record(["row", "column", "code", "message", "raw_value", "suggested_fix"])
            .expect("in-memory writer cannot fail");
        for error in &self.row_errors {
            writer
                .write_record([
                    error.row.to_string(),
                    error.column.clone(),
                    error.code.clone(),
                    error.message.clone(),
                    error.raw_value.clone(),
                    error.suggested_fix.clone().unwrap_or_default(),
                ])
                .expect("in-memory writer cannot fail");
        }
        String::from_utf8(writer.into_inner().expect("in-memory writer cannot fail")).expect("csv writer only emits valid utf-8 for utf-8 input")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tallies_every_outcome() {
        let mut report = ImportReport::default();
        report.record_accepted();
        report.record_accepted();
        report.record_rejected(vec![RowError {
            row: 3,
            column: "total_amount".to_string(),
            code: "total_does_not_reconcile".to_string(),
            message: "bad total".to_string(),
            raw_value: "200.00".to_string(),
            suggested_fix: None,
        }]);
        report.record_duplicate_in_batch(4, "INV-1");
        report.record_duplicate_existing(5, "INV-2");

        assert_eq!(report.summary.total_rows, 5);
        assert_eq!(report.summary.accepted, 2);
        assert_eq!(report.summary.rejected, 1);
        assert_eq!(report.summary.duplicates_in_batch, 1);
        assert_eq!(report.summary.duplicates_existing, 1);
        assert_eq!(report.row_errors.len(), 3);
    }

    #[test]
    fn errors_to_csv_round_trips_through_the_csv_crate() {
        let mut report = ImportReport::default();
        report.record_duplicate_in_batch(2, "INV-1");
        let csv_text = report.errors_to_csv();
        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(&record[0], "2");
        assert_eq!(&record[2], "duplicate_in_batch");
    }
}
