use chrono::NaiveDate;
use rust_decimal::Decimal;

use reconap_core::Money;

use crate::match_result::ComponentScores;
use crate::similarity::{jaro_winkler, levenshtein_ratio, normalize_for_matching, normalize_reference, ocr_corrected_ratio};

pub const WEIGHT_REFERENCE: f64 = 0.35;
pub const WEIGHT_AMOUNT: f64 = 0.25;
pub const WEIGHT_VENDOR: f64 = 0.20;
pub const WEIGHT_DATE: f64 = 0.15;
pub const WEIGHT_LINE: f64 = 0.05;

const OCR_MAX_SUBSTITUTIONS: usize = 3;

/// S_ref: similarity between the invoice's PO reference string and the
/// candidate PO's number. `invoice_po_reference` is the free-text
/// reference the invoice carries (may differ from the PO's own number by
/// OCR noise); `None` means the invoice named no PO reference at all.
pub fn score_reference(invoice_po_reference: Option<&str>, po_number: &str) -> f64 {
    let Some(reference) = invoice_po_reference else {
        return 0.5;
    };
    let a = normalize_reference(reference);
    let b = normalize_reference(po_number);
    if a == b {
        return 1.0;
    }
    let plain = levenshtein_ratio(&a, &b);
    let ocr = ocr_corrected_ratio(&a, &b, OCR_MAX_SUBSTITUTIONS);
    plain.max(ocr)
}

/// S_amt: amount agreement between invoice and PO totals.
pub fn score_amount(invoice_total: Money, po_total: Money, price_tolerance_pct: Decimal) -> f64 {
    let r = invoice_total.variance_ratio(po_total);
    let r_f64 = decimal_to_f64(r);
    let threshold = decimal_to_f64(price_tolerance_pct);

    if r_f64 <= 0.001 {
        1.0
    } else if r_f64 <= threshold {
        if threshold <= 0.0 {
            0.85
        } else {
            1.0 - (r_f64 / threshold) * 0.15
        }
    } else {
        (0.85 - 5.0 * (r_f64 - threshold)).max(0.0).min(0.849_999_999)
    }
}

/// S_ven: vendor name agreement, with a tax-id match bonus.
pub fn score_vendor(invoice_vendor_name: &str, po_vendor_name: &str, tax_ids_match: bool) -> f64 {
    let a = normalize_for_matching(invoice_vendor_name);
    let b = normalize_for_matching(po_vendor_name);
    let base = jaro_winkler(&a, &b);
    if tax_ids_match {
        (base + 0.10).min(1.0)
    } else {
        base
    }
}

/// S_date: date proximity between invoice date and PO date.
pub fn score_date(invoice_date: NaiveDate, po_date: NaiveDate, date_tolerance_days: i64) -> f64 {
    let d = (invoice_date - po_date).num_days().abs();
    if d <= date_tolerance_days {
        1.0
    } else {
        (1.0 - (d - date_tolerance_days) as f64 / 60.0).max(0.0)
    }
}

/// One invoice line matched against a PO line for the purposes of S_line.
pub struct MatchedLinePair {
    pub quantity_within_tolerance: bool,
    pub unit_price_within_tolerance: bool,
    pub quantity_variance_ratio: f64,
    pub price_variance_ratio: f64,
}

impl MatchedLinePair {
    fn score(&self) -> f64 {
        if self.quantity_within_tolerance && self.unit_price_within_tolerance {
            1.0
        } else {
            let variance = self.quantity_variance_ratio.max(self.price_variance_ratio);
            (1.0 - variance).max(0.0)
        }
    }
}

/// S_line: line-item agreement across matched triples, reduced
/// proportionally by any invoice lines that didn't match a PO line at all.
/// No receipt present (3-way not applicable) returns the neutral 0.5.
pub fn score_lines(matched: &[MatchedLinePair], unmatched_invoice_line_count: usize) -> f64 {
    if matched.is_empty() && unmatched_invoice_line_count == 0 {
        return 0.5;
    }
    let matched_mean = if matched.is_empty() {
        0.0
    } else {
        matched.iter().map(MatchedLinePair::score).sum::<f64>() / matched.len() as f64
    };
    let total_lines = matched.len() + unmatched_invoice_line_count;
    matched_mean * (matched.len() as f64 / total_lines as f64)
}

pub fn composite_score(components: ComponentScores) -> f64 {
    WEIGHT_REFERENCE * components.reference
        + WEIGHT_AMOUNT * components.amount
        + WEIGHT_VENDOR * components.vendor
        + WEIGHT_DATE * components.date
        + WEIGHT_LINE * components.line
}

fn decimal_to_f64(d: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_reference_exact_match_after_normalization() {
        assert_eq!(score_reference(Some("po-2024-001"), "PO2024001"), 1.0);
    }

    #[test]
    fn score_reference_neutral_when_invoice_has_none() {
        assert_eq!(score_reference(None, "PO2024001"), 0.5);
    }

    #[test]
    fn score_amount_exact_is_one() {
        let score = score_amount(Money::parse("100.00").unwrap(), Money::parse("100.00").unwrap(), Decimal::new(2, 2));
        assert_eq!(score, 1.0);
    }

    #[test]
    fn score_amount_beyond_threshold_decays() {
        let score = score_amount(Money::parse("145.00").unwrap(), Money::parse("100.00").unwrap(), Decimal::new(2, 2));
        assert!(score < 0.85);
        assert!(score >= 0.0);
    }

    #[test]
    fn score_date_within_tolerance_is_one() {
        let a = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 1, 12).unwrap();
        assert_eq!(score_date(a, b, 5), 1.0);
    }

    #[test]
    fn score_lines_neutral_without_receipt_data() {
        assert_eq!(score_lines(&[], 0), 0.5);
    }

    #[test]
    fn composite_score_matches_weighted_sum() {
        let components = ComponentScores { reference: 1.0, amount: 1.0, vendor: 1.0, date: 1.0, line: 1.0 };
        assert!((composite_score(components) - 1.0).abs() < 1e-9);
    }
}
