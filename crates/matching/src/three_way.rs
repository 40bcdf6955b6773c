use reconap_core::Money;

use crate::match_result::ThreeWayType;

/// Classifies an (invoice, PO, receipts) tuple once a PO has at least one
/// receipt against it.
///
/// The canonical classification in the component design operates per PO
/// line; this engine's `Invoice` has no structured line items of its own
/// (the data model carries only invoice-level totals), so classification
/// here works from aggregate amounts: the PO's total, the sum of received
/// receipts' totals, and the invoice's total. This is a coarser view of
/// the same decision tree and is noted as a deliberate simplification.
pub fn classify(
    invoice_total: Money,
    po_total: Money,
    received_total: Money,
    over_delivery_tolerance_pct: rust_decimal::Decimal,
) -> ThreeWayType {
    let invoice_vs_received = invoice_total.variance_ratio(received_total);
    let received_vs_ordered = received_total.variance_ratio(po_total);
    let tolerance = over_delivery_tolerance_pct;

    let over_received = received_total > po_total && received_vs_ordered > tolerance;
    let under_received = received_total < po_total;
    let invoice_matches_received = invoice_vs_received <= tolerance;

    if invoice_matches_received && received_vs_ordered <= tolerance {
        return ThreeWayType::PerfectMatch;
    }
    if over_received {
        return if invoice_matches_received {
            ThreeWayType::OverInvoice
        } else {
            ThreeWayType::OverDelivery
        };
    }
    if under_received {
        return if invoice_matches_received {
            ThreeWayType::PartialReceipt
        } else if invoice_total < received_total {
            ThreeWayType::UnderInvoice
        } else {
            ThreeWayType::UnderDelivery
        };
    }
    if invoice_matches_received {
        ThreeWayType::QuantityVariance
    } else {
        ThreeWayType::PriceVariance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn pct(p: i64) -> Decimal {
        Decimal::new(p, 2)
    }

    #[test]
    fn all_equal_is_perfect_match() {
        let amount = Money::parse("100.00").unwrap();
        assert_eq!(classify(amount, amount, amount, pct(2)), ThreeWayType::PerfectMatch);
    }

    #[test]
    fn receipt_below_po_and_invoice_matches_receipt_is_partial_receipt() {
        let po_total = Money::parse("100.00").unwrap();
        let received = Money::parse("60.00").unwrap();
        let invoice = Money::parse("60.00").unwrap();
        assert_eq!(classify(invoice, po_total, received, pct(2)), ThreeWayType::PartialReceipt);
    }

    #[test]
    fn receipt_above_po_is_over_delivery() {
        let po_total = Money::parse("100.00").unwrap();
        let received = Money::parse("140.00").unwrap();
        let invoice = Money::parse("100.00").unwrap();
        assert_eq!(classify(invoice, po_total, received, pct(2)), ThreeWayType::OverDelivery);
    }
}
