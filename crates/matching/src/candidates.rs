use rust_decimal::Decimal;

use reconap_invoicing::Invoice;
use reconap_purchasing::{PurchaseOrder, PurchaseOrderStatus};
use reconap_receipts::Receipt;
use reconap_vendors::Vendor;

use crate::similarity::{jaro_winkler, normalize_for_matching};

const VENDOR_FUZZY_THRESHOLD: f64 = 0.70;
const CANDIDATE_DATE_WINDOW_SLACK_DAYS: i64 = 30;

/// A (PO, receipts) pair that passed every candidate-stage filter for one
/// invoice. `receipts` is whatever the caller's lookup returned for this PO
/// at selection time — empty when nothing has been received against it yet,
/// in which case scoring and classification fall back to a 2-way
/// invoice/PO comparison.
pub struct Candidate<'a> {
    pub po: &'a PurchaseOrder,
    pub receipts: Vec<Receipt>,
}

/// Narrows a vendor's open purchase orders down to candidates for
/// `invoice`, per the candidate-selection rules: exact currency, vendor
/// exact-or-fuzzy match, a date window wider than the scoring tolerance,
/// an open-ish PO status, and a wide amount band.
///
/// `pos` is expected to already be restricted to the invoice's exact
/// vendor (the repository's index-backed lookup) or, when no exact vendor
/// match exists, a fuzzy-matched vendor pool the caller assembled
/// separately; this function re-checks vendor similarity either way so
/// callers cannot accidentally widen the contract by passing an
/// unfiltered PO set.
pub fn select_candidates<'a>(
    invoice: &Invoice,
    invoice_vendor: &Vendor,
    pos: &'a [PurchaseOrder],
    po_vendor_lookup: impl Fn(&PurchaseOrder) -> Option<Vendor>,
    receipts_lookup: impl Fn(&PurchaseOrder) -> Vec<Receipt>,
    date_tolerance_days: i64,
) -> Vec<Candidate<'a>> {
    pos.iter()
        .filter(|po| po.currency() == invoice.currency())
        .filter(|po| {
            matches!(
                po.status(),
                PurchaseOrderStatus::Open | PurchaseOrderStatus::PartiallyReceived | PurchaseOrderStatus::FullyReceived
            )
        })
        .filter(|po| {
            if po.vendor_id() == invoice.vendor_id() {
                return true;
            }
            match po_vendor_lookup(po) {
                Some(po_vendor) => {
                    let a = normalize_for_matching(invoice_vendor.legal_name());
                    let b = normalize_for_matching(po_vendor.legal_name());
                    jaro_winkler(&a, &b) >= VENDOR_FUZZY_THRESHOLD
                }
                None => false,
            }
        })
        .filter(|po| {
            let window = date_tolerance_days + CANDIDATE_DATE_WINDOW_SLACK_DAYS;
            (po.po_date() - invoice.invoice_date()).num_days().abs() <= window
        })
        .filter(|po| invoice.total_amount().variance_ratio(po.total_amount()) <= Decimal::new(30, 2))
        .map(|po| Candidate { po, receipts: receipts_lookup(po) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use reconap_core::{Money, TenantId, VendorId};
    use reconap_invoicing::ImportSource;
    use reconap_purchasing::PoLineItem;

    fn vendor(tenant: TenantId, name: &str) -> Vendor {
        Vendor::register(VendorId::new(), tenant, name.to_string(), None, None, 30, Utc::now()).unwrap()
    }

    fn po(tenant: TenantId, vendor_id: VendorId, total: &str, date: NaiveDate) -> PurchaseOrder {
        PurchaseOrder::new(
            reconap_core::PurchaseOrderId::new(),
            tenant,
            "PO-1".to_string(),
            vendor_id,
            "usd".to_string(),
            date,
            None,
            vec![PoLineItem::new(1, "SKU".to_string(), "widget".to_string(), 1, Money::parse(total).unwrap()).unwrap()],
            Utc::now(),
        )
        .unwrap()
    }

    fn invoice(tenant: TenantId, vendor_id: VendorId, total: &str, date: NaiveDate) -> Invoice {
        Invoice::new(
            reconap_core::InvoiceId::new(),
            tenant,
            "INV-1".to_string(),
            vendor_id,
            None,
            Money::parse(total).unwrap(),
            Money::ZERO,
            Money::parse(total).unwrap(),
            "usd".to_string(),
            date,
            None,
            date,
            ImportSource::DirectApi,
            serde_json::json!({}),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn exact_vendor_and_amount_within_band_is_a_candidate() {
        let tenant = TenantId::new();
        let v = vendor(tenant, "Acme Supply");
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let po = po(tenant, *v.id(), "100.00", date);
        let inv = invoice(tenant, *v.id(), "105.00", date);

        let candidates = select_candidates(&inv, &v, std::slice::from_ref(&po), |_| None, |_| Vec::new(), 5);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn amount_outside_band_is_excluded() {
        let tenant = TenantId::new();
        let v = vendor(tenant, "Acme Supply");
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let po = po(tenant, *v.id(), "100.00", date);
        let inv = invoice(tenant, *v.id(), "200.00", date);

        let candidates = select_candidates(&inv, &v, std::slice::from_ref(&po), |_| None, |_| Vec::new(), 5);
        assert!(candidates.is_empty());
    }
}
