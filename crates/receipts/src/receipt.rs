use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use reconap_core::{DomainError, DomainResult, Entity, Money, PurchaseOrderId, ReceiptId, TenantId};
use reconap_purchasing::PurchaseOrder;

/// A single received line, referencing a PO line by its `line_no`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLineItem {
    pub po_line_no: u32,
    pub received_qty: i64,
}

/// Goods/services actually received against a purchase order.
///
/// `line_items` is always a subset of the referenced PO's lines: every
/// `po_line_no` here must exist on the PO, enforced by
/// [`Receipt::new`] against a loaded `PurchaseOrder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    id: ReceiptId,
    tenant_id: TenantId,
    receipt_number: Option<String>,
    po_id: PurchaseOrderId,
    received_date: NaiveDate,
    total_amount: Money,
    line_items: Vec<ReceiptLineItem>,
    created_at: DateTime<Utc>,
}

impl Receipt {
    pub fn new(
        id: ReceiptId,
        tenant_id: TenantId,
        receipt_number: Option<String>,
        po: &PurchaseOrder,
        received_date: NaiveDate,
        total_amount: Money,
        line_items: Vec<ReceiptLineItem>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if line_items.is_empty() {
            return Err(DomainError::validation("receipt must have at least one line item"));
        }
        for line in &line_items {
            if line.received_qty <= 0 {
                return Err(DomainError::validation("received_qty must be positive"));
            }
            if po.line(line.po_line_no).is_none() {
                return Err(DomainError::validation(format!(
                    "po has no line_no {}",
                    line.po_line_no
                )));
            }
        }

        Ok(Self {
            id,
            tenant_id,
            receipt_number: receipt_number.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            po_id: *po.id(),
            received_date,
            total_amount,
            line_items,
            created_at: now,
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn receipt_number(&self) -> Option<&str> {
        self.receipt_number.as_deref()
    }

    pub fn po_id(&self) -> PurchaseOrderId {
        self.po_id
    }

    pub fn received_date(&self) -> NaiveDate {
        self.received_date
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn line_items(&self) -> &[ReceiptLineItem] {
        &self.line_items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for Receipt {
    type Id = ReceiptId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Checks the cross-receipt invariant: for every PO line this new receipt
/// touches, the cumulative received quantity across `existing` plus the new
/// receipt must not exceed `ordered_qty + over_delivery_tolerance_units`.
pub fn check_over_delivery(
    po: &PurchaseOrder,
    existing: &[Receipt],
    candidate: &Receipt,
    over_delivery_tolerance_units: i64,
) -> DomainResult<()> {
    for line in candidate.line_items() {
        let Some(po_line) = po.line(line.po_line_no) else {
            return Err(DomainError::invariant("receipt references a line absent from the PO"));
        };
        let already_received: i64 = existing
            .iter()
            .flat_map(|r| r.line_items())
            .filter(|l| l.po_line_no == line.po_line_no)
            .map(|l| l.received_qty)
            .sum();
        let cumulative = already_received + line.received_qty;
        let ceiling = po_line.ordered_qty + over_delivery_tolerance_units;
        if cumulative > ceiling {
            return Err(DomainError::invariant(format!(
                "line {} over-delivered: {cumulative} received against ordered {} (+{over_delivery_tolerance_units} tolerance)",
                line.po_line_no, po_line.ordered_qty
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconap_core::VendorId;
    use reconap_purchasing::PoLineItem;

    fn po_with_one_line(ordered_qty: i64) -> PurchaseOrder {
        PurchaseOrder::new(
            reconap_core::PurchaseOrderId::new(),
            TenantId::new(),
            "PO-1".to_string(),
            VendorId::new(),
            "usd".to_string(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            None,
            vec![PoLineItem::new(1, "SKU-1".to_string(), "widget".to_string(), ordered_qty, Money::parse("1.00").unwrap()).unwrap()],
            Utc::now(),
        )
        .unwrap()
    }

    fn receipt_for(po: &PurchaseOrder, qty: i64) -> Receipt {
        Receipt::new(
            ReceiptId::new(),
            po.tenant_id(),
            None,
            po,
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            Money::parse("1.00").unwrap(),
            vec![ReceiptLineItem { po_line_no: 1, received_qty: qty }],
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_line_not_present_on_po() {
        let po = po_with_one_line(10);
        let err = Receipt::new(
            ReceiptId::new(),
            po.tenant_id(),
            None,
            &po,
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            Money::ZERO,
            vec![ReceiptLineItem { po_line_no: 99, received_qty: 1 }],
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn check_over_delivery_allows_exact_quantity() {
        let po = po_with_one_line(10);
        let receipt = receipt_for(&po, 10);
        assert!(check_over_delivery(&po, &[], &receipt, 0).is_ok());
    }

    #[test]
    fn check_over_delivery_rejects_exceeding_ordered_plus_tolerance() {
        let po = po_with_one_line(10);
        let first = receipt_for(&po, 8);
        let second = receipt_for(&po, 5);
        assert!(check_over_delivery(&po, &[first.clone()], &second, 0).is_err());
        assert!(check_over_delivery(&po, &[first], &second, 3).is_ok());
    }
}
