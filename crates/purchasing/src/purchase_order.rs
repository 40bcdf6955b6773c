use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use reconap_core::{DomainError, DomainResult, Entity, Money, PurchaseOrderId, TenantId, VendorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Open,
    PartiallyReceived,
    FullyReceived,
    Closed,
    Cancelled,
}

/// A single ordered line on a purchase order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoLineItem {
    pub line_no: u32,
    pub sku: String,
    pub description: String,
    pub ordered_qty: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

impl PoLineItem {
    pub fn new(line_no: u32, sku: String, description: String, ordered_qty: i64, unit_price: Money) -> DomainResult<Self> {
        if ordered_qty <= 0 {
            return Err(DomainError::validation("ordered_qty must be positive"));
        }
        let line_total = Money::new(unit_price.as_decimal() * rust_decimal::Decimal::from(ordered_qty));
        Ok(Self {
            line_no,
            sku,
            description,
            ordered_qty,
            unit_price,
            line_total,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: TenantId,
    po_number: String,
    vendor_id: VendorId,
    total_amount: Money,
    currency: String,
    po_date: NaiveDate,
    expected_date: Option<NaiveDate>,
    status: PurchaseOrderStatus,
    line_items: Vec<PoLineItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const LINE_TOTAL_TOLERANCE_CENTS: i64 = 1;

impl PurchaseOrder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PurchaseOrderId,
        tenant_id: TenantId,
        po_number: String,
        vendor_id: VendorId,
        currency: String,
        po_date: NaiveDate,
        expected_date: Option<NaiveDate>,
        line_items: Vec<PoLineItem>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let po_number = po_number.trim().to_string();
        if po_number.is_empty() {
            return Err(DomainError::validation("po_number cannot be empty"));
        }
        if line_items.is_empty() {
            return Err(DomainError::validation("purchase order must have at least one line item"));
        }

        let mut total_amount = Money::ZERO;
        for line in &line_items {
            total_amount = total_amount
                .checked_add(line.line_total)
                .ok_or_else(|| DomainError::invariant("line_total sum overflowed"))?;
        }

        Ok(Self {
            id,
            tenant_id,
            po_number,
            vendor_id,
            total_amount,
            currency: currency.to_uppercase(),
            po_date,
            expected_date,
            status: PurchaseOrderStatus::Open,
            line_items,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn po_number(&self) -> &str {
        &self.po_number
    }

    pub fn vendor_id(&self) -> VendorId {
        self.vendor_id
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn po_date(&self) -> NaiveDate {
        self.po_date
    }

    pub fn expected_date(&self) -> Option<NaiveDate> {
        self.expected_date
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn line_items(&self) -> &[PoLineItem] {
        &self.line_items
    }

    pub fn line(&self, line_no: u32) -> Option<&PoLineItem> {
        self.line_items.iter().find(|l| l.line_no == line_no)
    }

    /// Validates the invariant `sum(line_item.line_total) = total_amount ± 0.01`.
    pub fn totals_reconcile(&self) -> bool {
        let sum = self
            .line_items
            .iter()
            .fold(Money::ZERO, |acc, l| acc.checked_add(l.line_total).unwrap_or(acc));
        sum.abs_diff(self.total_amount) <= Money::from_cents(LINE_TOTAL_TOLERANCE_CENTS)
    }

    pub fn set_status(&mut self, status: PurchaseOrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = PurchaseOrderStatus::Cancelled;
        self.updated_at = now;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(line_no: u32, qty: i64, price: &str) -> PoLineItem {
        PoLineItem::new(line_no, format!("SKU-{line_no}"), "widget".to_string(), qty, Money::parse(price).unwrap()).unwrap()
    }

    #[test]
    fn new_sums_line_totals_into_total_amount() {
        let po = PurchaseOrder::new(
            PurchaseOrderId::new(),
            TenantId::new(),
            "PO-1".to_string(),
            VendorId::new(),
            "usd".to_string(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            None,
            vec![line(1, 10, "5.00"), line(2, 2, "12.50")],
            Utc::now(),
        )
        .unwrap();

        assert_eq!(po.total_amount(), Money::parse("75.00").unwrap());
        assert!(po.totals_reconcile());
    }

    #[test]
    fn new_rejects_empty_line_items() {
        let err = PurchaseOrder::new(
            PurchaseOrderId::new(),
            TenantId::new(),
            "PO-1".to_string(),
            VendorId::new(),
            "usd".to_string(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            None,
            vec![],
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn line_item_rejects_non_positive_quantity() {
        let err = PoLineItem::new(1, "SKU-1".to_string(), "widget".to_string(), 0, Money::parse("1.00").unwrap())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
