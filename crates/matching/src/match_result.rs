use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reconap_core::{Entity, InvoiceId, MatchResultId, PurchaseOrderId, ReceiptId, TenantId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Tolerance,
    ThreeWay,
    Manual,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResultStatus {
    Pending,
    Approved,
    Rejected,
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreeWayType {
    PerfectMatch,
    PartialReceipt,
    SplitDelivery,
    OverDelivery,
    OverInvoice,
    UnderDelivery,
    UnderInvoice,
    PriceVariance,
    QuantityVariance,
}

/// A discrepancy surfaced to a reviewer: what field, what the PO/receipt
/// said, what the invoice said, and how large the gap is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub field: String,
    pub expected: String,
    pub actual: String,
    pub magnitude: rust_decimal::Decimal,
}

/// Component sub-scores feeding the weighted composite confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub reference: f64,
    pub amount: f64,
    pub vendor: f64,
    pub date: f64,
    pub line: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    id: MatchResultId,
    tenant_id: TenantId,
    invoice_id: InvoiceId,
    po_id: Option<PurchaseOrderId>,
    receipt_id: Option<ReceiptId>,
    match_type: MatchType,
    confidence: f64,
    component_scores: ComponentScores,
    discrepancies: Vec<Discrepancy>,
    three_way_type: Option<ThreeWayType>,
    status: MatchResultStatus,
    algorithm_version: u32,
    superseded_by: Option<MatchResultId>,
    created_at: DateTime<Utc>,
    reviewed_by: Option<UserId>,
    review_notes: Option<String>,
}

pub const ALGORITHM_VERSION: u32 = 1;

#[allow(clippy::too_many_arguments)]
impl MatchResult {
    pub fn new(
        id: MatchResultId,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        po_id: Option<PurchaseOrderId>,
        receipt_id: Option<ReceiptId>,
        match_type: MatchType,
        confidence: f64,
        component_scores: ComponentScores,
        discrepancies: Vec<Discrepancy>,
        three_way_type: Option<ThreeWayType>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            invoice_id,
            po_id,
            receipt_id,
            match_type,
            confidence,
            component_scores,
            discrepancies,
            three_way_type,
            status: MatchResultStatus::Pending,
            algorithm_version: ALGORITHM_VERSION,
            superseded_by: None,
            created_at: now,
            reviewed_by: None,
            review_notes: None,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    pub fn po_id(&self) -> Option<PurchaseOrderId> {
        self.po_id
    }

    pub fn receipt_id(&self) -> Option<ReceiptId> {
        self.receipt_id
    }

    pub fn match_type(&self) -> MatchType {
        self.match_type
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn component_scores(&self) -> ComponentScores {
        self.component_scores
    }

    pub fn discrepancies(&self) -> &[Discrepancy] {
        &self.discrepancies
    }

    pub fn three_way_type(&self) -> Option<ThreeWayType> {
        self.three_way_type
    }

    pub fn status(&self) -> MatchResultStatus {
        self.status
    }

    pub fn superseded_by(&self) -> Option<MatchResultId> {
        self.superseded_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Immutable once `status != pending`, except for the supersession
    /// link, which a later re-run may still set on an already-decided
    /// result.
    pub fn mark_superseded(&mut self, by: MatchResultId) {
        self.status = MatchResultStatus::Superseded;
        self.superseded_by = Some(by);
    }

    pub fn approve(&mut self, reviewed_by: Option<UserId>, notes: Option<String>) {
        self.status = MatchResultStatus::Approved;
        self.reviewed_by = reviewed_by;
        self.review_notes = notes;
    }

    pub fn reject(&mut self, reviewed_by: Option<UserId>, notes: Option<String>) {
        self.status = MatchResultStatus::Rejected;
        self.reviewed_by = reviewed_by;
        self.review_notes = notes;
    }
}

impl Entity for MatchResult {
    type Id = MatchResultId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
