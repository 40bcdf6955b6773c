use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reconap_core::{DomainError, DomainResult, Entity, ExceptionEntryId, InvoiceId, MatchResultId, Money, TenantId, UserId, VendorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionReason {
    NoCandidate,
    BelowThreshold,
    MultipleCandidates,
    CurrencyMismatch,
    AmountVariance,
    DateVariance,
    DataQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    Open,
    InReview,
    Resolved,
    Dismissed,
}

/// An invoice sitting in the review queue: why it landed here, how urgent it
/// is, and whatever the matching engine already worked out as candidates.
///
/// `vendor_id`/`invoice_amount` are a snapshot taken at enqueue time so
/// `list`'s vendor/amount filters don't need a join back to the invoice on
/// every query, the same way `Invoice::raw_row` keeps a snapshot of the
/// as-ingested data rather than re-deriving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionEntry {
    id: ExceptionEntryId,
    tenant_id: TenantId,
    invoice_id: InvoiceId,
    vendor_id: VendorId,
    invoice_amount: Money,
    reason: ExceptionReason,
    priority: ExceptionPriority,
    suggested_matches: Vec<MatchResultId>,
    context: serde_json::Value,
    assigned_to: Option<UserId>,
    status: ExceptionStatus,
    resolution_notes: Option<String>,
    defer_until: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ExceptionEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ExceptionEntryId,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        vendor_id: VendorId,
        invoice_amount: Money,
        reason: ExceptionReason,
        priority: ExceptionPriority,
        suggested_matches: Vec<MatchResultId>,
        context: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            invoice_id,
            vendor_id,
            invoice_amount,
            reason,
            priority,
            suggested_matches,
            context,
            assigned_to: None,
            status: ExceptionStatus::Open,
            resolution_notes: None,
            defer_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    pub fn vendor_id(&self) -> VendorId {
        self.vendor_id
    }

    pub fn invoice_amount(&self) -> Money {
        self.invoice_amount
    }

    pub fn reason(&self) -> ExceptionReason {
        self.reason
    }

    pub fn priority(&self) -> ExceptionPriority {
        self.priority
    }

    pub fn suggested_matches(&self) -> &[MatchResultId] {
        &self.suggested_matches
    }

    pub fn assigned_to(&self) -> Option<UserId> {
        self.assigned_to
    }

    pub fn status(&self) -> ExceptionStatus {
        self.status
    }

    pub fn resolution_notes(&self) -> Option<&str> {
        self.resolution_notes.as_deref()
    }

    pub fn defer_until(&self) -> Option<DateTime<Utc>> {
        self.defer_until
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    pub fn is_open_for_enqueue(&self) -> bool {
        matches!(self.status, ExceptionStatus::Open | ExceptionStatus::InReview)
    }

    /// `open → in_review`, recording the claimant. Fails if someone already
    /// holds it.
    pub fn claim(&mut self, user: UserId, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != ExceptionStatus::Open {
            return Err(DomainError::conflict("exception entry is already claimed"));
        }
        self.status = ExceptionStatus::InReview;
        self.assigned_to = Some(user);
        self.updated_at = now;
        Ok(())
    }

    pub fn resolve(&mut self, status: ExceptionStatus, notes: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.resolution_notes = notes;
        self.updated_at = now;
    }

    pub fn defer(&mut self, until: DateTime<Utc>, notes: Option<String>, now: DateTime<Utc>) {
        self.defer_until = Some(until);
        self.resolution_notes = notes;
        self.updated_at = now;
    }
}

impl Entity for ExceptionEntry {
    type Id = ExceptionEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// `critical` if the invoice amount clears the tenant's 95th percentile and
/// the entry has sat for 3+ days; `high` if either condition holds alone;
/// `low` only when the amount is below the median and the entry is under a
/// day old; `medium` otherwise.
pub fn compute_priority(amount: Money, percentile_95: Money, median: Money, age_days: i64) -> ExceptionPriority {
    let is_large = amount.as_decimal() >= percentile_95.as_decimal();
    let is_old = age_days >= 3;
    if is_large && is_old {
        return ExceptionPriority::Critical;
    }
    if is_large || is_old {
        return ExceptionPriority::High;
    }
    if amount.as_decimal() < median.as_decimal() && age_days < 1 {
        return ExceptionPriority::Low;
    }
    ExceptionPriority::Medium
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn large_and_old_is_critical() {
        let p = compute_priority(money("1000.00"), money("900.00"), money("200.00"), 4);
        assert_eq!(p, ExceptionPriority::Critical);
    }

    #[test]
    fn large_but_fresh_is_high() {
        let p = compute_priority(money("1000.00"), money("900.00"), money("200.00"), 0);
        assert_eq!(p, ExceptionPriority::High);
    }

    #[test]
    fn old_but_small_is_high() {
        let p = compute_priority(money("50.00"), money("900.00"), money("200.00"), 5);
        assert_eq!(p, ExceptionPriority::High);
    }

    #[test]
    fn small_and_fresh_is_low() {
        let p = compute_priority(money("10.00"), money("900.00"), money("200.00"), 0);
        assert_eq!(p, ExceptionPriority::Low);
    }

    #[test]
    fn mid_amount_one_day_old_is_medium() {
        let p = compute_priority(money("300.00"), money("900.00"), money("200.00"), 1);
        assert_eq!(p, ExceptionPriority::Medium);
    }

    #[test]
    fn claim_fails_when_already_claimed() {
        let now = Utc::now();
        let mut entry = ExceptionEntry::new(
            ExceptionEntryId::new(),
            TenantId::new(),
            InvoiceId::new(),
            VendorId::new(),
            money("100.00"),
            ExceptionReason::NoCandidate,
            ExceptionPriority::Medium,
            Vec::new(),
            serde_json::json!({}),
            now,
        );
        entry.claim(UserId::new(), now).unwrap();
        let err = entry.claim(UserId::new(), now).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
