use chrono::{DateTime, Utc};
use tracing::info;

use reconap_core::{DomainError, DomainResult, Entity, ExceptionEntryId, InvoiceId, MatchResultId, Money, TenantId, UserId, VendorId};
use reconap_invoicing::{Invoice, InvoiceRepository, MatchingStatus};
use reconap_matching::{MatchResultStatus, MatchingRepository};
use reconap_store::{Isolation, Session, StoreError};

use crate::exception_entry::{ExceptionEntry, ExceptionPriority, ExceptionReason, ExceptionStatus};

/// A review decision recorded against one exception entry.
pub enum Decision {
    Approve(MatchResultId),
    RejectAll,
    Defer(DateTime<Utc>),
}

#[derive(Debug, Clone, Default)]
pub struct ExceptionFilters {
    pub status: Option<ExceptionStatus>,
    pub priority: Option<ExceptionPriority>,
    pub reason: Option<ExceptionReason>,
    pub assigned_to: Option<UserId>,
    pub min_age_days: Option<i64>,
    pub vendor_id: Option<VendorId>,
    pub min_amount: Option<Money>,
    pub max_amount: Option<Money>,
}

impl ExceptionFilters {
    fn matches(&self, entry: &ExceptionEntry, now: DateTime<Utc>) -> bool {
        if let Some(status) = self.status {
            if entry.status() != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if entry.priority() != priority {
                return false;
            }
        }
        if let Some(reason) = self.reason {
            if entry.reason() != reason {
                return false;
            }
        }
        if let Some(assignee) = self.assigned_to {
            if entry.assigned_to() != Some(assignee) {
                return false;
            }
        }
        if let Some(min_age) = self.min_age_days {
            if entry.age_days(now) < min_age {
                return false;
            }
        }
        if let Some(vendor_id) = self.vendor_id {
            if entry.vendor_id() != vendor_id {
                return false;
            }
        }
        if let Some(min_amount) = self.min_amount {
            if entry.invoice_amount().as_decimal() < min_amount.as_decimal() {
                return false;
            }
        }
        if let Some(max_amount) = self.max_amount {
            if entry.invoice_amount().as_decimal() > max_amount.as_decimal() {
                return false;
            }
        }
        true
    }
}

/// Storage for the review queue. Every transition that also affects another
/// repository's records (`decide`'s approve path touches `MatchResult` and
/// `Invoice`) stages every write onto one session so the whole decision
/// commits or none of it does.
#[derive(Clone, Default)]
pub struct ExceptionRepository {
    entries: reconap_store::InMemoryTenantTable<ExceptionEntryId, ExceptionEntry>,
}

impl ExceptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, id: ExceptionEntryId) -> Option<ExceptionEntry> {
        self.entries.get(tenant_id, &id).map(|v| v.value)
    }

    /// Exposed so callers (e.g. the API layer) can read the version to
    /// pass back into `decide`/`claim`'s optimistic-concurrency check
    /// without racing a separate `get` + guess.
    pub fn get_versioned(&self, tenant_id: TenantId, id: ExceptionEntryId) -> Option<(ExceptionEntry, u64)> {
        self.entries.get(tenant_id, &id).map(|v| (v.value, v.version))
    }

    fn open_entry_for_invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Option<ExceptionEntry> {
        self.entries
            .scan(tenant_id, |e| e.invoice_id() == invoice_id && e.is_open_for_enqueue())
            .into_iter()
            .next()
    }

    /// Idempotent by `(invoice_id, open-status)`: if an open or in-review
    /// entry already exists for this invoice, it's returned unchanged
    /// instead of creating a duplicate — a re-run of the matching engine
    /// for an invoice already under review must not fork the queue.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        vendor_id: VendorId,
        invoice_amount: Money,
        reason: ExceptionReason,
        priority: ExceptionPriority,
        suggested_matches: Vec<MatchResultId>,
        context: serde_json::Value,
        now: DateTime<Utc>,
    ) -> DomainResult<ExceptionEntry> {
        if let Some(existing) = self.open_entry_for_invoice(tenant_id, invoice_id) {
            return Ok(existing);
        }
        let entry = ExceptionEntry::new(
            ExceptionEntryId::new(),
            tenant_id,
            invoice_id,
            vendor_id,
            invoice_amount,
            reason,
            priority,
            suggested_matches,
            context,
            now,
        );
        self.entries
            .insert_now(tenant_id, *entry.id(), entry.clone())
            .map_err(map_store_error)?;
        info!(invoice_id = ?invoice_id, priority = ?priority, "invoice enqueued for manual review");
        Ok(entry)
    }

    /// Filtered, sorted view of the queue: priority descending, then oldest
    /// first within a priority tier. Pagination over the result is the
    /// caller's responsibility, the same as every other repository's
    /// `list`/`scan` in this crate set.
    pub fn list(&self, tenant_id: TenantId, filters: &ExceptionFilters, now: DateTime<Utc>) -> Vec<ExceptionEntry> {
        let mut entries: Vec<ExceptionEntry> = self
            .entries
            .list(tenant_id)
            .into_iter()
            .map(|v| v.value)
            .filter(|e| filters.matches(e, now))
            .collect();
        entries.sort_by(|a, b| b.priority().cmp(&a.priority()).then_with(|| a.created_at().cmp(&b.created_at())));
        entries
    }

    pub fn claim(&self, tenant_id: TenantId, id: ExceptionEntryId, user: UserId, now: DateTime<Utc>) -> DomainResult<ExceptionEntry> {
        let (mut entry, version) = self.get_versioned(tenant_id, id).ok_or_else(DomainError::not_found)?;
        entry.claim(user, now)?;
        let mut session = Session::begin(tenant_id, Isolation::ReadCommitted);
        session.stage(self.entries.stage_update(tenant_id, id, version, entry.clone()));
        session.commit().map_err(map_store_error)?;
        info!(entry_id = ?id, user = ?user, "exception entry claimed");
        Ok(entry)
    }

    /// Records a reviewer's decision. On `Approve`, the chosen `MatchResult`
    /// is flipped to approved, every other pending result for the invoice is
    /// superseded, and the invoice's matching status moves to
    /// `manually_matched` — all staged into the one session this call
    /// commits, so a storage failure partway through leaves nothing applied.
    ///
    /// `expected_version` guards against a stale decide: a concurrent claim
    /// or decision on the same entry surfaces as a conflict the caller must
    /// re-fetch and retry.
    #[allow(clippy::too_many_arguments)]
    pub fn decide(
        &self,
        tenant_id: TenantId,
        id: ExceptionEntryId,
        expected_version: u64,
        user: UserId,
        decision: Decision,
        notes: Option<String>,
        matching: &MatchingRepository,
        invoices: &InvoiceRepository,
        now: DateTime<Utc>,
    ) -> DomainResult<ExceptionEntry> {
        let (mut entry, version) = self.get_versioned(tenant_id, id).ok_or_else(DomainError::not_found)?;
        if version != expected_version {
            return Err(DomainError::conflict("exception entry changed concurrently"));
        }

        let mut session = Session::begin(tenant_id, Isolation::ReadCommitted);

        match &decision {
            Decision::Approve(match_id) => {
                let (mut chosen, chosen_version) = matching
                    .get_result_versioned(tenant_id, *match_id)
                    .ok_or_else(DomainError::not_found)?;
                chosen.approve(Some(user), notes.clone());
                session.stage(matching_stage_update(matching, tenant_id, *match_id, chosen_version, chosen));

                for other in matching.list_results_for_invoice(tenant_id, entry.invoice_id()) {
                    if *other.id() == *match_id || other.status() != MatchResultStatus::Pending {
                        continue;
                    }
                    let (_, other_version) = matching
                        .get_result_versioned(tenant_id, *other.id())
                        .ok_or_else(DomainError::not_found)?;
                    let mut superseded = other;
                    superseded.mark_superseded(*match_id);
                    session.stage(matching_stage_update(matching, tenant_id, *superseded.id(), other_version, superseded));
                }

                let (mut invoice, invoice_version) = invoices
                    .get_versioned(tenant_id, entry.invoice_id())
                    .ok_or_else(DomainError::not_found)?;
                apply_manually_matched(&mut invoice, now)?;
                invoices.stage_update(&mut session, tenant_id, entry.invoice_id(), invoice_version, invoice);

                entry.resolve(ExceptionStatus::Resolved, notes, now);
            }
            Decision::RejectAll => {
                for other in matching.list_results_for_invoice(tenant_id, entry.invoice_id()) {
                    if other.status() != MatchResultStatus::Pending {
                        continue;
                    }
                    let (_, other_version) = matching
                        .get_result_versioned(tenant_id, *other.id())
                        .ok_or_else(DomainError::not_found)?;
                    let mut rejected = other;
                    rejected.reject(Some(user), notes.clone());
                    session.stage(matching_stage_update(matching, tenant_id, *rejected.id(), other_version, rejected));
                }
                entry.resolve(ExceptionStatus::Dismissed, notes, now);
            }
            Decision::Defer(until) => {
                entry.defer(*until, notes, now);
            }
        }

        session.stage(self.entries.stage_update(tenant_id, id, version, entry.clone()));
        session.commit().map_err(map_store_error)?;
        info!(entry_id = ?id, user = ?user, "exception entry decided");
        Ok(entry)
    }
}

fn matching_stage_update(
    matching: &MatchingRepository,
    tenant_id: TenantId,
    id: MatchResultId,
    expected_version: u64,
    value: reconap_matching::MatchResult,
) -> Box<dyn reconap_store::StagedWrite> {
    matching.stage_result_update(tenant_id, id, expected_version, value)
}

fn apply_manually_matched(invoice: &mut Invoice, now: DateTime<Utc>) -> DomainResult<()> {
    invoice.apply_matching_status(MatchingStatus::ManuallyMatched, now)
}

fn map_store_error(err: StoreError) -> DomainError {
    match err {
        StoreError::DuplicateKey => DomainError::conflict("exception entry already exists"),
        StoreError::Conflict { .. } => DomainError::conflict("exception entry changed concurrently"),
        StoreError::NotFound => DomainError::not_found(),
        other => DomainError::invariant(other.to_string()),
    }
}
