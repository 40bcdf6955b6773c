use reconap_core::{DomainError, DomainResult, Entity, InvoiceId, MatchResultId, TenantId};
use reconap_store::{InMemoryTenantTable, Session, StoreError};

use crate::audit::MatchAuditEvent;
use crate::match_result::MatchResult;

/// Storage for `MatchResult`s and their audit trail. The audit log is
/// append-only: `stage_audit_events` never produces an update or conflict,
/// only inserts keyed by the event's own id.
#[derive(Clone, Default)]
pub struct MatchingRepository {
    results: InMemoryTenantTable<MatchResultId, MatchResult>,
    audit_events: InMemoryTenantTable<reconap_core::AuditEventId, MatchAuditEvent>,
}

impl MatchingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_result(&self, tenant_id: TenantId, id: MatchResultId) -> Option<MatchResult> {
        self.results.get(tenant_id, &id).map(|v| v.value)
    }

    pub fn get_result_versioned(&self, tenant_id: TenantId, id: MatchResultId) -> Option<(MatchResult, u64)> {
        self.results.get(tenant_id, &id).map(|v| (v.value, v.version))
    }

    pub fn list_results_for_invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Vec<MatchResult> {
        let mut results = self.results.scan(tenant_id, |r| r.invoice_id() == invoice_id);
        results.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        results
    }

    pub fn list_audit_events_for_invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Vec<MatchAuditEvent> {
        let mut events = self.audit_events.scan(tenant_id, |e| e.invoice_id == invoice_id);
        events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at));
        events
    }

    pub fn last_audit_hash_for_invoice(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Option<String> {
        self.list_audit_events_for_invoice(tenant_id, invoice_id)
            .last()
            .map(|e| e.content_hash.clone())
    }

    /// Supersedes every existing non-terminal `MatchResult` for the invoice
    /// (a re-run producing fresh candidates makes the previous run's
    /// pending/approved results stale) and stages the new ones plus the
    /// audit trail from one matching run, all inside a single session.
    pub fn stage_run(
        &self,
        session: &mut Session,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        new_results: &[MatchResult],
        new_events: &[MatchAuditEvent],
    ) -> DomainResult<()> {
        for existing in self.list_results_for_invoice(tenant_id, invoice_id) {
            if matches!(existing.status(), crate::match_result::MatchResultStatus::Pending) {
                let (_, version) = self
                    .get_result_versioned(tenant_id, *existing.id())
                    .ok_or_else(DomainError::not_found)?;
                let mut superseded = existing;
                let marker = new_results.first().map(|r| *r.id());
                if let Some(marker) = marker {
                    superseded.mark_superseded(marker);
                }
                session.stage(self.results.stage_update(tenant_id, *superseded.id(), version, superseded));
            }
        }

        for result in new_results {
            session.stage(self.results.stage_insert(tenant_id, *result.id(), result.clone()));
        }
        for event in new_events {
            session.stage(self.audit_events.stage_insert(tenant_id, event.id, event.clone()));
        }
        Ok(())
    }

    pub fn decide_result(
        &self,
        tenant_id: TenantId,
        id: MatchResultId,
        expected_version: u64,
        updated: MatchResult,
    ) -> DomainResult<()> {
        let mut session = Session::begin(tenant_id, reconap_store::Isolation::ReadCommitted);
        session.stage(self.results.stage_update(tenant_id, id, expected_version, updated));
        session.commit().map_err(map_store_error)
    }

    /// Stages a single `MatchResult` update onto a session the caller owns,
    /// for composing a result update alongside writes to other repositories
    /// (the exception queue's approve/reject-all decisions do this).
    pub fn stage_result_update(
        &self,
        tenant_id: TenantId,
        id: MatchResultId,
        expected_version: u64,
        updated: MatchResult,
    ) -> Box<dyn reconap_store::StagedWrite> {
        self.results.stage_update(tenant_id, id, expected_version, updated)
    }
}

fn map_store_error(err: StoreError) -> DomainError {
    match err {
        StoreError::DuplicateKey => DomainError::conflict("match result already exists"),
        StoreError::Conflict { .. } => DomainError::conflict("match result changed concurrently"),
        StoreError::NotFound => DomainError::not_found(),
        other => DomainError::invariant(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reconap_core::{InvoiceId, MatchResultId, PurchaseOrderId, TenantId};

    use crate::match_result::{ComponentScores, MatchType};

    fn scores() -> ComponentScores {
        ComponentScores { reference: 1.0, amount: 1.0, vendor: 1.0, date: 1.0, line: 0.5 }
    }

    #[test]
    fn rerun_supersedes_prior_pending_results() {
        let repo = MatchingRepository::new();
        let tenant = TenantId::new();
        let invoice_id = InvoiceId::new();

        let first = MatchResult::new(
            MatchResultId::new(),
            tenant,
            invoice_id,
            Some(PurchaseOrderId::new()),
            None,
            MatchType::Fuzzy,
            0.7,
            scores(),
            Vec::new(),
            None,
            Utc::now(),
        );
        let mut session = Session::begin(tenant, reconap_store::Isolation::ReadCommitted);
        repo.stage_run(&mut session, tenant, invoice_id, std::slice::from_ref(&first), &[]).unwrap();
        session.commit().unwrap();

        let second = MatchResult::new(
            MatchResultId::new(),
            tenant,
            invoice_id,
            Some(PurchaseOrderId::new()),
            None,
            MatchType::Fuzzy,
            0.9,
            scores(),
            Vec::new(),
            None,
            Utc::now(),
        );
        let mut session = Session::begin(tenant, reconap_store::Isolation::ReadCommitted);
        repo.stage_run(&mut session, tenant, invoice_id, std::slice::from_ref(&second), &[]).unwrap();
        session.commit().unwrap();

        let results = repo.list_results_for_invoice(tenant, invoice_id);
        let stored_first = results.iter().find(|r| *r.id() == *first.id()).unwrap();
        assert_eq!(stored_first.status(), crate::match_result::MatchResultStatus::Superseded);
        assert_eq!(stored_first.superseded_by(), Some(*second.id()));
    }
}
