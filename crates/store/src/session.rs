use reconap_core::TenantId;

use crate::error::StoreResult;
use crate::table::StagedWrite;

/// Read isolation requested for a session.
///
/// `ReadCommitted` readers see the latest committed state on every call.
/// `RepeatableRead` is accepted for API compatibility with the data model's
/// transactional read requirements but, since every table read already
/// takes a consistent snapshot under its own lock and this store has no
/// long-lived background writers, the two behave identically here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Isolation {
    #[default]
    ReadCommitted,
    RepeatableRead,
}

/// A tenant-bound unit of work.
///
/// Domain repositories stage writes onto a session with their `stage_*`
/// helpers; nothing is visible to other sessions until `commit()` runs. On
/// commit, every staged write is validated first (each against the version
/// it was staged against), and only if all validate does any of them apply
/// — so a conflict on, say, the match-result row also aborts the invoice
/// and audit-event writes staged alongside it in the same session.
pub struct Session {
    tenant_id: TenantId,
    isolation: Isolation,
    staged: Vec<Box<dyn StagedWrite>>,
}

impl Session {
    pub fn begin(tenant_id: TenantId, isolation: Isolation) -> Self {
        Self {
            tenant_id,
            isolation,
            staged: Vec::new(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn isolation(&self) -> Isolation {
        self.isolation
    }

    pub fn stage(&mut self, op: Box<dyn StagedWrite>) {
        self.staged.push(op);
    }

    /// Validate every staged write, then apply all of them. Returns the
    /// first validation failure, if any, without applying anything.
    pub fn commit(self) -> StoreResult<()> {
        for op in &self.staged {
            op.validate()?;
        }
        for op in self.staged {
            op.apply();
        }
        Ok(())
    }

    /// Discard every staged write without touching the underlying tables.
    pub fn rollback(self) {
        tracing::debug!(staged = self.staged.len(), "session rolled back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::InMemoryTenantTable;

    #[test]
    fn session_commits_all_staged_writes_atomically() {
        let invoices: InMemoryTenantTable<u32, &'static str> = InMemoryTenantTable::new();
        let receipts: InMemoryTenantTable<u32, &'static str> = InMemoryTenantTable::new();
        let tenant = TenantId::new();

        let mut session = Session::begin(tenant, Isolation::ReadCommitted);
        session.stage(invoices.stage_insert(tenant, 1, "inv"));
        session.stage(receipts.stage_insert(tenant, 1, "rcpt"));
        session.commit().unwrap();

        assert_eq!(invoices.get(tenant, &1).unwrap().value, "inv");
        assert_eq!(receipts.get(tenant, &1).unwrap().value, "rcpt");
    }

    #[test]
    fn session_aborts_fully_when_one_staged_write_conflicts() {
        let invoices: InMemoryTenantTable<u32, &'static str> = InMemoryTenantTable::new();
        let receipts: InMemoryTenantTable<u32, &'static str> = InMemoryTenantTable::new();
        let tenant = TenantId::new();
        receipts.insert_now(tenant, 1, "existing").unwrap();

        let mut session = Session::begin(tenant, Isolation::ReadCommitted);
        session.stage(invoices.stage_insert(tenant, 1, "inv"));
        session.stage(receipts.stage_insert(tenant, 1, "rcpt"));
        let result = session.commit();

        assert!(result.is_err());
        assert!(invoices.get(tenant, &1).is_none());
    }
}
