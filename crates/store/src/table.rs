use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use reconap_core::TenantId;

use crate::error::{StoreError, StoreResult};

/// A record plus the version it was last written at.
///
/// Every mutation bumps the version by one; callers that read a record and
/// later write it back must present the version they read, or the write is
/// rejected as a conflict.
#[derive(Debug, Clone)]
pub struct Versioned<Rec> {
    pub value: Rec,
    pub version: u64,
}

/// A staged mutation against one table, produced by `InMemoryTenantTable`
/// and collected by a `Session` until `commit()`.
///
/// Commit happens in two passes: every staged op is validated against the
/// table's current state first, and only if every op in the session
/// validates does any of them get applied. This keeps a multi-table write
/// (e.g. invoice + match result + audit event) from landing half-done.
pub trait StagedWrite: Send {
    fn validate(&self) -> StoreResult<()>;
    fn apply(self: Box<Self>);
}

/// Tenant-partitioned, versioned key/value table.
///
/// This is the storage engine's one primitive: every domain repository
/// (invoices, purchase orders, receipts, vendors, match results, exception
/// entries, audit events) is a thin typed wrapper around one or more of
/// these. A production deployment would back this with a real database and
/// its own indexes; this in-memory table keeps the same tenant-isolation
/// and optimistic-concurrency contract so the rest of the engine is
/// oblivious to the difference.
pub struct InMemoryTenantTable<Id, Rec> {
    rows: Arc<RwLock<HashMap<(TenantId, Id), Versioned<Rec>>>>,
}

impl<Id, Rec> Clone for InMemoryTenantTable<Id, Rec> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<Id, Rec> Default for InMemoryTenantTable<Id, Rec>
where
    Id: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Id, Rec> InMemoryTenantTable<Id, Rec>
where
    Id: Eq + Hash + Clone + Send + Sync + 'static,
    Rec: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn get(&self, tenant_id: TenantId, id: &Id) -> Option<Versioned<Rec>> {
        let rows = self.rows.read().expect("store lock poisoned");
        rows.get(&(tenant_id, id.clone())).cloned()
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<Versioned<Rec>> {
        let rows = self.rows.read().expect("store lock poisoned");
        rows.iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn scan(&self, tenant_id: TenantId, predicate: impl Fn(&Rec) -> bool) -> Vec<Rec> {
        self.list(tenant_id)
            .into_iter()
            .filter(|v| predicate(&v.value))
            .map(|v| v.value)
            .collect()
    }

    /// Insert a brand-new row directly (no staging, no transaction). Used
    /// outside session scope for single-row, non-coordinated writes such as
    /// append-only audit events.
    pub fn insert_now(&self, tenant_id: TenantId, id: Id, value: Rec) -> StoreResult<u64> {
        let mut rows = self.rows.write().expect("store lock poisoned");
        let key = (tenant_id, id);
        if rows.contains_key(&key) {
            return Err(StoreError::DuplicateKey);
        }
        rows.insert(key, Versioned { value, version: 1 });
        Ok(1)
    }

    /// Stage an insert: fails at commit time if the id already exists.
    pub fn stage_insert(&self, tenant_id: TenantId, id: Id, value: Rec) -> Box<dyn StagedWrite> {
        Box::new(InsertOp {
            table: self.clone(),
            tenant_id,
            id,
            value,
        })
    }

    /// Stage a compare-and-set update: fails at commit time if the row's
    /// version has moved since `expected_version` was read.
    pub fn stage_update(
        &self,
        tenant_id: TenantId,
        id: Id,
        expected_version: u64,
        value: Rec,
    ) -> Box<dyn StagedWrite> {
        Box::new(UpdateOp {
            table: self.clone(),
            tenant_id,
            id,
            expected_version,
            value,
        })
    }
}

struct InsertOp<Id, Rec> {
    table: InMemoryTenantTable<Id, Rec>,
    tenant_id: TenantId,
    id: Id,
    value: Rec,
}

impl<Id, Rec> StagedWrite for InsertOp<Id, Rec>
where
    Id: Eq + Hash + Clone + Send + Sync + 'static,
    Rec: Clone + Send + Sync + 'static,
{
    fn validate(&self) -> StoreResult<()> {
        let rows = self.table.rows.read().expect("store lock poisoned");
        if rows.contains_key(&(self.tenant_id.clone(), self.id.clone())) {
            return Err(StoreError::DuplicateKey);
        }
        Ok(())
    }

    fn apply(self: Box<Self>) {
        let mut rows = self.table.rows.write().expect("store lock poisoned");
        rows.insert(
            (self.tenant_id, self.id),
            Versioned {
                value: self.value,
                version: 1,
            },
        );
    }
}

struct UpdateOp<Id, Rec> {
    table: InMemoryTenantTable<Id, Rec>,
    tenant_id: TenantId,
    id: Id,
    expected_version: u64,
    value: Rec,
}

impl<Id, Rec> StagedWrite for UpdateOp<Id, Rec>
where
    Id: Eq + Hash + Clone + Send + Sync + 'static,
    Rec: Clone + Send + Sync + 'static,
{
    fn validate(&self) -> StoreResult<()> {
        let rows = self.table.rows.read().expect("store lock poisoned");
        match rows.get(&(self.tenant_id.clone(), self.id.clone())) {
            None => Err(StoreError::NotFound),
            Some(row) if row.version != self.expected_version => Err(StoreError::Conflict {
                expected: self.expected_version,
                actual: row.version,
            }),
            Some(_) => Ok(()),
        }
    }

    fn apply(self: Box<Self>) {
        let mut rows = self.table.rows.write().expect("store lock poisoned");
        let key = (self.tenant_id, self.id);
        let next_version = rows.get(&key).map(|r| r.version + 1).unwrap_or(1);
        rows.insert(
            key,
            Versioned {
                value: self.value,
                version: next_version,
            },
        );
    }
}

/// Tenant-partitioned unique index mapping a business key to a single id.
///
/// Used for the uniqueness constraints the data model calls for directly:
/// `(tenant, invoice_number, vendor)`, `(tenant, po_number)`, and
/// `(tenant, normalized_name)`.
pub struct InMemoryUniqueIndex<Key, Id> {
    rows: Arc<RwLock<HashMap<(TenantId, Key), Id>>>,
}

impl<Key, Id> Clone for InMemoryUniqueIndex<Key, Id> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<Key, Id> Default for InMemoryUniqueIndex<Key, Id>
where
    Key: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Key, Id> InMemoryUniqueIndex<Key, Id>
where
    Key: Eq + Hash + Clone + Send + Sync + 'static,
    Id: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn get(&self, tenant_id: TenantId, key: &Key) -> Option<Id> {
        let rows = self.rows.read().expect("store lock poisoned");
        rows.get(&(tenant_id, key.clone())).cloned()
    }

    pub fn claim_now(&self, tenant_id: TenantId, key: Key, id: Id) -> StoreResult<()> {
        let mut rows = self.rows.write().expect("store lock poisoned");
        let entry = (tenant_id, key);
        if rows.contains_key(&entry) {
            return Err(StoreError::DuplicateKey);
        }
        rows.insert(entry, id);
        Ok(())
    }

    pub fn stage_claim(&self, tenant_id: TenantId, key: Key, id: Id) -> Box<dyn StagedWrite> {
        Box::new(ClaimOp {
            index: self.clone(),
            tenant_id,
            key,
            id,
        })
    }
}

struct ClaimOp<Key, Id> {
    index: InMemoryUniqueIndex<Key, Id>,
    tenant_id: TenantId,
    key: Key,
    id: Id,
}

impl<Key, Id> StagedWrite for ClaimOp<Key, Id>
where
    Key: Eq + Hash + Clone + Send + Sync + 'static,
    Id: Clone + Send + Sync + 'static,
{
    fn validate(&self) -> StoreResult<()> {
        let rows = self.index.rows.read().expect("store lock poisoned");
        if rows.contains_key(&(self.tenant_id.clone(), self.key.clone())) {
            return Err(StoreError::DuplicateKey);
        }
        Ok(())
    }

    fn apply(self: Box<Self>) {
        let mut rows = self.index.rows.write().expect("store lock poisoned");
        rows.insert((self.tenant_id, self.key), self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_conflicting_update_rejected() {
        let table: InMemoryTenantTable<u32, &'static str> = InMemoryTenantTable::new();
        let tenant = TenantId::new();
        table.insert_now(tenant, 1, "a").unwrap();

        let stale = table.stage_update(tenant, 1, 1, "b");
        stale.validate().unwrap();
        stale.apply();

        let conflicting = table.stage_update(tenant, 1, 1, "c");
        assert!(matches!(
            conflicting.validate(),
            Err(StoreError::Conflict { .. })
        ));
    }

    #[test]
    fn tenants_are_isolated() {
        let table: InMemoryTenantTable<u32, &'static str> = InMemoryTenantTable::new();
        let a = TenantId::new();
        let b = TenantId::new();
        table.insert_now(a, 1, "a-row").unwrap();
        assert!(table.get(b, &1).is_none());
        assert_eq!(table.get(a, &1).unwrap().value, "a-row");
    }

    #[test]
    fn unique_index_rejects_duplicate_key() {
        let index: InMemoryUniqueIndex<String, u32> = InMemoryUniqueIndex::new();
        let tenant = TenantId::new();
        index.claim_now(tenant, "acme".into(), 1).unwrap();
        assert!(matches!(
            index.claim_now(tenant, "acme".into(), 2),
            Err(StoreError::DuplicateKey)
        ));
    }
}
