use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reconap_core::TenantId;

use crate::error::IdempotencyError;
use crate::fingerprint::Fingerprint;
use crate::key::IdempotencyKey;

/// The exact response returned on first success, replayed verbatim on
/// retry. `status_code` plus an opaque JSON body is enough to reconstruct
/// an HTTP response at the API boundary without this crate knowing
/// anything about HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone)]
enum Status {
    Pending,
    Completed(StoredResponse),
}

#[derive(Debug, Clone)]
struct Record {
    fingerprint: Fingerprint,
    status: Status,
    created_at: DateTime<Utc>,
}

/// Outcome of a claim attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    /// No prior claim exists (or it expired): the caller may proceed and
    /// must call `complete` once the operation's effects have committed.
    Fresh,
    /// A completed claim with a matching fingerprint already exists; the
    /// caller must not re-execute side effects and should return this
    /// response instead.
    Replay(StoredResponse),
}

/// Minimum retention before a completed or abandoned claim becomes
/// reclaimable, per the registry's 24-hour floor.
pub const MIN_RETENTION: StdDuration = StdDuration::from_secs(24 * 60 * 60);

/// Tenant-scoped idempotency registry.
///
/// `claim` blocks the calling thread while another claim for the same key
/// is still in flight, waking via `Condvar` once `complete` runs — this
/// gives "exactly one sees fresh, the rest see replay" without requiring
/// callers to poll.
#[derive(Default)]
pub struct IdempotencyRegistry {
    records: Mutex<HashMap<(TenantId, IdempotencyKey), Record>>,
    cond: Condvar,
}

impl IdempotencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(
        &self,
        tenant_id: TenantId,
        key: IdempotencyKey,
        fingerprint: Fingerprint,
    ) -> Result<ClaimOutcome, IdempotencyError> {
        let mut guard = self.records.lock().expect("idempotency registry lock poisoned");
        loop {
            match guard.get(&(tenant_id, key.clone())) {
                None => {
                    guard.insert(
                        (tenant_id, key),
                        Record {
                            fingerprint,
                            status: Status::Pending,
                            created_at: Utc::now(),
                        },
                    );
                    return Ok(ClaimOutcome::Fresh);
                }
                Some(record) if record.fingerprint != fingerprint => {
                    return Err(IdempotencyError::KeyReused(key.to_string()));
                }
                Some(record) => match &record.status {
                    Status::Completed(response) => return Ok(ClaimOutcome::Replay(response.clone())),
                    Status::Pending => {
                        guard = self
                            .cond
                            .wait(guard)
                            .expect("idempotency registry lock poisoned");
                    }
                },
            }
        }
    }

    pub fn complete(
        &self,
        tenant_id: TenantId,
        key: IdempotencyKey,
        response: StoredResponse,
    ) -> Result<(), IdempotencyError> {
        let mut guard = self.records.lock().expect("idempotency registry lock poisoned");
        let entry = guard
            .get_mut(&(tenant_id, key.clone()))
            .ok_or_else(|| IdempotencyError::NoPendingClaim(key.to_string()))?;
        entry.status = Status::Completed(response);
        self.cond.notify_all();
        Ok(())
    }

    /// Drop claims older than `ttl`, honoring the registry's minimum
    /// retention floor regardless of what the caller passes.
    pub fn reclaim_expired(&self, ttl: chrono::Duration) -> usize {
        let floor = chrono::Duration::from_std(MIN_RETENTION).unwrap();
        let effective_ttl = ttl.max(floor);
        let now = Utc::now();
        let mut guard = self.records.lock().expect("idempotency registry lock poisoned");
        let before = guard.len();
        guard.retain(|_, record| now - record.created_at < effective_ttl);
        before - guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn key(s: &str) -> IdempotencyKey {
        IdempotencyKey::parse(s).unwrap()
    }

    fn fp() -> Fingerprint {
        Fingerprint::compute("POST", "/v1/invoices", &json!({"a": 1}))
    }

    #[test]
    fn first_claim_is_fresh_second_replays() {
        let registry = IdempotencyRegistry::new();
        let tenant = TenantId::new();
        let k = key("abc");

        assert_eq!(registry.claim(tenant, k.clone(), fp()).unwrap(), ClaimOutcome::Fresh);

        let response = StoredResponse {
            status_code: 201,
            body: json!({"id": "inv-1"}),
        };
        registry.complete(tenant, k.clone(), response.clone()).unwrap();

        assert_eq!(
            registry.claim(tenant, k, fp()).unwrap(),
            ClaimOutcome::Replay(response)
        );
    }

    #[test]
    fn reused_key_with_different_fingerprint_conflicts() {
        let registry = IdempotencyRegistry::new();
        let tenant = TenantId::new();
        let k = key("abc");
        registry.claim(tenant, k.clone(), fp()).unwrap();

        let other_fp = Fingerprint::compute("POST", "/v1/invoices", &json!({"a": 2}));
        let err = registry.claim(tenant, k, other_fp).unwrap_err();
        assert!(matches!(err, IdempotencyError::KeyReused(_)));
    }

    #[test]
    fn concurrent_claim_blocks_until_complete_then_replays() {
        let registry = Arc::new(IdempotencyRegistry::new());
        let tenant = TenantId::new();
        let k = key("concurrent");

        assert_eq!(
            registry.claim(tenant, k.clone(), fp()).unwrap(),
            ClaimOutcome::Fresh
        );

        let registry2 = Arc::clone(&registry);
        let k2 = k.clone();
        let handle = thread::spawn(move || registry2.claim(tenant, k2, fp()));

        thread::sleep(std::time::Duration::from_millis(50));
        let response = StoredResponse {
            status_code: 200,
            body: json!({"ok": true}),
        };
        registry.complete(tenant, k, response.clone()).unwrap();

        let outcome = handle.join().unwrap().unwrap();
        assert_eq!(outcome, ClaimOutcome::Replay(response));
    }
}
