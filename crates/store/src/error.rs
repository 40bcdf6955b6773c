use thiserror::Error;

/// Failure taxonomy for the tenant-scoped store.
///
/// Mirrors the four kinds called out for storage failures: a tenant
/// isolation breach, a write conflict against a stale version, a transient
/// condition worth retrying, and an internal invariant break.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("tenant isolation violation")]
    TenantViolation,

    #[error("business key already exists")]
    DuplicateKey,

    #[error("conflict: record changed since it was read (expected version {expected}, found {actual})")]
    Conflict { expected: u64, actual: u64 },

    #[error("record not found")]
    NotFound,

    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("internal store invariant broken: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
