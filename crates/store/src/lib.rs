//! Tenant-scoped storage primitives.
//!
//! This crate deliberately knows nothing about invoices, purchase orders,
//! or any other domain type. It exposes a single versioned, tenant-
//! partitioned table and a matching unique index, plus a `Session` that
//! batches writes against either into one atomic commit. Domain crates
//! (invoicing, purchasing, receipts, vendors, matching, exceptions) each
//! build a small typed repository on top of these primitives, the same way
//! a real deployment would build typed repositories over database tables
//! and indexes.

pub mod error;
pub mod session;
pub mod table;

pub use error::{StoreError, StoreResult};
pub use session::{Isolation, Session};
pub use table::{InMemoryTenantTable, InMemoryUniqueIndex, StagedWrite, Versioned};
