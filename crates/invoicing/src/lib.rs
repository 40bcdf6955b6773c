//! Invoice master data: the payable side of every match candidate.

pub mod invoice;
pub mod repository;

pub use invoice::{ImportSource, Invoice, InvoiceStatus, MatchingStatus};
pub use repository::{InvoiceBusinessKey, InvoiceRepository};
