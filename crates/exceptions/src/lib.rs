//! The manual-review queue an invoice lands in when the matching engine
//! can't clear it automatically: enqueue, claim, and decide, with an
//! age/amount priority formula driving review order.

mod exception_entry;
mod repository;

pub use exception_entry::{compute_priority, ExceptionEntry, ExceptionPriority, ExceptionReason, ExceptionStatus};
pub use repository::{Decision, ExceptionFilters, ExceptionRepository};
