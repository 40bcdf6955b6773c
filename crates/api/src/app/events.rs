//! Domain events published to the best-effort notification/audit-export
//! collaborator (spec.md §6) via `reconap-events`.

use chrono::{DateTime, Utc};
use reconap_core::{ExceptionEntryId, InvoiceId, MatchResultId, TenantId};
use reconap_events::Event;

#[derive(Debug, Clone)]
pub enum DomainEvent {
    InvoiceCreated { tenant_id: TenantId, invoice_id: InvoiceId, occurred_at: DateTime<Utc> },
    ImportCompleted { tenant_id: TenantId, accepted: usize, rejected: usize, occurred_at: DateTime<Utc> },
    MatchRunCompleted { tenant_id: TenantId, invoice_id: InvoiceId, occurred_at: DateTime<Utc> },
    MatchDecided { tenant_id: TenantId, match_id: MatchResultId, approved: bool, occurred_at: DateTime<Utc> },
    ExceptionEnqueued { tenant_id: TenantId, exception_id: ExceptionEntryId, occurred_at: DateTime<Utc> },
    ExceptionDecided { tenant_id: TenantId, exception_id: ExceptionEntryId, occurred_at: DateTime<Utc> },
}

impl Event for DomainEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::InvoiceCreated { .. } => "reconap.invoice.created",
            DomainEvent::ImportCompleted { .. } => "reconap.import.completed",
            DomainEvent::MatchRunCompleted { .. } => "reconap.match.run_completed",
            DomainEvent::MatchDecided { .. } => "reconap.match.decided",
            DomainEvent::ExceptionEnqueued { .. } => "reconap.exception.enqueued",
            DomainEvent::ExceptionDecided { .. } => "reconap.exception.decided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::InvoiceCreated { occurred_at, .. }
            | DomainEvent::ImportCompleted { occurred_at, .. }
            | DomainEvent::MatchRunCompleted { occurred_at, .. }
            | DomainEvent::MatchDecided { occurred_at, .. }
            | DomainEvent::ExceptionEnqueued { occurred_at, .. }
            | DomainEvent::ExceptionDecided { occurred_at, .. } => *occurred_at,
        }
    }
}
