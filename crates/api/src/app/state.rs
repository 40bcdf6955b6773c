//! Shared application state: one repository per domain crate, plus the
//! cross-cutting infra (idempotency registry, rule resolver, event bus).
//!
//! This replaces the teacher's event-sourced `AppServices` enum
//! (`InMemory`/`Persistent` wrapping a `CommandDispatcher`): this workspace
//! persists through `reconap-store`'s tenant-scoped CRUD tables, not an
//! event log, so there is nothing to dispatch commands through — handlers
//! call repositories directly.

use std::sync::Arc;

use reconap_core::EngineConfig;
use reconap_events::InMemoryEventBus;
use reconap_exceptions::ExceptionRepository;
use reconap_idempotency::IdempotencyRegistry;
use reconap_invoicing::InvoiceRepository;
use reconap_matching::MatchingRepository;
use reconap_purchasing::PurchaseOrderRepository;
use reconap_receipts::ReceiptRepository;
use reconap_rules::RuleResolver;
use reconap_vendors::VendorRepository;

use crate::app::events::DomainEvent;

pub struct AppState {
    pub config: EngineConfig,
    pub vendors: VendorRepository,
    pub purchase_orders: PurchaseOrderRepository,
    pub receipts: ReceiptRepository,
    pub invoices: InvoiceRepository,
    pub matching: MatchingRepository,
    pub exceptions: ExceptionRepository,
    pub idempotency: IdempotencyRegistry,
    pub rules: RuleResolver,
    pub events: InMemoryEventBus<DomainEvent>,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        let rule_cache_ttl = config.rule_cache_ttl;
        Arc::new(Self {
            config,
            vendors: VendorRepository::new(),
            purchase_orders: PurchaseOrderRepository::new(),
            receipts: ReceiptRepository::new(),
            invoices: InvoiceRepository::new(),
            matching: MatchingRepository::new(),
            exceptions: ExceptionRepository::new(),
            idempotency: IdempotencyRegistry::new(),
            rules: RuleResolver::new(rule_cache_ttl),
            events: InMemoryEventBus::new(),
        })
    }

    /// Best-effort publish: failures are logged, never propagated to the
    /// caller, matching `reconap-events`' "at-least-once, not the source of
    /// truth" contract.
    pub fn publish(&self, event: DomainEvent) {
        use reconap_events::EventBus;
        if let Err(err) = self.events.publish(event) {
            tracing::warn!(?err, "failed to publish domain event");
        }
    }
}
