use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use reconap_core::{AuditEventId, InvoiceId, MatchResultId, TenantId};

use crate::match_result::ComponentScores;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    System,
    User,
}

/// Append-only record of one matching decision. `content_hash` commits to
/// every field below plus `previous_hash`, so retroactively editing any
/// event (or reordering the chain) is detectable by recomputing hashes
/// forward from the first event for the invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAuditEvent {
    pub id: AuditEventId,
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub match_result_id: Option<MatchResultId>,
    pub inputs_hash: String,
    pub rule_set_version: String,
    pub algorithm_version: u32,
    pub component_scores: ComponentScores,
    pub final_score: f64,
    pub decision: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
    pub previous_hash: Option<String>,
    pub content_hash: String,
}

#[allow(clippy::too_many_arguments)]
pub fn build_event(
    id: AuditEventId,
    tenant_id: TenantId,
    invoice_id: InvoiceId,
    match_result_id: Option<MatchResultId>,
    inputs_hash: String,
    rule_set_version: String,
    component_scores: ComponentScores,
    final_score: f64,
    decision: String,
    actor: Actor,
    occurred_at: DateTime<Utc>,
    previous_hash: Option<String>,
) -> MatchAuditEvent {
    let content_hash = compute_content_hash(
        &id,
        &tenant_id,
        &invoice_id,
        &match_result_id,
        &inputs_hash,
        &rule_set_version,
        &component_scores,
        final_score,
        &decision,
        actor,
        &occurred_at,
        &previous_hash,
    );

    MatchAuditEvent {
        id,
        tenant_id,
        invoice_id,
        match_result_id,
        inputs_hash,
        rule_set_version,
        algorithm_version: crate::match_result::ALGORITHM_VERSION,
        component_scores,
        final_score,
        decision,
        actor,
        occurred_at,
        previous_hash,
        content_hash,
    }
}

#[allow(clippy::too_many_arguments)]
fn compute_content_hash(
    id: &AuditEventId,
    tenant_id: &TenantId,
    invoice_id: &InvoiceId,
    match_result_id: &Option<MatchResultId>,
    inputs_hash: &str,
    rule_set_version: &str,
    component_scores: &ComponentScores,
    final_score: f64,
    decision: &str,
    actor: Actor,
    occurred_at: &DateTime<Utc>,
    previous_hash: &Option<String>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_uuid().as_bytes());
    hasher.update(tenant_id.as_uuid().as_bytes());
    hasher.update(invoice_id.as_uuid().as_bytes());
    if let Some(mr) = match_result_id {
        hasher.update(mr.as_uuid().as_bytes());
    }
    hasher.update(inputs_hash.as_bytes());
    hasher.update(rule_set_version.as_bytes());
    hasher.update(format!("{component_scores:?}").as_bytes());
    hasher.update(final_score.to_bits().to_le_bytes());
    hasher.update(decision.as_bytes());
    hasher.update([actor as u8]);
    hasher.update(occurred_at.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    if let Some(prev) = previous_hash {
        hasher.update(prev.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Minimal hex encoding so the crate does not need a standalone `hex`
/// dependency for this single call site.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Verifies that a chain of events (ordered oldest-first, for one invoice)
/// is internally consistent: each event's `previous_hash` points at the
/// prior event's `content_hash`, and each `content_hash` recomputes.
pub fn verify_chain(events: &[MatchAuditEvent]) -> bool {
    let mut expected_previous: Option<&str> = None;
    for event in events {
        if event.previous_hash.as_deref() != expected_previous {
            return false;
        }
        let recomputed = compute_content_hash(
            &event.id,
            &event.tenant_id,
            &event.invoice_id,
            &event.match_result_id,
            &event.inputs_hash,
            &event.rule_set_version,
            &event.component_scores,
            event.final_score,
            &event.decision,
            event.actor,
            &event.occurred_at,
            &event.previous_hash,
        );
        if recomputed != event.content_hash {
            return false;
        }
        expected_previous = Some(&event.content_hash);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> ComponentScores {
        ComponentScores { reference: 1.0, amount: 1.0, vendor: 0.9, date: 1.0, line: 0.5 }
    }

    #[test]
    fn chain_of_two_events_verifies() {
        let tenant = TenantId::new();
        let invoice = InvoiceId::new();
        let first = build_event(
            AuditEventId::new(),
            tenant,
            invoice,
            None,
            "hash1".into(),
            "v1".into(),
            scores(),
            0.9,
            "auto_matched".into(),
            Actor::System,
            Utc::now(),
            None,
        );
        let second = build_event(
            AuditEventId::new(),
            tenant,
            invoice,
            None,
            "hash2".into(),
            "v1".into(),
            scores(),
            0.95,
            "approved".into(),
            Actor::User,
            Utc::now(),
            Some(first.content_hash.clone()),
        );

        assert!(verify_chain(&[first, second]));
    }

    #[test]
    fn tampering_with_a_field_breaks_the_chain() {
        let tenant = TenantId::new();
        let invoice = InvoiceId::new();
        let mut first = build_event(
            AuditEventId::new(),
            tenant,
            invoice,
            None,
            "hash1".into(),
            "v1".into(),
            scores(),
            0.9,
            "auto_matched".into(),
            Actor::System,
            Utc::now(),
            None,
        );
        first.final_score = 0.99; // tamper without recomputing content_hash
        assert!(!verify_chain(&[first]));
    }
}
