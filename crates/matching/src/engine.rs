use chrono::{DateTime, Utc};

use reconap_core::{AuditEventId, Entity, InvoiceId, MatchResultId, Money, TenantId};
use reconap_invoicing::Invoice;
use reconap_purchasing::PurchaseOrder;
use reconap_receipts::Receipt;
use reconap_rules::RuleSet;
use reconap_vendors::Vendor;

use crate::audit::{build_event, Actor, MatchAuditEvent};
use crate::candidates::select_candidates;
use crate::match_result::{ComponentScores, MatchResult, MatchType, ThreeWayType};
use crate::scoring::{composite_score, score_amount, score_date, score_lines, score_reference, score_vendor, MatchedLinePair};
use crate::three_way;

const TOP_K: usize = 3;
const MULTIPLE_CANDIDATES_GAP: f64 = 0.05;
const TIE_BREAK_EPSILON: f64 = 0.001;

pub enum ExceptionReason {
    NoCandidate,
    BelowThreshold,
    MultipleCandidates,
}

/// Everything a single matching run produced for one invoice.
pub struct MatchRun {
    pub results: Vec<MatchResult>,
    pub exception: Option<ExceptionReason>,
    pub audit_events: Vec<MatchAuditEvent>,
}

struct ScoredCandidate<'a> {
    po: &'a PurchaseOrder,
    receipts: Vec<Receipt>,
    scores: ComponentScores,
    composite: f64,
    three_way_type: Option<ThreeWayType>,
}

/// Runs candidate selection, scoring, and decision policy for one invoice
/// and returns every `MatchResult`/audit event the run produced, plus
/// whichever exception (if any) the decision policy calls for.
///
/// `previous_audit_hash` is the last `content_hash` recorded for this
/// invoice, if any, so the new events chain onto prior runs rather than
/// starting a fresh chain on every re-run.
pub fn run_match(
    invoice: &Invoice,
    invoice_vendor: &Vendor,
    invoice_po_reference: Option<&str>,
    candidate_pos: &[PurchaseOrder],
    po_vendor_lookup: impl Fn(&PurchaseOrder) -> Option<Vendor>,
    receipts_lookup: impl Fn(&PurchaseOrder) -> Vec<Receipt>,
    rule_set: &RuleSet,
    rule_set_version: String,
    previous_audit_hash: Option<String>,
    now: DateTime<Utc>,
) -> MatchRun {
    let candidates = select_candidates(invoice, invoice_vendor, candidate_pos, &po_vendor_lookup, receipts_lookup, rule_set.date_tolerance_days);

    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|c| {
            let po = c.po;
            let po_vendor_name = po_vendor_lookup(po).map(|v| v.legal_name().to_string());
            let tax_ids_match = po_vendor_name
                .as_ref()
                .map(|_| false) // tax-id comparison requires both records; left false absent a join here
                .unwrap_or(false);

            let three_way_type = if c.receipts.is_empty() {
                None
            } else {
                let received_total = c.receipts.iter().fold(Money::ZERO, |acc, r| acc.checked_add(r.total_amount()).unwrap_or(acc));
                Some(three_way::classify(invoice.total_amount(), po.total_amount(), received_total, rule_set.over_delivery_tolerance_pct))
            };

            let scores = ComponentScores {
                reference: score_reference(invoice_po_reference, po.po_number()),
                amount: score_amount(invoice.total_amount(), po.total_amount(), rule_set.price_tolerance_pct),
                vendor: score_vendor(
                    invoice_vendor.legal_name(),
                    po_vendor_name.as_deref().unwrap_or(invoice_vendor.legal_name()),
                    tax_ids_match,
                ),
                date: score_date(invoice.invoice_date(), po.po_date(), rule_set.date_tolerance_days),
                line: score_received_lines(po, &c.receipts, rule_set),
            };
            let composite = composite_score(scores);
            ScoredCandidate { po, receipts: c.receipts, scores, composite, three_way_type }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| tie_break(a, b, invoice))
    });

    let mut results = Vec::new();
    let mut audit_events = Vec::new();
    let mut chain_tail = previous_audit_hash;
    let mut exception = None;

    if scored.is_empty() {
        exception = Some(ExceptionReason::NoCandidate);
        let event = record_audit(invoice.tenant_id(), *invoice.id(), None, rule_set_version, ComponentScores { reference: 0.0, amount: 0.0, vendor: 0.0, date: 0.0, line: 0.0 }, 0.0, "no_candidate".to_string(), now, &mut chain_tail);
        audit_events.push(event);
        return MatchRun { results, exception, audit_events };
    }

    let best = &scored[0];
    if best.composite >= to_f64(rule_set.auto_approve_threshold) {
        let mut result = new_match_result(invoice, best, now);
        let event = record_audit(
            invoice.tenant_id(),
            *invoice.id(),
            Some(*result.id()),
            rule_set_version,
            best.scores,
            best.composite,
            "auto_matched".to_string(),
            now,
            &mut chain_tail,
        );
        audit_events.push(event);
        result.approve(None, Some("auto-approved: composite score cleared auto-approve threshold".to_string()));
        results.push(result);
    } else {
        let reason = if best.composite >= to_f64(rule_set.manual_review_threshold)
            && scored.len() >= 2
            && (scored[0].composite - scored[1].composite).abs() < MULTIPLE_CANDIDATES_GAP
        {
            ExceptionReason::MultipleCandidates
        } else {
            ExceptionReason::BelowThreshold
        };
        exception = Some(reason);

        for candidate in scored.iter().take(TOP_K) {
            let result = new_match_result(invoice, candidate, now);
            let event = record_audit(
                invoice.tenant_id(),
                *invoice.id(),
                Some(*result.id()),
                rule_set_version.clone(),
                candidate.scores,
                candidate.composite,
                "pending_review".to_string(),
                now,
                &mut chain_tail,
            );
            audit_events.push(event);
            results.push(result);
        }
    }

    MatchRun { results, exception, audit_events }
}

/// Builds S_line from the PO's lines against whatever this candidate has had
/// received so far. Receipts carry no per-line unit price, so price
/// agreement at the line level can't be judged independently of the
/// aggregate amount score; every line is treated as price-matching and only
/// quantity agreement varies the result.
fn score_received_lines(po: &PurchaseOrder, receipts: &[Receipt], rule_set: &RuleSet) -> f64 {
    if receipts.is_empty() {
        return score_lines(&[], 0);
    }
    let pairs: Vec<MatchedLinePair> = po
        .line_items()
        .iter()
        .map(|line| {
            let received_qty: i64 = receipts
                .iter()
                .flat_map(|r| r.line_items())
                .filter(|l| l.po_line_no == line.line_no)
                .map(|l| l.received_qty)
                .sum();
            let delta = (received_qty - line.ordered_qty).abs();
            let variance_ratio = if line.ordered_qty == 0 { 0.0 } else { delta as f64 / line.ordered_qty as f64 };
            let within_pct = variance_ratio <= to_f64(rule_set.qty_tolerance_pct);
            let within_abs = delta <= rule_set.qty_tolerance_abs;
            MatchedLinePair {
                quantity_within_tolerance: within_pct || within_abs,
                unit_price_within_tolerance: true,
                quantity_variance_ratio: variance_ratio,
                price_variance_ratio: 0.0,
            }
        })
        .collect();
    score_lines(&pairs, 0)
}

fn new_match_result(invoice: &Invoice, candidate: &ScoredCandidate, now: DateTime<Utc>) -> MatchResult {
    let (match_type, receipt_id) = match &candidate.three_way_type {
        Some(_) => (MatchType::ThreeWay, candidate.receipts.first().map(|r| *r.id())),
        None if candidate.scores.reference >= 0.999 => (MatchType::Exact, None),
        None if candidate.composite >= 0.85 => (MatchType::Fuzzy, None),
        None => (MatchType::Tolerance, None),
    };
    MatchResult::new(
        MatchResultId::new(),
        invoice.tenant_id(),
        *invoice.id(),
        Some(*candidate.po.id()),
        receipt_id,
        match_type,
        candidate.composite,
        candidate.scores,
        Vec::new(),
        candidate.three_way_type,
        now,
    )
}

#[allow(clippy::too_many_arguments)]
fn record_audit(
    tenant_id: TenantId,
    invoice_id: InvoiceId,
    match_result_id: Option<MatchResultId>,
    rule_set_version: String,
    scores: ComponentScores,
    final_score: f64,
    decision: String,
    now: DateTime<Utc>,
    chain_tail: &mut Option<String>,
) -> MatchAuditEvent {
    let event = build_event(
        AuditEventId::new(),
        tenant_id,
        invoice_id,
        match_result_id,
        inputs_hash(tenant_id, invoice_id, &decision),
        rule_set_version,
        scores,
        final_score,
        decision,
        Actor::System,
        now,
        chain_tail.clone(),
    );
    *chain_tail = Some(event.content_hash.clone());
    event
}

fn inputs_hash(tenant_id: TenantId, invoice_id: InvoiceId, decision: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_uuid().as_bytes());
    hasher.update(invoice_id.as_uuid().as_bytes());
    hasher.update(decision.as_bytes());
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

fn to_f64(d: rust_decimal::Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}

fn tie_break(a: &ScoredCandidate, b: &ScoredCandidate, invoice: &Invoice) -> std::cmp::Ordering {
    if (a.composite - b.composite).abs() >= TIE_BREAK_EPSILON {
        return std::cmp::Ordering::Equal;
    }
    let a_exact_ref = a.scores.reference >= 0.999;
    let b_exact_ref = b.scores.reference >= 0.999;
    if a_exact_ref != b_exact_ref {
        return b_exact_ref.cmp(&a_exact_ref);
    }
    let a_date_delta = (invoice.invoice_date() - a.po.po_date()).num_days().abs();
    let b_date_delta = (invoice.invoice_date() - b.po.po_date()).num_days().abs();
    if a_date_delta != b_date_delta {
        return a_date_delta.cmp(&b_date_delta);
    }
    let a_amount_delta = invoice.total_amount().abs_diff(a.po.total_amount());
    let b_amount_delta = invoice.total_amount().abs_diff(b.po.total_amount());
    if a_amount_delta != b_amount_delta {
        return a_amount_delta.cmp(&b_amount_delta);
    }
    a.po.po_date().cmp(&b.po.po_date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use reconap_core::{Money, PurchaseOrderId, TenantId, VendorId};
    use reconap_invoicing::ImportSource;
    use reconap_purchasing::PoLineItem;

    fn vendor(tenant: TenantId, name: &str) -> Vendor {
        Vendor::register(VendorId::new(), tenant, name.to_string(), None, None, 30, Utc::now()).unwrap()
    }

    fn po(tenant: TenantId, vendor_id: VendorId, number: &str, total: &str, date: NaiveDate) -> PurchaseOrder {
        PurchaseOrder::new(
            PurchaseOrderId::new(),
            tenant,
            number.to_string(),
            vendor_id,
            "usd".to_string(),
            date,
            None,
            vec![PoLineItem::new(1, "SKU".to_string(), "widget".to_string(), 1, Money::parse(total).unwrap()).unwrap()],
            Utc::now(),
        )
        .unwrap()
    }

    fn invoice(tenant: TenantId, vendor_id: VendorId, total: &str, date: NaiveDate) -> Invoice {
        Invoice::new(
            reconap_core::InvoiceId::new(),
            tenant,
            "INV-1".to_string(),
            vendor_id,
            None,
            Money::parse(total).unwrap(),
            Money::ZERO,
            Money::parse(total).unwrap(),
            "usd".to_string(),
            date,
            None,
            date,
            ImportSource::DirectApi,
            serde_json::json!({}),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn exact_reference_and_amount_match_auto_approves() {
        let tenant = TenantId::new();
        let v = vendor(tenant, "Acme Supply");
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let purchase_order = po(tenant, *v.id(), "PO-2026-001", "100.00", date);
        let inv = invoice(tenant, *v.id(), "100.00", date);
        let rules = RuleSet::built_in_default();

        let run = run_match(
            &inv,
            &v,
            Some("PO-2026-001"),
            std::slice::from_ref(&purchase_order),
            |_| None,
            |_| Vec::new(),
            &rules,
            "v1".to_string(),
            None,
            Utc::now(),
        );

        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].status(), crate::match_result::MatchResultStatus::Approved);
        assert!(run.exception.is_none());
        assert_eq!(run.audit_events.len(), 1);
        assert!(run.audit_events[0].previous_hash.is_none());
    }

    #[test]
    fn no_candidates_produces_no_candidate_exception() {
        let tenant = TenantId::new();
        let v = vendor(tenant, "Acme Supply");
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let inv = invoice(tenant, *v.id(), "100.00", date);
        let rules = RuleSet::built_in_default();

        let run = run_match(&inv, &v, None, &[], |_| None, |_| Vec::new(), &rules, "v1".to_string(), None, Utc::now());

        assert!(run.results.is_empty());
        assert!(matches!(run.exception, Some(ExceptionReason::NoCandidate)));
        assert_eq!(run.audit_events.len(), 1);
    }

    #[test]
    fn weak_match_without_reference_goes_to_review_with_top_candidates() {
        let tenant = TenantId::new();
        let v = vendor(tenant, "Acme Supply");
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let purchase_order = po(tenant, *v.id(), "PO-9", "100.00", date);
        let inv = invoice(tenant, *v.id(), "120.00", date);
        let rules = RuleSet::built_in_default();

        let run = run_match(
            &inv,
            &v,
            None,
            std::slice::from_ref(&purchase_order),
            |_| None,
            |_| Vec::new(),
            &rules,
            "v1".to_string(),
            None,
            Utc::now(),
        );

        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].status(), crate::match_result::MatchResultStatus::Pending);
        assert!(matches!(run.exception, Some(ExceptionReason::BelowThreshold)));
    }

    #[test]
    fn audit_events_chain_onto_prior_hash() {
        let tenant = TenantId::new();
        let v = vendor(tenant, "Acme Supply");
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let purchase_order = po(tenant, *v.id(), "PO-2026-001", "100.00", date);
        let inv = invoice(tenant, *v.id(), "100.00", date);
        let rules = RuleSet::built_in_default();

        let run = run_match(
            &inv,
            &v,
            Some("PO-2026-001"),
            std::slice::from_ref(&purchase_order),
            |_| None,
            |_| Vec::new(),
            &rules,
            "v1".to_string(),
            Some("previous-run-hash".to_string()),
            Utc::now(),
        );

        assert_eq!(run.audit_events[0].previous_hash.as_deref(), Some("previous-run-hash"));
    }

    #[test]
    fn matching_receipt_produces_three_way_perfect_match() {
        let tenant = TenantId::new();
        let v = vendor(tenant, "Acme Supply");
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let purchase_order = po(tenant, *v.id(), "PO-2026-001", "100.00", date);
        let receipt = Receipt::new(
            reconap_core::ReceiptId::new(),
            tenant,
            None,
            &purchase_order,
            date,
            Money::parse("100.00").unwrap(),
            vec![reconap_receipts::ReceiptLineItem { po_line_no: 1, received_qty: 1 }],
            Utc::now(),
        )
        .unwrap();
        let inv = invoice(tenant, *v.id(), "100.00", date);
        let rules = RuleSet::built_in_default();

        let run = run_match(
            &inv,
            &v,
            Some("PO-2026-001"),
            std::slice::from_ref(&purchase_order),
            |_| None,
            |_| vec![receipt.clone()],
            &rules,
            "v1".to_string(),
            None,
            Utc::now(),
        );

        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].match_type(), MatchType::ThreeWay);
        assert_eq!(run.results[0].three_way_type(), Some(ThreeWayType::PerfectMatch));
        assert_eq!(run.results[0].receipt_id(), Some(*reconap_core::Entity::id(&receipt)));
    }
}
