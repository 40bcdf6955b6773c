use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use reconap_core::{Entity, InvoiceId, MatchResultId};
use reconap_matching::run_match;

use crate::app::dto::{parse_id, ReviewDecisionRequest};
use crate::app::errors::ApiError;
use crate::app::events::DomainEvent;
use crate::app::idempotency::{self, IdempotencyGuard};
use crate::app::state::AppState;
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/invoices/:invoice_id/matches", get(list_matches))
        .route("/invoices/:invoice_id/matches/run", post(run_match_for_invoice))
        .route("/matches/:id/approve", post(approve_match))
        .route("/matches/:id/reject", post(reject_match))
}

async fn list_matches(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(invoice_id): Path<String>,
) -> Response {
    match handle_list(&state, &tenant, &principal, &invoice_id) {
        Ok(items) => (axum::http::StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_list(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, invoice_id: &str) -> Result<Vec<reconap_matching::MatchResult>, ApiError> {
    require_permission(tenant, principal, "matches.read")?;
    let invoice_id: InvoiceId = parse_id(invoice_id, "invoice_id")?;
    Ok(state.matching.list_results_for_invoice(tenant.tenant_id(), invoice_id))
}

async fn run_match_for_invoice(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Path(invoice_id): Path<String>,
) -> Response {
    match handle_run(&state, &tenant, &principal, &headers, &invoice_id) {
        Ok((results, guard)) => {
            let response = serde_json::to_value(&results).expect("match results serialize");
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 200, response.clone()) {
                return err.into_response();
            }
            (axum::http::StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn handle_run(
    state: &AppState,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    headers: &HeaderMap,
    invoice_id_raw: &str,
) -> Result<(Vec<reconap_matching::MatchResult>, IdempotencyGuard), ApiError> {
    require_permission(tenant, principal, "matches.run")?;
    let invoice_id: InvoiceId = parse_id(invoice_id_raw, "invoice_id")?;
    let path = format!("/v1/invoices/{invoice_id_raw}/matches/run");
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "POST", &path, &serde_json::Value::Null)?;

    let invoice = state.invoices.get(tenant.tenant_id(), invoice_id).ok_or_else(|| ApiError::NotFound(format!("invoice {invoice_id_raw} not found")))?;
    let invoice_vendor = state.vendors.get(tenant.tenant_id(), invoice.vendor_id()).ok_or_else(|| ApiError::NotFound("invoice vendor not found".to_string()))?;
    let candidate_pos = state.purchase_orders.list_open_by_vendor(tenant.tenant_id(), invoice.vendor_id());

    let rule_set = state.rules.resolve(tenant.tenant_id(), invoice.vendor_id(), None, invoice.total_amount());
    let previous_hash = state.matching.last_audit_hash_for_invoice(tenant.tenant_id(), invoice_id);

    let tenant_id = tenant.tenant_id();
    let now = Utc::now();
    let run = run_match(
        &invoice,
        &invoice_vendor,
        None,
        &candidate_pos,
        |po| state.vendors.get(tenant_id, po.vendor_id()),
        |po| state.receipts.list_by_po(tenant_id, *po.id()),
        &rule_set,
        "built_in".to_string(),
        previous_hash,
        now,
    );

    let mut session = reconap_store::Session::begin(tenant_id, reconap_store::Isolation::ReadCommitted);
    state.matching.stage_run(&mut session, tenant_id, invoice_id, &run.results, &run.audit_events)?;
    session.commit()?;

    if let Some(reason) = run.exception {
        enqueue_exception(state, tenant, &invoice, reason, &run.results, now)?;
    }

    state.publish(DomainEvent::MatchRunCompleted { tenant_id, invoice_id, occurred_at: now });
    Ok((run.results, guard))
}

fn enqueue_exception(
    state: &AppState,
    tenant: &TenantContext,
    invoice: &reconap_invoicing::Invoice,
    reason: reconap_matching::ExceptionReason,
    results: &[reconap_matching::MatchResult],
    now: chrono::DateTime<Utc>,
) -> Result<(), ApiError> {
    use reconap_exceptions::ExceptionReason as QueueReason;
    use reconap_matching::ExceptionReason as EngineReason;

    let queue_reason = match reason {
        EngineReason::NoCandidate => QueueReason::NoCandidate,
        EngineReason::BelowThreshold => QueueReason::BelowThreshold,
        EngineReason::MultipleCandidates => QueueReason::MultipleCandidates,
    };
    let suggested_matches = results.iter().map(|r| *r.id()).collect::<Vec<_>>();
    let context = serde_json::json!({ "invoice_number": invoice.invoice_number() });
    let priority = compute_priority_for(state, tenant, invoice.total_amount(), now);

    let entry = state.exceptions.enqueue(
        tenant.tenant_id(),
        *invoice.id(),
        invoice.vendor_id(),
        invoice.total_amount(),
        queue_reason,
        priority,
        suggested_matches,
        context,
        now,
    )?;
    state.publish(DomainEvent::ExceptionEnqueued { tenant_id: tenant.tenant_id(), exception_id: *entry.id(), occurred_at: now });
    Ok(())
}

/// Computes the population-relative priority for a newly-enqueued
/// exception from the tenant's currently-open exceptions, recomputing the
/// median and 95th percentile of their invoice amounts on every enqueue.
fn compute_priority_for(state: &AppState, tenant: &TenantContext, amount: reconap_core::Money, now: chrono::DateTime<Utc>) -> reconap_exceptions::ExceptionPriority {
    use reconap_core::Money;
    let open = state.exceptions.list(tenant.tenant_id(), reconap_exceptions::ExceptionFilters::default(), now);
    let mut amounts: Vec<Money> = open.iter().map(|e| e.invoice_amount()).collect();
    amounts.push(amount);
    amounts.sort_by(|a, b| a.as_decimal().cmp(&b.as_decimal()));

    let percentile = |p: f64| -> Money {
        if amounts.is_empty() {
            return Money::ZERO;
        }
        let rank = ((amounts.len() as f64 - 1.0) * p).round() as usize;
        amounts[rank.min(amounts.len() - 1)]
    };
    let median = percentile(0.5);
    let p95 = percentile(0.95);
    reconap_exceptions::compute_priority(amount, p95, median, 0)
}

async fn approve_match(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReviewDecisionRequest>,
) -> Response {
    match decide(&state, &tenant, &principal, &headers, &id, body, true) {
        Ok((result, guard)) => {
            let response = serde_json::to_value(&result).expect("MatchResult serializes");
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 200, response.clone()) {
                return err.into_response();
            }
            (axum::http::StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

async fn reject_match(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ReviewDecisionRequest>,
) -> Response {
    match decide(&state, &tenant, &principal, &headers, &id, body, false) {
        Ok((result, guard)) => {
            let response = serde_json::to_value(&result).expect("MatchResult serializes");
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 200, response.clone()) {
                return err.into_response();
            }
            (axum::http::StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn decide(
    state: &AppState,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    headers: &HeaderMap,
    id: &str,
    body: ReviewDecisionRequest,
    approve: bool,
) -> Result<(reconap_matching::MatchResult, IdempotencyGuard), ApiError> {
    require_permission(tenant, principal, "matches.decide")?;
    let request_json = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    let path = format!("/v1/matches/{id}/{}", if approve { "approve" } else { "reject" });
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "POST", &path, &request_json)?;

    let match_id: MatchResultId = parse_id(id, "id")?;
    let reviewed_by: reconap_core::UserId = parse_id(&body.reviewed_by, "reviewed_by")?;
    let (mut result, version) = state.matching.get_result_versioned(tenant.tenant_id(), match_id).ok_or_else(|| ApiError::NotFound(format!("match result {id} not found")))?;
    if approve {
        result.approve(Some(reviewed_by), body.notes.clone());
    } else {
        result.reject(Some(reviewed_by), body.notes.clone());
    }
    state.matching.decide_result(tenant.tenant_id(), match_id, version, result.clone())?;
    state.publish(DomainEvent::MatchDecided { tenant_id: tenant.tenant_id(), match_id, approved: approve, occurred_at: Utc::now() });
    Ok((result, guard))
}
