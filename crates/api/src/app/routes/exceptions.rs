use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use reconap_core::{Entity, ExceptionEntryId, MatchResultId, UserId};
use reconap_exceptions::{Decision, ExceptionEntry, ExceptionFilters, ExceptionPriority, ExceptionReason, ExceptionStatus};

use crate::app::dto::{parse_id, ClaimExceptionRequest, ExceptionDecisionRequest};
use crate::app::errors::ApiError;
use crate::app::events::DomainEvent;
use crate::app::idempotency::{self, IdempotencyGuard};
use crate::app::pagination::{paginate, PageQuery};
use crate::app::state::AppState;
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

#[derive(Debug, serde::Deserialize)]
pub struct ListExceptionsQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub reason: Option<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_exceptions))
        .route("/:id/claim", post(claim_exception))
        .route("/:id/decide", post(decide_exception))
}

async fn list_exceptions(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<PageQuery>,
    Query(filter): Query<ListExceptionsQuery>,
) -> Response {
    match handle_list(&state, &tenant, &principal, &query, &filter) {
        Ok(body) => (axum::http::StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_list(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, query: &PageQuery, filter: &ListExceptionsQuery) -> Result<serde_json::Value, ApiError> {
    require_permission(tenant, principal, "exceptions.read")?;
    let filters = ExceptionFilters {
        status: filter.status.as_deref().map(parse_status).transpose()?,
        priority: filter.priority.as_deref().map(parse_priority).transpose()?,
        reason: filter.reason.as_deref().map(parse_reason).transpose()?,
        ..Default::default()
    };
    let items = state.exceptions.list(tenant.tenant_id(), filters, Utc::now());
    let page = paginate(items, query);
    Ok(serde_json::json!({ "items": page.items, "total": page.total, "page": page.page, "limit": page.limit }))
}

fn parse_status(raw: &str) -> Result<ExceptionStatus, ApiError> {
    match raw {
        "open" => Ok(ExceptionStatus::Open),
        "in_review" => Ok(ExceptionStatus::InReview),
        "resolved" => Ok(ExceptionStatus::Resolved),
        "dismissed" => Ok(ExceptionStatus::Dismissed),
        _ => Err(ApiError::Validation { detail: format!("unknown status {raw:?}"), errors: vec![] }),
    }
}

fn parse_priority(raw: &str) -> Result<ExceptionPriority, ApiError> {
    match raw {
        "low" => Ok(ExceptionPriority::Low),
        "medium" => Ok(ExceptionPriority::Medium),
        "high" => Ok(ExceptionPriority::High),
        "critical" => Ok(ExceptionPriority::Critical),
        _ => Err(ApiError::Validation { detail: format!("unknown priority {raw:?}"), errors: vec![] }),
    }
}

fn parse_reason(raw: &str) -> Result<ExceptionReason, ApiError> {
    match raw {
        "no_candidate" => Ok(ExceptionReason::NoCandidate),
        "below_threshold" => Ok(ExceptionReason::BelowThreshold),
        "multiple_candidates" => Ok(ExceptionReason::MultipleCandidates),
        "currency_mismatch" => Ok(ExceptionReason::CurrencyMismatch),
        "amount_variance" => Ok(ExceptionReason::AmountVariance),
        "date_variance" => Ok(ExceptionReason::DateVariance),
        "data_quality" => Ok(ExceptionReason::DataQuality),
        _ => Err(ApiError::Validation { detail: format!("unknown reason {raw:?}"), errors: vec![] }),
    }
}

async fn claim_exception(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ClaimExceptionRequest>,
) -> Response {
    match handle_claim(&state, &tenant, &principal, &headers, &id, body) {
        Ok((entry, guard)) => {
            let response = serde_json::to_value(&entry).expect("ExceptionEntry serializes");
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 200, response.clone()) {
                return err.into_response();
            }
            (axum::http::StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn handle_claim(
    state: &AppState,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    headers: &HeaderMap,
    id: &str,
    body: ClaimExceptionRequest,
) -> Result<(ExceptionEntry, IdempotencyGuard), ApiError> {
    require_permission(tenant, principal, "exceptions.claim")?;
    let request_json = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    let path = format!("/v1/exceptions/{id}/claim");
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "POST", &path, &request_json)?;

    let exception_id: ExceptionEntryId = parse_id(id, "id")?;
    let user: UserId = parse_id(&body.assigned_to, "assigned_to")?;
    let entry = state.exceptions.claim(tenant.tenant_id(), exception_id, user, Utc::now())?;
    Ok((entry, guard))
}

async fn decide_exception(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    match handle_decide(&state, &tenant, &principal, &headers, &id, body) {
        Ok((entry, guard)) => {
            let response = serde_json::to_value(&entry).expect("ExceptionEntry serializes");
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 200, response.clone()) {
                return err.into_response();
            }
            (axum::http::StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn handle_decide(
    state: &AppState,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    headers: &HeaderMap,
    id: &str,
    raw_body: serde_json::Value,
) -> Result<(ExceptionEntry, IdempotencyGuard), ApiError> {
    require_permission(tenant, principal, "exceptions.decide")?;
    let path = format!("/v1/exceptions/{id}/decide");
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "POST", &path, &raw_body)?;

    let body: ExceptionDecisionRequest = serde_json::from_value(raw_body).map_err(|e| ApiError::Validation { detail: e.to_string(), errors: vec![] })?;
    let exception_id: ExceptionEntryId = parse_id(id, "id")?;

    let (decision, acted_by_raw, notes) = match body {
        ExceptionDecisionRequest::Approve { match_id, acted_by, notes } => {
            let match_id: MatchResultId = parse_id(&match_id, "match_id")?;
            (Decision::Approve(match_id), acted_by, notes)
        }
        ExceptionDecisionRequest::RejectAll { acted_by, notes } => (Decision::RejectAll, acted_by, notes),
        ExceptionDecisionRequest::Defer { until, acted_by, notes } => (Decision::Defer(until), acted_by, notes),
    };
    let acted_by: UserId = parse_id(&acted_by_raw, "acted_by")?;

    let (_, version) = state
        .exceptions
        .get_versioned(tenant.tenant_id(), exception_id)
        .ok_or_else(|| ApiError::NotFound(format!("exception {id} not found")))?;

    let entry = state.exceptions.decide(tenant.tenant_id(), exception_id, version, acted_by, decision, notes, &state.matching, &state.invoices, Utc::now())?;
    state.publish(DomainEvent::ExceptionDecided { tenant_id: tenant.tenant_id(), exception_id, occurred_at: Utc::now() });
    Ok((entry, guard))
}
