use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};

use reconap_core::{Money, VendorId};
use reconap_rules::{RuleSet, RuleSetOverride};

use crate::app::dto::{parse_id, parse_money};
use crate::app::errors::ApiError;
use crate::app::idempotency::{self, IdempotencyGuard};
use crate::app::state::AppState;
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

#[derive(Debug, serde::Deserialize)]
pub struct ResolveQuery {
    pub vendor_id: String,
    pub vendor_category: Option<String>,
    pub amount: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/resolve", get(resolve_tolerances))
        .route("/global", put(put_global))
        .route("/vendor-categories/:category", put(put_vendor_category))
        .route("/vendors/:vendor_id", put(put_vendor))
        .route("/amount-bands/:label", put(put_amount_band))
}

async fn resolve_tolerances(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ResolveQuery>,
) -> Response {
    match handle_resolve(&state, &tenant, &principal, &query) {
        Ok(rule_set) => (axum::http::StatusCode::OK, Json(rule_set)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_resolve(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, query: &ResolveQuery) -> Result<RuleSet, ApiError> {
    require_permission(tenant, principal, "tolerances.read")?;
    let vendor_id: VendorId = parse_id(&query.vendor_id, "vendor_id")?;
    let amount: Money = parse_money(&query.amount, "amount")?;
    Ok(state.rules.resolve(tenant.tenant_id(), vendor_id, query.vendor_category.as_deref(), amount))
}

async fn put_global(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Json(body): Json<RuleSetOverride>,
) -> Response {
    match handle_put_global(&state, &tenant, &principal, &headers, body) {
        Ok(guard) => {
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 200, serde_json::json!({ "status": "applied" })) {
                return err.into_response();
            }
            (axum::http::StatusCode::OK, Json(serde_json::json!({ "status": "applied" }))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn handle_put_global(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, headers: &HeaderMap, body: RuleSetOverride) -> Result<IdempotencyGuard, ApiError> {
    require_permission(tenant, principal, "tolerances.write")?;
    let request_json = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "PUT", "/v1/tolerances/global", &request_json)?;
    state.rules.set_global(tenant.tenant_id(), body)?;
    Ok(guard)
}

async fn put_vendor_category(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Path(category): Path<String>,
    Json(body): Json<RuleSetOverride>,
) -> Response {
    match handle_put_category(&state, &tenant, &principal, &headers, &category, body) {
        Ok(guard) => {
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 200, serde_json::json!({ "status": "applied" })) {
                return err.into_response();
            }
            (axum::http::StatusCode::OK, Json(serde_json::json!({ "status": "applied" }))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn handle_put_category(
    state: &AppState,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    headers: &HeaderMap,
    category: &str,
    body: RuleSetOverride,
) -> Result<IdempotencyGuard, ApiError> {
    require_permission(tenant, principal, "tolerances.write")?;
    let request_json = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    let path = format!("/v1/tolerances/vendor-categories/{category}");
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "PUT", &path, &request_json)?;
    state.rules.set_vendor_category(tenant.tenant_id(), category.to_string(), body);
    Ok(guard)
}

async fn put_vendor(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Path(vendor_id): Path<String>,
    Json(body): Json<RuleSetOverride>,
) -> Response {
    match handle_put_vendor(&state, &tenant, &principal, &headers, &vendor_id, body) {
        Ok(guard) => {
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 200, serde_json::json!({ "status": "applied" })) {
                return err.into_response();
            }
            (axum::http::StatusCode::OK, Json(serde_json::json!({ "status": "applied" }))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn handle_put_vendor(
    state: &AppState,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    headers: &HeaderMap,
    vendor_id_raw: &str,
    body: RuleSetOverride,
) -> Result<IdempotencyGuard, ApiError> {
    require_permission(tenant, principal, "tolerances.write")?;
    let request_json = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    let path = format!("/v1/tolerances/vendors/{vendor_id_raw}");
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "PUT", &path, &request_json)?;
    let vendor_id: VendorId = parse_id(vendor_id_raw, "vendor_id")?;
    state.rules.set_vendor(tenant.tenant_id(), vendor_id, body);
    Ok(guard)
}

async fn put_amount_band(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Path(label): Path<String>,
    Json(body): Json<RuleSetOverride>,
) -> Response {
    match handle_put_band(&state, &tenant, &principal, &headers, &label, body) {
        Ok(guard) => {
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 200, serde_json::json!({ "status": "applied" })) {
                return err.into_response();
            }
            (axum::http::StatusCode::OK, Json(serde_json::json!({ "status": "applied" }))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn handle_put_band(
    state: &AppState,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    headers: &HeaderMap,
    label: &str,
    body: RuleSetOverride,
) -> Result<IdempotencyGuard, ApiError> {
    require_permission(tenant, principal, "tolerances.write")?;
    let request_json = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    let path = format!("/v1/tolerances/amount-bands/{label}");
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "PUT", &path, &request_json)?;
    state.rules.set_amount_band(tenant.tenant_id(), label.to_string(), body);
    Ok(guard)
}
