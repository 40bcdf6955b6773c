use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use reconap_core::VendorId;
use reconap_vendors::Vendor;

use crate::app::dto::{parse_id, CreateVendorRequest};
use crate::app::errors::ApiError;
use crate::app::idempotency::{self, IdempotencyGuard};
use crate::app::pagination::{paginate, PageQuery};
use crate::app::state::AppState;
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/", get(list_vendors).post(create_vendor)).route("/:id", get(get_vendor))
}

async fn list_vendors(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<PageQuery>,
) -> Response {
    match handle_list(&state, &tenant, &principal, &query) {
        Ok(body) => (axum::http::StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_list(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, query: &PageQuery) -> Result<serde_json::Value, ApiError> {
    require_permission(tenant, principal, "vendors.read")?;
    let mut items = state.vendors.list(tenant.tenant_id());
    if let Some((field, desc)) = query.sort_spec() {
        sort_vendors(&mut items, &field, desc);
    }
    let page = paginate(items, query);
    Ok(serde_json::json!({ "items": page.items, "total": page.total, "page": page.page, "limit": page.limit }))
}

fn sort_vendors(items: &mut [Vendor], field: &str, desc: bool) {
    match field {
        "legal_name" => items.sort_by(|a, b| a.legal_name().cmp(b.legal_name())),
        "created_at" => items.sort_by(|a, b| a.created_at().cmp(&b.created_at())),
        _ => {}
    }
    if desc {
        items.reverse();
    }
}

async fn get_vendor(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    match handle_get(&state, &tenant, &principal, &id) {
        Ok(vendor) => (axum::http::StatusCode::OK, Json(vendor)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_get(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, id: &str) -> Result<Vendor, ApiError> {
    require_permission(tenant, principal, "vendors.read")?;
    let vendor_id: VendorId = parse_id(id, "id")?;
    state.vendors.get(tenant.tenant_id(), vendor_id).ok_or_else(|| ApiError::NotFound(format!("vendor {id} not found")))
}

async fn create_vendor(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Json(body): Json<CreateVendorRequest>,
) -> Response {
    match handle_create(&state, &tenant, &principal, &headers, body) {
        Ok((vendor, guard)) => {
            let response = serde_json::to_value(&vendor).expect("Vendor serializes");
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 201, response.clone()) {
                return err.into_response();
            }
            (axum::http::StatusCode::CREATED, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn handle_create(
    state: &AppState,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    headers: &HeaderMap,
    body: CreateVendorRequest,
) -> Result<(Vendor, IdempotencyGuard), ApiError> {
    require_permission(tenant, principal, "vendors.write")?;
    let request_json = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "POST", "/v1/vendors", &request_json)?;

    let now = Utc::now();
    let vendor = Vendor::register(VendorId::new(), tenant.tenant_id(), body.legal_name, body.display_name, body.tax_id, body.payment_terms_days.unwrap_or(30), now)?;
    state.vendors.create_now(tenant.tenant_id(), vendor.clone())?;
    Ok((vendor, guard))
}
