use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use reconap_core::{PurchaseOrderId, VendorId};
use reconap_purchasing::{PoLineItem, PurchaseOrder};

use crate::app::dto::{parse_date, parse_id, parse_money, CreatePurchaseOrderRequest};
use crate::app::errors::ApiError;
use crate::app::idempotency::{self, IdempotencyGuard};
use crate::app::pagination::{paginate, PageQuery};
use crate::app::state::AppState;
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

#[derive(Debug, serde::Deserialize)]
pub struct ListPurchaseOrdersQuery {
    pub vendor_id: Option<String>,
}

pub fn router() -> Router {
    Router::new().route("/", get(list_purchase_orders).post(create_purchase_order)).route("/:id", get(get_purchase_order))
}

async fn list_purchase_orders(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<PageQuery>,
    Query(filter): Query<ListPurchaseOrdersQuery>,
) -> Response {
    match handle_list(&state, &tenant, &principal, &query, &filter) {
        Ok(body) => (axum::http::StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_list(
    state: &AppState,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    query: &PageQuery,
    filter: &ListPurchaseOrdersQuery,
) -> Result<serde_json::Value, ApiError> {
    require_permission(tenant, principal, "purchase_orders.read")?;
    let items = match &filter.vendor_id {
        Some(raw) => {
            let vendor_id: VendorId = parse_id(raw, "vendor_id")?;
            state.purchase_orders.list_open_by_vendor(tenant.tenant_id(), vendor_id)
        }
        None => return Err(ApiError::Validation {
            detail: "vendor_id is required to list purchase orders".to_string(),
            errors: vec![crate::app::errors::FieldError { field: "vendor_id".to_string(), code: "required".to_string(), message: "vendor_id query parameter is required".to_string() }],
        }),
    };
    let page = paginate(items, query);
    Ok(serde_json::json!({ "items": page.items, "total": page.total, "page": page.page, "limit": page.limit }))
}

async fn get_purchase_order(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    match handle_get(&state, &tenant, &principal, &id) {
        Ok(po) => (axum::http::StatusCode::OK, Json(po)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_get(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, id: &str) -> Result<PurchaseOrder, ApiError> {
    require_permission(tenant, principal, "purchase_orders.read")?;
    let po_id: PurchaseOrderId = parse_id(id, "id")?;
    state.purchase_orders.get(tenant.tenant_id(), po_id).ok_or_else(|| ApiError::NotFound(format!("purchase order {id} not found")))
}

async fn create_purchase_order(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Json(body): Json<CreatePurchaseOrderRequest>,
) -> Response {
    match handle_create(&state, &tenant, &principal, &headers, body) {
        Ok((po, guard)) => {
            let response = serde_json::to_value(&po).expect("PurchaseOrder serializes");
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
    body: CreatePurchaseOrderRequest,
) -> Result<(PurchaseOrder, IdempotencyGuard), ApiError> {
    require_permission(tenant, principal, "purchase_orders.write")?;
    let request_json = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "POST", "/v1/purchase-orders", &request_json)?;

    let vendor_id: VendorId = parse_id(&body.vendor_id, "vendor_id")?;
    let po_date = parse_date(&body.po_date, "po_date")?;
    let expected_date = body.expected_date.as_deref().map(|d| parse_date(d, "expected_date")).transpose()?;

    let mut line_items = Vec::with_capacity(body.line_items.len());
    for line in &body.line_items {
        let unit_price = parse_money(&line.unit_price, "unit_price")?;
        line_items.push(PoLineItem::new(line.line_no, line.sku.clone(), line.description.clone(), line.ordered_qty, unit_price)?);
    }

    let now = Utc::now();
    let po = PurchaseOrder::new(PurchaseOrderId::new(), tenant.tenant_id(), body.po_number, vendor_id, body.currency, po_date, expected_date, line_items, now)?;
    state.purchase_orders.create_now(tenant.tenant_id(), po.clone())?;
    Ok((po, guard))
}
