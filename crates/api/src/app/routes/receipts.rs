use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use reconap_core::{PurchaseOrderId, ReceiptId};
use reconap_receipts::{check_over_delivery, Receipt, ReceiptLineItem};

use crate::app::dto::{parse_date, parse_id, parse_money, CreateReceiptRequest};
use crate::app::errors::ApiError;
use crate::app::idempotency::{self, IdempotencyGuard};
use crate::app::pagination::{paginate, PageQuery};
use crate::app::state::AppState;
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

#[derive(Debug, serde::Deserialize)]
pub struct ListReceiptsQuery {
    pub po_id: String,
}

pub fn router() -> Router {
    Router::new().route("/", get(list_receipts).post(create_receipt)).route("/:id", get(get_receipt))
}

async fn list_receipts(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<PageQuery>,
    Query(filter): Query<ListReceiptsQuery>,
) -> Response {
    match handle_list(&state, &tenant, &principal, &query, &filter) {
        Ok(body) => (axum::http::StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_list(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, query: &PageQuery, filter: &ListReceiptsQuery) -> Result<serde_json::Value, ApiError> {
    require_permission(tenant, principal, "receipts.read")?;
    let po_id: PurchaseOrderId = parse_id(&filter.po_id, "po_id")?;
    let items = state.receipts.list_by_po(tenant.tenant_id(), po_id);
    let page = paginate(items, query);
    Ok(serde_json::json!({ "items": page.items, "total": page.total, "page": page.page, "limit": page.limit }))
}

async fn get_receipt(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    match handle_get(&state, &tenant, &principal, &id) {
        Ok(receipt) => (axum::http::StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_get(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, id: &str) -> Result<Receipt, ApiError> {
    require_permission(tenant, principal, "receipts.read")?;
    let receipt_id: ReceiptId = parse_id(id, "id")?;
    state.receipts.get(tenant.tenant_id(), receipt_id).ok_or_else(|| ApiError::NotFound(format!("receipt {id} not found")))
}

async fn create_receipt(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Json(body): Json<CreateReceiptRequest>,
) -> Response {
    match handle_create(&state, &tenant, &principal, &headers, body) {
        Ok((receipt, guard)) => {
            let response = serde_json::to_value(&receipt).expect("Receipt serializes");
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
    body: CreateReceiptRequest,
) -> Result<(Receipt, IdempotencyGuard), ApiError> {
    require_permission(tenant, principal, "receipts.write")?;
    let request_json = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "POST", "/v1/receipts", &request_json)?;

    let po_id: PurchaseOrderId = parse_id(&body.po_id, "po_id")?;
    let po = state.purchase_orders.get(tenant.tenant_id(), po_id).ok_or_else(|| ApiError::NotFound(format!("purchase order {} not found", body.po_id)))?;
    let received_date = parse_date(&body.received_date, "received_date")?;
    let total_amount = parse_money(&body.total_amount, "total_amount")?;
    let line_items: Vec<ReceiptLineItem> = body.line_items.iter().map(|l| ReceiptLineItem { po_line_no: l.po_line_no, received_qty: l.received_qty }).collect();

    let now = Utc::now();
    let receipt = Receipt::new(ReceiptId::new(), tenant.tenant_id(), body.receipt_number.clone(), &po, received_date, total_amount, line_items.clone(), now)?;

    let rule_set = state.rules.resolve(tenant.tenant_id(), po.vendor_id(), None, total_amount);
    let over_delivery_tolerance_units = rule_set.qty_tolerance_abs;
    let existing = state.receipts.list_by_po(tenant.tenant_id(), po_id);
    check_over_delivery(&po, &existing, &receipt, over_delivery_tolerance_units)?;

    let mut session = reconap_store::Session::begin(tenant.tenant_id(), reconap_store::Isolation::ReadCommitted);
    state.receipts.stage_create(&mut session, receipt.clone());
    session.commit()?;
    Ok((receipt, guard))
}
