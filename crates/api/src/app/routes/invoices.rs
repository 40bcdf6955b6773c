use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use reconap_core::{InvoiceId, PurchaseOrderId, VendorId};
use reconap_invoicing::{ImportSource, Invoice};

use crate::app::dto::{parse_date, parse_id, parse_money, CreateInvoiceRequest};
use crate::app::errors::ApiError;
use crate::app::idempotency::{self, IdempotencyGuard};
use crate::app::pagination::{paginate, PageQuery};
use crate::app::state::AppState;
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

#[derive(Debug, serde::Deserialize)]
pub struct ListInvoicesQuery {
    pub vendor_id: Option<String>,
}

pub fn router() -> Router {
    Router::new().route("/", get(list_invoices).post(create_invoice)).route("/:id", get(get_invoice))
}

async fn list_invoices(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<PageQuery>,
    Query(filter): Query<ListInvoicesQuery>,
) -> Response {
    match handle_list(&state, &tenant, &principal, &query, &filter) {
        Ok(body) => (axum::http::StatusCode::OK, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_list(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, query: &PageQuery, filter: &ListInvoicesQuery) -> Result<serde_json::Value, ApiError> {
    require_permission(tenant, principal, "invoices.read")?;
    let items = match &filter.vendor_id {
        Some(raw) => {
            let vendor_id: VendorId = parse_id(raw, "vendor_id")?;
            state.invoices.list_by_vendor(tenant.tenant_id(), vendor_id)
        }
        None => state.invoices.list_open_matching_work(tenant.tenant_id()),
    };
    let page = paginate(items, query);
    Ok(serde_json::json!({ "items": page.items, "total": page.total, "page": page.page, "limit": page.limit }))
}

async fn get_invoice(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Response {
    match handle_get(&state, &tenant, &principal, &id) {
        Ok(invoice) => (axum::http::StatusCode::OK, Json(invoice)).into_response(),
        Err(err) => err.into_response(),
    }
}

fn handle_get(state: &AppState, tenant: &TenantContext, principal: &PrincipalContext, id: &str) -> Result<Invoice, ApiError> {
    require_permission(tenant, principal, "invoices.read")?;
    let invoice_id: InvoiceId = parse_id(id, "id")?;
    state.invoices.get(tenant.tenant_id(), invoice_id).ok_or_else(|| ApiError::NotFound(format!("invoice {id} not found")))
}

async fn create_invoice(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Json(body): Json<CreateInvoiceRequest>,
) -> Response {
    match handle_create(&state, &tenant, &principal, &headers, body) {
        Ok((invoice, guard)) => {
            let response = serde_json::to_value(&invoice).expect("Invoice serializes");
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 201, response.clone()) {
                return err.into_response();
            }
            state.publish(crate::app::events::DomainEvent::InvoiceCreated { tenant_id: tenant.tenant_id(), invoice_id: *invoice.id(), occurred_at: Utc::now() });
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
    body: CreateInvoiceRequest,
) -> Result<(Invoice, IdempotencyGuard), ApiError> {
    require_permission(tenant, principal, "invoices.write")?;
    let request_json = serde_json::to_value(&body).unwrap_or(serde_json::Value::Null);
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "POST", "/v1/invoices", &request_json)?;

    let vendor_id: VendorId = parse_id(&body.vendor_id, "vendor_id")?;
    let po_id: Option<PurchaseOrderId> = body.po_id.as_deref().map(|raw| parse_id(raw, "po_id")).transpose()?;
    let invoice_date = parse_date(&body.invoice_date, "invoice_date")?;
    let due_date = body.due_date.as_deref().map(|d| parse_date(d, "due_date")).transpose()?;
    let subtotal = parse_money(&body.subtotal, "subtotal")?;
    let tax_amount = parse_money(&body.tax_amount, "tax_amount")?;
    let total_amount = parse_money(&body.total_amount, "total_amount")?;

    let now = Utc::now();
    let invoice = Invoice::new(
        InvoiceId::new(),
        tenant.tenant_id(),
        body.invoice_number,
        vendor_id,
        po_id,
        subtotal,
        tax_amount,
        total_amount,
        body.currency,
        invoice_date,
        due_date,
        now.date_naive(),
        ImportSource::DirectApi,
        serde_json::Value::Null,
        now,
    )?;
    state.invoices.create_now(tenant.tenant_id(), invoice.clone())?;
    Ok((invoice, guard))
}
