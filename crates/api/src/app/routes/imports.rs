use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;

use reconap_ingestion::{run_invoice_import, CanonicalField, ColumnMapping, ImportOutcome};

use crate::app::errors::ApiError;
use crate::app::events::DomainEvent;
use crate::app::idempotency::{self, IdempotencyGuard};
use crate::app::state::AppState;
use crate::authz::require_permission;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/invoices", post(import_invoices))
}

/// The canonical invoice CSV header set from spec.md §6: `invoice_number,
/// vendor, po_number(optional), invoice_date, due_date(optional),
/// subtotal, tax_amount, total_amount, currency`.
fn canonical_mapping() -> ColumnMapping {
    ColumnMapping::new()
        .map("invoice_number", CanonicalField::InvoiceNumber)
        .map("vendor", CanonicalField::VendorName)
        .map("po_number", CanonicalField::PoReference)
        .map("invoice_date", CanonicalField::InvoiceDate)
        .map("due_date", CanonicalField::DueDate)
        .map("subtotal", CanonicalField::Subtotal)
        .map("tax_amount", CanonicalField::TaxAmount)
        .map("total_amount", CanonicalField::TotalAmount)
        .map("currency", CanonicalField::Currency)
}

async fn import_invoices(
    Extension(state): Extension<Arc<AppState>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle_import(&state, &tenant, &principal, &headers, &body) {
        Ok((outcome, report, guard)) => {
            let response = serde_json::json!({
                "outcome": match outcome { ImportOutcome::Committed => "committed", ImportOutcome::AbortedOnErrorRate => "aborted_on_error_rate" },
                "summary": report.summary,
                "row_errors": report.row_errors,
            });
            if let Err(err) = idempotency::complete(&state.idempotency, guard, 200, response.clone()) {
                return err.into_response();
            }
            (axum::http::StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn handle_import(
    state: &AppState,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(ImportOutcome, reconap_ingestion::ImportReport, IdempotencyGuard), ApiError> {
    require_permission(tenant, principal, "imports.write")?;
    let fingerprint_body = serde_json::json!({ "sha256_len": body.len() });
    let guard = idempotency::begin(&state.idempotency, tenant.tenant_id(), headers, "POST", "/v1/imports/invoices", &fingerprint_body)?;

    let mapping = canonical_mapping();
    let now = Utc::now();
    let (outcome, report) = run_invoice_import(body, tenant.tenant_id(), &mapping, &state.config, state.config.default_date_locale, &state.invoices, &state.vendors, now, |progress| {
        tracing::debug!(rows_processed = progress.rows_processed, rows_accepted = progress.rows_accepted, rows_rejected = progress.rows_rejected, "import progress");
    })?;

    if matches!(outcome, ImportOutcome::Committed) {
        state.publish(DomainEvent::ImportCompleted { tenant_id: tenant.tenant_id(), accepted: report.summary.accepted, rejected: report.summary.rejected, occurred_at: now });
    }

    Ok((outcome, report, guard))
}
