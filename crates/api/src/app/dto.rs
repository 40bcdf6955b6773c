//! Request DTOs for create/update endpoints and small parsing helpers.
//!
//! Responses need no DTOs of their own: `Invoice`, `PurchaseOrder`,
//! `Receipt`, `Vendor`, `MatchResult`, and `ExceptionEntry` already derive
//! `Serialize` with the wire shapes spec.md §6 wants (amounts via `Money`'s
//! `serde(into = "Decimal")`, scale-2 decimal strings).

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use reconap_core::Money;

use crate::app::errors::{ApiError, FieldError};

pub fn parse_id<T: FromStr>(raw: &str, field: &str) -> Result<T, ApiError> {
    raw.parse::<T>().map_err(|_| ApiError::Validation {
        detail: format!("{field} is not a valid id"),
        errors: vec![FieldError { field: field.to_string(), code: "invalid_id".to_string(), message: format!("{raw:?} is not a valid id") }],
    })
}

pub fn parse_money(raw: &str, field: &str) -> Result<Money, ApiError> {
    Money::parse(raw).map_err(|_| ApiError::Validation {
        detail: format!("{field} is not a valid amount"),
        errors: vec![FieldError { field: field.to_string(), code: "invalid_amount".to_string(), message: format!("{raw:?} is not a valid decimal amount") }],
    })
}

pub fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| ApiError::Validation {
        detail: format!("{field} is not a valid ISO 8601 date"),
        errors: vec![FieldError { field: field.to_string(), code: "invalid_date".to_string(), message: format!("{raw:?} is not YYYY-MM-DD") }],
    })
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateVendorRequest {
    pub legal_name: String,
    pub display_name: Option<String>,
    pub tax_id: Option<String>,
    pub payment_terms_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PurchaseOrderLineRequest {
    pub line_no: u32,
    pub sku: String,
    pub description: String,
    pub ordered_qty: i64,
    pub unit_price: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreatePurchaseOrderRequest {
    pub po_number: String,
    pub vendor_id: String,
    pub currency: String,
    pub po_date: String,
    pub expected_date: Option<String>,
    pub line_items: Vec<PurchaseOrderLineRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReceiptLineRequest {
    pub po_line_no: u32,
    pub received_qty: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateReceiptRequest {
    pub receipt_number: Option<String>,
    pub po_id: String,
    pub received_date: String,
    pub total_amount: String,
    pub line_items: Vec<ReceiptLineRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateInvoiceRequest {
    pub invoice_number: String,
    pub vendor_id: String,
    pub po_id: Option<String>,
    pub subtotal: String,
    pub tax_amount: String,
    pub total_amount: String,
    pub currency: String,
    pub invoice_date: String,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewDecisionRequest {
    pub reviewed_by: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClaimExceptionRequest {
    pub assigned_to: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ExceptionDecisionRequest {
    Approve { match_id: String, acted_by: String, notes: Option<String> },
    RejectAll { acted_by: String, notes: Option<String> },
    Defer { until: chrono::DateTime<chrono::Utc>, acted_by: String, notes: Option<String> },
}
