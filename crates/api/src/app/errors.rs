//! RFC 9457 Problem Details error mapping.
//!
//! Every handler error funnels through [`ApiError`], which renders the
//! error-kind taxonomy as a `application/problem+json` body with a stable
//! `type` URI, a correlation id, and (for `validation_failed`) a list of
//! field-level problems.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use reconap_auth::AuthzError;
use reconap_core::DomainError;
use reconap_idempotency::{IdempotencyError, StoredResponse};
use reconap_ingestion::IngestionError;
use reconap_store::StoreError;

const PROBLEM_BASE: &str = "https://reconap.dev/problems";

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

pub enum ApiError {
    Validation { detail: String, errors: Vec<FieldError> },
    IdempotencyKeyRequired,
    IdempotencyConflict(String),
    NotFound(String),
    Conflict(String),
    TenantViolation(String),
    ToleranceUnresolvable(String),
    IngestionFatal(String),
    Forbidden(String),
    Unauthorized(String),
    Internal(String),
    /// Not an error at all: a replayed idempotent response, rendered
    /// verbatim instead of as a Problem Details body.
    Replay(StoredResponse),
}

impl ApiError {
    fn kind(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            ApiError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_failed", "Validation failed"),
            ApiError::IdempotencyKeyRequired => (StatusCode::BAD_REQUEST, "idempotency_key_required", "Idempotency-Key header is required"),
            ApiError::IdempotencyConflict(_) => (StatusCode::CONFLICT, "idempotency_conflict", "Idempotency-Key reused with a different request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", "Resource not found"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict", "Conflicting state"),
            ApiError::TenantViolation(_) => (StatusCode::FORBIDDEN, "tenant_violation", "Tenant isolation violation"),
            ApiError::ToleranceUnresolvable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "tolerance_unresolvable", "Could not resolve matching tolerances"),
            ApiError::IngestionFatal(_) => (StatusCode::BAD_REQUEST, "ingestion_fatal", "Import could not be processed"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden", "Forbidden"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", "Internal error"),
            ApiError::Replay(_) => (StatusCode::OK, "", ""),
        }
    }

    fn detail(&self) -> String {
        match self {
            ApiError::Validation { detail, .. } => detail.clone(),
            ApiError::IdempotencyKeyRequired => "every mutating request must carry an Idempotency-Key header".to_string(),
            ApiError::IdempotencyConflict(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::TenantViolation(msg)
            | ApiError::ToleranceUnresolvable(msg)
            | ApiError::IngestionFatal(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::Replay(_) => String::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Replay(stored) = self {
            let status = StatusCode::from_u16(stored.status_code).unwrap_or(StatusCode::OK);
            return (status, Json(stored.body)).into_response();
        }

        let correlation_id = Uuid::now_v7();
        if matches!(self, ApiError::Internal(_) | ApiError::TenantViolation(_)) {
            tracing::error!(%correlation_id, detail = %self.detail(), "request failed");
        }

        let (status, code, title) = self.kind();
        let errors: Vec<FieldError> = match &self {
            ApiError::Validation { errors, .. } => errors
                .iter()
                .map(|e| FieldError { field: e.field.clone(), code: e.code.clone(), message: e.message.clone() })
                .collect(),
            _ => Vec::new(),
        };

        let body = serde_json::json!({
            "type": format!("{PROBLEM_BASE}/{code}"),
            "title": title,
            "status": status.as_u16(),
            "detail": self.detail(),
            "instance": format!("urn:reconap:correlation:{correlation_id}"),
            "correlation_id": correlation_id.to_string(),
            "errors": errors,
        });

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ApiError::Validation { detail: msg, errors: Vec::new() },
            DomainError::InvariantViolation(msg) => ApiError::Validation { detail: msg, errors: Vec::new() },
            DomainError::NotFound => ApiError::NotFound("resource not found".to_string()),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::Unauthorized => ApiError::Forbidden("unauthorized".to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TenantViolation => ApiError::TenantViolation("operation crossed a tenant boundary".to_string()),
            StoreError::DuplicateKey => ApiError::Conflict("duplicate key".to_string()),
            StoreError::Conflict { expected, actual } => ApiError::Conflict(format!("expected version {expected}, found {actual}")),
            StoreError::NotFound => ApiError::NotFound("resource not found".to_string()),
            StoreError::Transient(msg) => ApiError::Internal(format!("transient store error: {msg}")),
            StoreError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<IdempotencyError> for ApiError {
    fn from(err: IdempotencyError) -> Self {
        match err {
            IdempotencyError::KeyReused(msg) => ApiError::IdempotencyConflict(msg),
            IdempotencyError::NoPendingClaim(msg) => ApiError::Internal(format!("no pending idempotency claim: {msg}")),
        }
    }
}

impl From<IngestionError> for ApiError {
    fn from(err: IngestionError) -> Self {
        ApiError::IngestionFatal(err.to_string())
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}
