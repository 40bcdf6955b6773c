//! `Idempotency-Key` enforcement, shared by every mutating route.

use axum::http::HeaderMap;
use reconap_core::TenantId;
use reconap_idempotency::{ClaimOutcome, Fingerprint, IdempotencyKey, IdempotencyRegistry, StoredResponse};

use crate::app::errors::ApiError;

pub struct IdempotencyGuard {
    tenant_id: TenantId,
    key: IdempotencyKey,
}

/// Reads the `Idempotency-Key` header, fingerprints the request, and claims
/// it against the registry. Returns `Err(ApiError::Replay(..))` when this
/// exact request already completed — callers should propagate that error
/// directly, since its `IntoResponse` impl replays the stored response
/// verbatim instead of rendering a Problem Details body.
pub fn begin(
    registry: &IdempotencyRegistry,
    tenant_id: TenantId,
    headers: &HeaderMap,
    method: &str,
    path: &str,
    body: &serde_json::Value,
) -> Result<IdempotencyGuard, ApiError> {
    let raw = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::IdempotencyKeyRequired)?;
    let key = IdempotencyKey::parse(raw).map_err(ApiError::from)?;
    let fingerprint = Fingerprint::compute(method, path, body);

    match registry.claim(tenant_id, key.clone(), fingerprint) {
        Ok(ClaimOutcome::Fresh) => Ok(IdempotencyGuard { tenant_id, key }),
        Ok(ClaimOutcome::Replay(stored)) => Err(ApiError::Replay(stored)),
        Err(err) => Err(ApiError::from(err)),
    }
}

/// Records the outcome of the now-completed request so a retry replays it.
pub fn complete(registry: &IdempotencyRegistry, guard: IdempotencyGuard, status_code: u16, body: serde_json::Value) -> Result<(), ApiError> {
    registry
        .complete(guard.tenant_id, guard.key, StoredResponse { status_code, body })
        .map_err(ApiError::from)
}
