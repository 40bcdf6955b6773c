//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `state.rs`: infrastructure wiring (domain repositories, idempotency
//!   registry, rule resolver, event bus)
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and parsing helpers
//! - `errors.rs`: RFC 9457 Problem Details error mapping
//! - `idempotency.rs`: `Idempotency-Key` enforcement
//! - `pagination.rs`: list-endpoint pagination and sorting conventions
//! - `events.rs`: domain events published to the notification collaborator

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use reconap_core::EngineConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod events;
pub mod idempotency;
pub mod pagination;
pub mod routes;
pub mod state;

/// Builds the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: EngineConfig) -> Router {
    let app_state = state::AppState::new(config);

    let protected = routes::router()
        .layer(Extension(app_state))
        .layer(axum::middleware::from_fn(middleware::identity_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/v1", protected)
        .layer(ServiceBuilder::new())
}
