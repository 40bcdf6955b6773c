//! Routing tree: one module per domain area, merged into a single
//! protected router in `app::build_app`.

pub mod exceptions;
pub mod imports;
pub mod invoices;
pub mod matches;
pub mod purchase_orders;
pub mod receipts;
pub mod system;
pub mod tolerances;
pub mod vendors;

use axum::Router;

/// All tenant-scoped routes, nested under their resource prefixes except
/// `matches::router()`, which itself spans both `/invoices/:id/matches...`
/// and `/matches/:id/...` and must be merged rather than nested.
pub fn router() -> Router {
    Router::new()
        .nest("/vendors", vendors::router())
        .nest("/purchase-orders", purchase_orders::router())
        .nest("/receipts", receipts::router())
        .nest("/invoices", invoices::router())
        .nest("/exceptions", exceptions::router())
        .nest("/imports", imports::router())
        .nest("/tolerances", tolerances::router())
        .merge(matches::router())
        .route("/whoami", axum::routing::get(system::whoami))
}
