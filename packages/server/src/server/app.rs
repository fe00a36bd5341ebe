//! Application setup and server configuration.

use axum::{
    extract::Extension,
    middleware,
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::kernel::ServerDeps;
use crate::server::middleware::hmac_auth_middleware;
use crate::server::routes::{enrich_sites_handler, health_handler};

/// Build the Axum application router
///
/// `/api/cron/*` routes require a signed request; `/health` is public.
pub fn build_app(deps: ServerDeps) -> Router {
    let cron = Router::new()
        .route(
            "/api/cron/enrich-sites",
            get(enrich_sites_handler).post(enrich_sites_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            deps.signer.clone(),
            hmac_auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(cron)
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(deps))
        .layer(TraceLayer::new_for_http())
}
