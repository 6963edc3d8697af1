/// Update availability check route.
mod check;

/// Installer download route.
mod download;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use store::Store;

use crate::auth;

/// Create a router that provides client-facing update routes.
pub(crate) fn routes(store: Arc<Store>) -> Router<Arc<Store>> {
    let private_routes = Router::new()
        .route("/check", get(check::check))
        .route_layer(from_fn_with_state(store, auth::require_tenant));

    let public_routes = Router::new().route("/download", get(download::download));

    Router::new().merge(private_routes).merge(public_routes)
}
