/// Tenant management routes.
mod users;

/// Release management routes.
mod versions;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use store::Store;

/// Create a router that provides management routes.
///
/// Callers are responsible for layering admin authentication on top.
pub(crate) fn routes() -> Router<Arc<Store>> {
    Router::new()
        .route("/versions", get(versions::list))
        .route("/versions/add", post(versions::add))
        .route("/users/add", post(users::add))
}
