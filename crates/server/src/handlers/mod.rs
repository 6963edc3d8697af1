/// Management routes, guarded by the admin key.
pub(crate) mod admin;

/// Liveness route.
pub(crate) mod health;

/// Client update check and download routes.
pub(crate) mod updates;
