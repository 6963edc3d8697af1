use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_derive_error::ErrorResponse;
use common::config::Config;
use derive_more::{Display, Error};
use store::{
    tenant::{Credentials, Tenant, TenantStore},
    Store,
};
use subtle::ConstantTimeEq;
use tracing::warn;

/// Header carrying the tenant email.
pub(crate) const EMAIL_HEADER: &str = "email";

/// Header carrying the tenant secret key.
pub(crate) const SECRET_KEY_HEADER: &str = "secret-key";

/// Header carrying the admin key.
pub(crate) const ADMIN_KEY_HEADER: &str = "admin-key";

/// Tenant that passed authentication, stored in request extensions.
#[derive(Clone, Debug)]
pub(crate) struct AuthenticatedTenant(pub Tenant);

#[derive(ErrorResponse, Display, Error)]
pub(crate) enum AuthenticationError {
    #[status(StatusCode::UNAUTHORIZED)]
    #[display(fmt = "invalid credentials")]
    Unauthorized,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Validate tenant credentials carried by request headers.
///
/// Missing headers, unknown emails and wrong keys all result in the same error.
pub(crate) fn authenticate_tenant(
    headers: &HeaderMap,
    tenants: &TenantStore,
) -> Result<Tenant, AuthenticationError> {
    let (Some(email), Some(secret_key)) = (
        header(headers, EMAIL_HEADER),
        header(headers, SECRET_KEY_HEADER),
    ) else {
        return Err(AuthenticationError::Unauthorized);
    };

    let credentials = Credentials {
        email: email.to_string(),
        secret_key: secret_key.to_string(),
    };

    tenants.authenticate(&credentials).map_err(|_| {
        warn!(email = %credentials.email, "rejected tenant credentials");
        AuthenticationError::Unauthorized
    })
}

/// Validate the admin key carried by request headers.
///
/// An empty configured key never matches.
pub(crate) fn authenticate_admin(
    headers: &HeaderMap,
    admin_key: &str,
) -> Result<(), AuthenticationError> {
    let presented = header(headers, ADMIN_KEY_HEADER).ok_or(AuthenticationError::Unauthorized)?;

    if !admin_key.is_empty() && bool::from(presented.as_bytes().ct_eq(admin_key.as_bytes())) {
        Ok(())
    } else {
        warn!("rejected admin key");
        Err(AuthenticationError::Unauthorized)
    }
}

/// Require valid tenant credentials.
///
/// On success, the [`AuthenticatedTenant`] is available as a request extension.
pub(crate) async fn require_tenant<B>(
    State(store): State<Arc<Store>>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response, AuthenticationError> {
    let tenant = authenticate_tenant(req.headers(), &store.tenants)?;

    req.extensions_mut().insert(AuthenticatedTenant(tenant));

    Ok(next.run(req).await)
}

/// Require the configured admin key.
pub(crate) async fn require_admin<B>(
    State(config): State<Arc<Config>>,
    req: Request<B>,
    next: Next<B>,
) -> Result<Response, AuthenticationError> {
    authenticate_admin(req.headers(), &config.updates.admin_key)?;

    Ok(next.run(req).await)
}
