use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use axum_derive_error::ErrorResponse;
use derive_more::{Display, Error, From};
use serde::Deserialize;
use store::{
    snapshot::SnapshotError,
    tenant::{AddTenantError, Tenant},
    Store,
};
use tracing::{error, info};
use validator::Validate;

use crate::validation::ValidatedJson;

#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum AddUserError {
    SnapshotError(SnapshotError),

    #[status(StatusCode::CONFLICT)]
    #[display(fmt = "tenant {} already exists", _0)]
    DuplicateTenant(#[error(not(source))] String),
}

impl From<AddTenantError> for AddUserError {
    fn from(err: AddTenantError) -> Self {
        match err {
            AddTenantError::DuplicateTenant(email) => AddUserError::DuplicateTenant(email),
            AddTenantError::Snapshot(err) => {
                error!(%err, "unable to persist tenant list");
                AddUserError::SnapshotError(err)
            }
        }
    }
}

#[derive(Deserialize, Validate)]
pub(super) struct AddUserRequest {
    #[validate(email)]
    email: String,

    #[validate(length(min = 1))]
    secret_key: String,
}

/// Tenant registration handler.
///
/// The response echoes the tenant email only.
pub(super) async fn add(
    State(store): State<Arc<Store>>,
    ValidatedJson(request): ValidatedJson<AddUserRequest>,
) -> Result<(StatusCode, Json<Tenant>), AddUserError> {
    let tenant = store.tenants.add(request.email, request.secret_key)?;

    info!(email = %tenant.email, "added tenant");

    Ok((StatusCode::CREATED, Json(tenant)))
}
