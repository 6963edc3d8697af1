use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use axum_derive_error::ErrorResponse;
use common::config::Config;
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use store::{
    version::{Comparison, MalformedVersion, Version},
    Store,
};
use tracing::{debug, info};

use crate::auth::AuthenticatedTenant;

/// Query string that contains the version the client currently runs.
///
/// A missing version is reported as malformed rather than as a query rejection.
#[derive(Deserialize)]
pub(super) struct CheckQuery {
    #[serde(default)]
    version: Option<String>,
}

/// Update check response.
///
/// Download-related fields are present only if an update is available.
#[derive(Serialize, Default)]
pub(super) struct CheckResponse {
    /// Whether a newer release exists.
    update_available: bool,

    /// Latest registered version.
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,

    /// Single-use token authorizing the installer download.
    #[serde(skip_serializing_if = "Option::is_none")]
    download_token: Option<String>,

    /// URL to download the installer from.
    #[serde(skip_serializing_if = "Option::is_none")]
    download_url: Option<String>,

    /// Release notes of the latest version.
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,

    /// Token lifetime, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<i64>,
}

impl CheckResponse {
    fn up_to_date(latest: Option<Version>) -> Self {
        Self {
            update_available: false,
            version: latest.map(|version| version.to_string()),
            ..Default::default()
        }
    }
}

/// Errors that may occur during the update check.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum CheckError {
    /// Client-supplied version is not a `major.minor.patch` triple.
    #[status(StatusCode::BAD_REQUEST)]
    MalformedVersion(MalformedVersion),
}

/// Build the download URL for the provided token.
fn download_url(public_url: &str, token: &str) -> String {
    format!(
        "{}/api/updates/download?token={token}",
        public_url.trim_end_matches('/')
    )
}

/// Update check handler.
///
/// Compares the client version with the latest release of the configured
/// environment and, if the client is behind, issues a download token
/// bound to the latest release.
pub(super) async fn check(
    State(store): State<Arc<Store>>,
    Extension(config): Extension<Arc<Config>>,
    Extension(AuthenticatedTenant(tenant)): Extension<AuthenticatedTenant>,
    Query(query): Query<CheckQuery>,
) -> Result<Json<CheckResponse>, CheckError> {
    let client: Version = query.version.unwrap_or_default().parse()?;
    let environment = config.updates.environment;

    let Some(latest) = store.registry.latest(environment) else {
        debug!(%environment, "no releases registered");
        return Ok(Json(CheckResponse::up_to_date(None)));
    };

    if Comparison::from(client.cmp(&latest.version)) != Comparison::Older {
        debug!(tenant = %tenant.email, %client, "client is up to date");
        return Ok(Json(CheckResponse::up_to_date(Some(latest.version))));
    }

    let token = store
        .tokens
        .issue(latest.version, environment, &tenant.email);

    info!(
        tenant = %tenant.email,
        %client,
        latest = %latest.version,
        "update available"
    );

    Ok(Json(CheckResponse {
        update_available: true,
        version: Some(latest.version.to_string()),
        download_url: Some(download_url(&config.updates.public_url, &token.token)),
        expires_in: Some(token.expires_in()),
        download_token: Some(token.token),
        notes: Some(latest.notes),
    }))
}
