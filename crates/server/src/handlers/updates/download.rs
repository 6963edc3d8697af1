use std::{io, sync::Arc};

use axum::{
    body::StreamBody,
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use axum_derive_error::ErrorResponse;
use common::config::Config;
use derive_more::{Display, Error, From};
use serde::Deserialize;
use store::{artifact::ArtifactError, download_token::RedeemError, Store};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{error, info};

/// Header carrying the installer checksum.
const CHECKSUM_HEADER: &str = "x-content-checksum";

/// Header naming the checksum algorithm.
const CHECKSUM_ALGORITHM_HEADER: &str = "x-checksum-algorithm";

/// Query string that contains a download token.
///
/// A missing or empty token is treated as an unknown one.
#[derive(Deserialize)]
pub(super) struct DownloadQuery {
    #[serde(default)]
    token: Option<String>,
}

/// Errors that may occur during the installer download.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum DownloadError {
    /// Filesystem error.
    IoError(io::Error),

    /// The provided token was never issued or was already reaped.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "download token not found")]
    TokenNotFound,

    /// The provided token lifetime has elapsed.
    #[status(StatusCode::GONE)]
    #[display(fmt = "download token has expired")]
    TokenExpired,

    /// The provided token was already redeemed.
    #[status(StatusCode::GONE)]
    #[display(fmt = "download token was already used")]
    TokenAlreadyUsed,

    /// The release the token is bound to has no installer on disk.
    #[status(StatusCode::NOT_FOUND)]
    #[display(fmt = "installer {} is not available", _0)]
    ArtifactNotFound(#[error(not(source))] String),
}

impl From<RedeemError> for DownloadError {
    fn from(err: RedeemError) -> Self {
        match err {
            RedeemError::TokenNotFound => DownloadError::TokenNotFound,
            RedeemError::TokenExpired => DownloadError::TokenExpired,
            RedeemError::TokenAlreadyUsed => DownloadError::TokenAlreadyUsed,
        }
    }
}

impl From<ArtifactError> for DownloadError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::ArtifactNotFound(name) => DownloadError::ArtifactNotFound(name),
            ArtifactError::Io(err) => DownloadError::IoError(err),
        }
    }
}

/// Installer download handler.
///
/// The token is validated and the installer is opened before the token
/// is consumed, so a missing installer does not burn the token. Only one
/// of several concurrent downloads with the same token wins the redemption,
/// the rest fail with [`DownloadError::TokenAlreadyUsed`].
pub(super) async fn download(
    State(store): State<Arc<Store>>,
    Extension(config): Extension<Arc<Config>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, DownloadError> {
    let token = query
        .token
        .filter(|token| !token.is_empty())
        .ok_or(DownloadError::TokenNotFound)?;

    let grant = store.tokens.inspect(&token)?;

    let artifact = store
        .artifacts
        .locate(grant.version, grant.environment)
        .await
        .map_err(|err| {
            if let ArtifactError::ArtifactNotFound(file) = &err {
                error!(
                    version = %grant.version,
                    environment = %grant.environment,
                    %file,
                    "registered release has no installer"
                );
            }

            DownloadError::from(err)
        })?;

    let file = match File::open(&artifact.path).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            error!(file = %artifact.file_name, "indexed installer disappeared");
            return Err(DownloadError::ArtifactNotFound(artifact.file_name));
        }
        Err(err) => return Err(err.into()),
    };

    store.tokens.redeem(&token)?;

    info!(
        tenant = %grant.tenant,
        version = %grant.version,
        size = artifact.size,
        "streaming installer"
    );

    let headers = [
        (header::CONTENT_TYPE, String::from("application/octet-stream")),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", artifact.file_name),
        ),
        (header::CONTENT_LENGTH, artifact.size.to_string()),
        (HeaderName::from_static(CHECKSUM_HEADER), artifact.checksum),
        (
            HeaderName::from_static(CHECKSUM_ALGORITHM_HEADER),
            String::from("sha256"),
        ),
    ];

    let body = StreamBody::new(ReaderStream::with_capacity(
        file,
        config.updates.stream_buffer_size.max(1),
    ));

    Ok((headers, body).into_response())
}
