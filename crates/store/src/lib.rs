//! Update server state.
//!
//! [`Store`] bundles the release registry, tenant credentials, download tokens
//! and installer files. It is constructed once at startup and shared with
//! every request handler.

pub mod artifact;
pub mod download_token;
pub mod release;
pub mod snapshot;
pub mod tenant;
pub mod version;

use std::{io, sync::Arc};

use common::config::{Config, MAX_TOKEN_TTL};
use derive_more::{Display, Error, From};
pub use time::OffsetDateTime;

use crate::{
    artifact::ArtifactStore, download_token::TokenStore, release::VersionRegistry,
    snapshot::SnapshotError, tenant::TenantStore,
};

/// Errors that may occur while opening persisted state.
#[derive(Debug, Display, From, Error)]
pub enum OpenError {
    /// Registry or tenant snapshot is unreadable.
    Snapshot(SnapshotError),

    /// Installer directory is unreadable.
    Io(io::Error),
}

/// Shared update server state.
#[derive(Debug)]
pub struct Store {
    pub registry: VersionRegistry,
    pub tenants: TenantStore,
    pub tokens: Arc<TokenStore>,
    pub artifacts: ArtifactStore,
}

impl Store {
    /// Open every persisted component using paths from the provided configuration.
    ///
    /// Installer hashing blocks, so async callers should run this
    /// on a blocking thread.
    pub fn open(config: &Config) -> Result<Self, OpenError> {
        let ttl = config.updates.token_ttl.clamp(1, MAX_TOKEN_TTL);
        let ttl = time::Duration::seconds(ttl as i64);

        Ok(Self {
            registry: VersionRegistry::open(&config.storage.registry_path)?,
            tenants: TenantStore::open(&config.storage.tenants_path)?,
            tokens: Arc::new(TokenStore::new(ttl)),
            artifacts: ArtifactStore::open(&config.storage.artifacts_path)?,
        })
    }
}
