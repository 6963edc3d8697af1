//! Installer artifacts.
//!
//! Installers are uploaded out of band into a flat directory and are never
//! modified afterwards, so their SHA-256 checksum is computed once, either
//! during the startup scan or on the first lookup after the file arrives,
//! and cached for the lifetime of the process.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use common::{environment::Environment, hash};
use derive_more::{Display, Error, From};
use tracing::{debug, info, warn};

use crate::version::Version;

/// File name prefix shared by every installer.
pub const ARTIFACT_PREFIX: &str = "timesync-setup";

/// File extension of installers.
pub const ARTIFACT_EXTENSION: &str = "exe";

/// Expected installer file name of a release.
///
/// ## Example
///
/// ```
/// use common::environment::Environment;
/// use store::{artifact::file_name, version::Version};
///
/// assert_eq!(file_name(Version::new(1, 0, 2), Environment::Prod), "timesync-setup-1.0.2.exe");
/// assert_eq!(file_name(Version::new(1, 0, 2), Environment::Dev), "timesync-setup-dev-1.0.2.exe");
/// ```
pub fn file_name(version: Version, environment: Environment) -> String {
    match environment.artifact_profile() {
        Some(profile) => format!("{ARTIFACT_PREFIX}-{profile}-{version}.{ARTIFACT_EXTENSION}"),
        None => format!("{ARTIFACT_PREFIX}-{version}.{ARTIFACT_EXTENSION}"),
    }
}

/// Installer file available for download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Installer file name.
    pub file_name: String,

    /// Full installer path.
    pub path: PathBuf,

    /// Installer size, in bytes.
    pub size: u64,

    /// Lowercase hex SHA-256 checksum of the installer.
    pub checksum: String,
}

/// Errors that may occur during artifact lookup.
#[derive(Debug, Display, From, Error)]
pub enum ArtifactError {
    /// No installer exists for the requested release.
    #[display(fmt = "installer {} not found", _0)]
    ArtifactNotFound(#[error(not(source))] String),

    /// Filesystem error.
    Io(io::Error),
}

/// Directory-backed installer store with a checksum cache.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    artifacts: RwLock<HashMap<String, Artifact>>,
}

impl ArtifactStore {
    /// Open the installer directory and checksum every installer already present.
    ///
    /// This function blocks while hashing, so async callers should run it
    /// on a blocking thread.
    pub fn open<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut artifacts = HashMap::new();

        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if !is_installer_name(&name) || !entry.file_type()?.is_file() {
                continue;
            }

            match describe(entry.path(), name.clone()) {
                Ok(artifact) => {
                    debug!(file = %name, checksum = %artifact.checksum, "indexed installer");
                    artifacts.insert(name, artifact);
                }
                Err(error) => warn!(file = %name, %error, "unable to index installer"),
            }
        }

        info!(dir = %dir.display(), installers = artifacts.len(), "indexed installer directory");

        Ok(Self {
            dir,
            artifacts: RwLock::new(artifacts),
        })
    }

    /// Installer directory path.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Check if an installer exists for the provided release without hashing it.
    pub async fn is_available(
        &self,
        version: Version,
        environment: Environment,
    ) -> io::Result<bool> {
        let name = file_name(version, environment);

        if self
            .artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&name)
        {
            return Ok(true);
        }

        match tokio::fs::metadata(self.dir.join(&name)).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Find the installer of the provided release.
    ///
    /// Installers that arrived after startup are hashed on first lookup.
    pub async fn locate(
        &self,
        version: Version,
        environment: Environment,
    ) -> Result<Artifact, ArtifactError> {
        let name = file_name(version, environment);

        if let Some(artifact) = self
            .artifacts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
        {
            return Ok(artifact.clone());
        }

        let path = self.dir.join(&name);

        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(ArtifactError::ArtifactNotFound(name)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ArtifactError::ArtifactNotFound(name))
            }
            Err(err) => return Err(err.into()),
        }

        let artifact = {
            let name = name.clone();
            tokio::task::spawn_blocking(move || describe(path, name))
                .await
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err))??
        };

        info!(file = %name, checksum = %artifact.checksum, "indexed new installer");

        Ok(self
            .artifacts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name)
            .or_insert(artifact)
            .clone())
    }
}

fn is_installer_name(name: &str) -> bool {
    name.starts_with(ARTIFACT_PREFIX) && name.ends_with(&format!(".{ARTIFACT_EXTENSION}"))
}

fn describe(path: PathBuf, file_name: String) -> io::Result<Artifact> {
    let size = fs::metadata(&path)?.len();
    let checksum = hash::sha256_file(&path)?;

    Ok(Artifact {
        file_name,
        path,
        size,
        checksum,
    })
}
