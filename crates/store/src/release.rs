//! Release registry.
//!
//! The registry maps versions to release metadata for every deployment
//! environment and keeps a per-environment pointer to the latest release.
//! The JSON snapshot on disk is the source of truth, and is rewritten
//! atomically after every successful registration.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use common::environment::Environment;
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::{
    snapshot::{self, SnapshotError},
    version::Version,
};

/// Registered release record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Release {
    /// Release version.
    pub version: Version,

    /// Free-form release notes shown to users.
    pub notes: String,

    /// Registration timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub release_date: OffsetDateTime,

    /// Environment the release was registered for.
    pub environment: Environment,
}

/// Stored release metadata, keyed by version in the snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseEntry {
    notes: String,
    #[serde(with = "time::serde::rfc3339")]
    release_date: OffsetDateTime,
    environment: Environment,
}

/// Pointer to the highest registered version of an environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestPointer {
    pub version: Version,
    pub notes: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct EnvironmentReleases {
    #[serde(default)]
    latest: Option<LatestPointer>,
    #[serde(default)]
    versions: BTreeMap<Version, ReleaseEntry>,
}

impl EnvironmentReleases {
    fn release(&self, version: Version) -> Option<Release> {
        self.versions.get(&version).map(|entry| Release {
            version,
            notes: entry.notes.clone(),
            release_date: entry.release_date,
            environment: entry.environment,
        })
    }
}

type Snapshot = BTreeMap<Environment, EnvironmentReleases>;

/// Errors that may occur during release registration.
#[derive(Debug, Display, From, Error)]
pub enum RegisterError {
    /// The version already exists in the target environment.
    #[display(fmt = "version {} is already registered", _0)]
    DuplicateVersion(#[error(not(source))] Version),

    /// Updated registry could not be written to disk.
    Snapshot(SnapshotError),
}

/// File-backed release registry.
#[derive(Debug)]
pub struct VersionRegistry {
    path: PathBuf,
    state: RwLock<Snapshot>,
}

impl VersionRegistry {
    /// Open the registry stored at the provided path.
    ///
    /// A missing file results in an empty registry, while an unreadable
    /// or corrupt one is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let path = path.as_ref().to_path_buf();
        let state: Snapshot = snapshot::load(&path)?;

        for (environment, releases) in &state {
            info!(
                %environment,
                releases = releases.versions.len(),
                latest = ?releases.latest.as_ref().map(|latest| latest.version.to_string()),
                "loaded release registry"
            );
        }

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Register a new release.
    ///
    /// The latest pointer moves only when the new version is greater
    /// than the current latest one, so registering an older hotfix
    /// never regresses update checks.
    pub fn register(
        &self,
        version: Version,
        notes: String,
        environment: Environment,
    ) -> Result<Release, RegisterError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state
            .get(&environment)
            .map_or(false, |releases| releases.versions.contains_key(&version))
        {
            return Err(RegisterError::DuplicateVersion(version));
        }

        let release = Release {
            version,
            notes,
            release_date: OffsetDateTime::now_utc(),
            environment,
        };

        let mut next = state.clone();
        let releases = next.entry(environment).or_default();

        releases.versions.insert(
            version,
            ReleaseEntry {
                notes: release.notes.clone(),
                release_date: release.release_date,
                environment,
            },
        );

        let advances = releases
            .latest
            .as_ref()
            .map_or(true, |latest| version > latest.version);

        if advances {
            releases.latest = Some(LatestPointer {
                version,
                notes: release.notes.clone(),
            });
        }

        snapshot::persist(&self.path, &next)?;
        *state = next;

        info!(%version, %environment, latest = advances, "registered release");

        Ok(release)
    }

    /// Latest release of the provided environment.
    pub fn latest(&self, environment: Environment) -> Option<Release> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let releases = state.get(&environment)?;

        releases.release(releases.latest.as_ref()?.version)
    }

    /// Release with the provided version, if registered.
    pub fn get(&self, environment: Environment, version: Version) -> Option<Release> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        state.get(&environment)?.release(version)
    }

    /// All releases of the provided environment, in ascending version order.
    pub fn releases(&self, environment: Environment) -> Vec<Release> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        state
            .get(&environment)
            .map(|releases| {
                releases
                    .versions
                    .keys()
                    .filter_map(|version| releases.release(*version))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use common::environment::Environment;

    use super::{RegisterError, VersionRegistry};
    use crate::version::Version;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn latest_follows_semantic_order() {
        let dir = tempfile::tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path().join("versions.json")).unwrap();

        assert!(registry.latest(Environment::Prod).is_none());

        registry
            .register(v("1.0.2"), String::from("Fixes"), Environment::Prod)
            .unwrap();
        registry
            .register(v("1.0.1"), String::from("Hotfix"), Environment::Prod)
            .unwrap();

        let latest = registry.latest(Environment::Prod).unwrap();
        assert_eq!(latest.version, v("1.0.2"));
        assert_eq!(latest.notes, "Fixes");

        registry
            .register(v("1.0.10"), String::from("Newer"), Environment::Prod)
            .unwrap();
        assert_eq!(
            registry.latest(Environment::Prod).unwrap().version,
            v("1.0.10")
        );

        let versions: Vec<String> = registry
            .releases(Environment::Prod)
            .into_iter()
            .map(|release| release.version.to_string())
            .collect();
        assert_eq!(versions, ["1.0.1", "1.0.2", "1.0.10"]);
    }

    #[test]
    fn duplicate_is_rejected_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versions.json");
        let registry = VersionRegistry::open(&path).unwrap();

        registry
            .register(v("1.0.2"), String::from("First"), Environment::Prod)
            .unwrap();
        let before = fs::read(&path).unwrap();

        let result = registry.register(v("1.0.2"), String::from("Second"), Environment::Prod);

        assert!(matches!(
            result,
            Err(RegisterError::DuplicateVersion(version)) if version == v("1.0.2")
        ));
        assert_eq!(registry.latest(Environment::Prod).unwrap().notes, "First");
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn environments_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path().join("versions.json")).unwrap();

        registry
            .register(v("2.0.0"), String::new(), Environment::Dev)
            .unwrap();
        registry
            .register(v("2.0.0"), String::new(), Environment::Prod)
            .unwrap();

        assert!(registry.latest(Environment::Staging).is_none());
        assert_eq!(
            registry.latest(Environment::Dev).unwrap().environment,
            Environment::Dev
        );
        assert!(registry.get(Environment::Prod, v("2.0.0")).is_some());
        assert!(registry.get(Environment::Prod, v("2.0.1")).is_none());
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versions.json");

        let registered = {
            let registry = VersionRegistry::open(&path).unwrap();
            registry
                .register(v("1.0.0"), String::from("Initial"), Environment::Prod)
                .unwrap()
        };

        let snapshot: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(snapshot["prod"]["latest"]["version"], "1.0.0");
        assert_eq!(snapshot["prod"]["latest"]["notes"], "Initial");
        assert_eq!(snapshot["prod"]["versions"]["1.0.0"]["environment"], "prod");
        assert!(snapshot["prod"]["versions"]["1.0.0"]["releaseDate"].is_string());

        let registry = VersionRegistry::open(&path).unwrap();
        assert_eq!(registry.latest(Environment::Prod), Some(registered));
    }

    #[test]
    fn failed_persist_keeps_memory_state() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the snapshot path makes the final rename fail.
        let path = dir.path().join("versions.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"").unwrap();

        let registry = VersionRegistry {
            path: path.clone(),
            state: Default::default(),
        };

        let result = registry.register(v("1.0.0"), String::new(), Environment::Prod);

        assert!(matches!(result, Err(RegisterError::Snapshot(_))));
        assert!(registry.latest(Environment::Prod).is_none());
    }

    #[test]
    fn corrupt_snapshot_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versions.json");
        fs::write(&path, b"[1, 2").unwrap();

        assert!(VersionRegistry::open(&path).is_err());
    }
}
