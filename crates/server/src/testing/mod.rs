use std::{error::Error, fs, sync::Arc};

use axum::{async_trait, Router};
use common::config::{Config, Storage};
use hyper::body::{self, Bytes, HttpBody};
use serde::Serialize;
use store::{release::Release, version::Version, Store};
use tempfile::TempDir;

pub(crate) const TENANT_EMAIL: &str = "acme@example.com";
pub(crate) const TENANT_SECRET: &str = "acme-secret-key";

/// Isolated server state backed by a temporary directory.
pub(crate) struct TestEnv {
    _dir: TempDir,
    pub store: Arc<Store>,
    pub config: Arc<Config>,
}

pub(crate) fn create_env() -> TestEnv {
    let dir = tempfile::tempdir().expect("unable to create temporary directory");

    let mut config = Config::for_tests();
    config.storage = Storage {
        registry_path: dir.path().join("versions.json"),
        tenants_path: dir.path().join("users.json"),
        artifacts_path: dir.path().join("installers"),
    };

    let store = Store::open(&config).expect("unable to open store");

    store
        .tenants
        .add(String::from(TENANT_EMAIL), String::from(TENANT_SECRET))
        .expect("unable to add tenant");

    TestEnv {
        _dir: dir,
        store: Arc::new(store),
        config: Arc::new(config),
    }
}

impl TestEnv {
    pub(crate) fn router(&self) -> Router {
        crate::app_router(self.store.clone(), self.config.clone())
    }

    pub(crate) fn register(&self, version: &str, notes: &str) -> Release {
        let version: Version = version.parse().expect("invalid version");

        self.store
            .registry
            .register(version, notes.to_string(), self.config.updates.environment)
            .expect("unable to register release")
    }

    /// Place an installer for the provided version into the artifact directory.
    pub(crate) fn upload_installer(&self, version: &str, contents: &[u8]) {
        let version: Version = version.parse().expect("invalid version");

        fs::write(
            self.config.storage.artifacts_path.join(store::artifact::file_name(
                version,
                self.config.updates.environment,
            )),
            contents,
        )
        .expect("unable to write installer");
    }
}

pub(crate) trait RequestBodyExt: Sized {
    fn from_json<B: Serialize>(val: B) -> Self;
}

impl<T> RequestBodyExt for T
where
    T: HttpBody + From<Vec<u8>>,
{
    fn from_json<B: Serialize>(val: B) -> Self {
        T::from(serde_json::to_vec(&val).expect("unable to serialize"))
    }
}

#[async_trait(?Send)]
pub(crate) trait ResponseBodyExt {
    async fn bytes(self) -> Bytes;

    async fn json(self) -> serde_json::Value;
}

#[async_trait(?Send)]
impl<T> ResponseBodyExt for T
where
    T: HttpBody,
    T::Error: Error,
{
    async fn bytes(self) -> Bytes {
        body::to_bytes(self)
            .await
            .expect("unable to convert to bytes")
    }

    async fn json(self) -> serde_json::Value {
        serde_json::from_slice(&self.bytes().await).expect("unable to convert to json")
    }
}
