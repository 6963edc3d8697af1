use std::{net::SocketAddr, path::PathBuf};

use byte_unit::n_kib_bytes;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

#[cfg(feature = "logging")]
use tracing_subscriber::filter::LevelFilter;

use crate::environment::Environment;

/// HTTP server configuration.
#[derive(Deserialize)]
pub struct Server {
    /// Address, that HTTP server will listen on.
    pub address: SocketAddr,
}

/// Implementation of [`serde`]'s deserializer for [`FromStr`] types.
#[cfg(feature = "logging")]
fn deserialize_from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: std::str::FromStr,
    T::Err: std::error::Error,
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    std::str::FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

/// Logging configuration.
#[cfg(feature = "logging")]
#[derive(Deserialize)]
pub struct Logging {
    /// Log level.
    #[serde(deserialize_with = "deserialize_from_str")]
    pub level: LevelFilter,
}

#[cfg(feature = "logging")]
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
        }
    }
}

/// On-disk state locations.
#[derive(Deserialize)]
pub struct Storage {
    /// JSON file holding every registered release.
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,

    /// JSON file holding tenant credentials.
    #[serde(default = "default_tenants_path")]
    pub tenants_path: PathBuf,

    /// Flat directory containing installer binaries.
    #[serde(default = "default_artifacts_path")]
    pub artifacts_path: PathBuf,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            tenants_path: default_tenants_path(),
            artifacts_path: default_artifacts_path(),
        }
    }
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("data/versions.json")
}

fn default_tenants_path() -> PathBuf {
    PathBuf::from("data/users.json")
}

fn default_artifacts_path() -> PathBuf {
    PathBuf::from("data/installers")
}

/// Update distribution configuration.
#[derive(Deserialize)]
pub struct Updates {
    /// Shared key required by every management route.
    pub admin_key: String,

    /// Environment this instance answers update checks for.
    #[serde(default)]
    pub environment: Environment,

    /// Externally visible base URL, used to build download links.
    ///
    /// When empty, download links are relative to the server root.
    #[serde(default)]
    pub public_url: String,

    /// Download token lifetime, in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl: u64,

    /// Interval between expired token sweeps, in seconds.
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval: u64,

    /// Chunk capacity used while streaming installers, in bytes.
    #[serde(default = "default_stream_buffer_size")]
    pub stream_buffer_size: usize,
}

/// Longest accepted download token lifetime, in seconds.
pub const MAX_TOKEN_TTL: u64 = 86_400;

fn default_token_ttl() -> u64 {
    600
}

fn default_reaper_interval() -> u64 {
    60
}

fn default_stream_buffer_size() -> usize {
    n_kib_bytes!(64) as usize
}

/// General configuration.
#[derive(Deserialize)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: Option<Server>,

    /// Logging configuration.
    #[cfg(feature = "logging")]
    #[serde(default)]
    pub logging: Logging,

    /// On-disk state configuration.
    #[serde(default)]
    pub storage: Storage,

    /// Update distribution configuration.
    pub updates: Updates,
}

impl Config {
    /// Create new config using default configuration file or environment variables.
    ///
    /// Nested keys are separated with a double underscore, so
    /// `CONFIG_UPDATES__ADMIN_KEY` sets `updates.admin_key`.
    ///
    /// See [`Env`] for more details on how to use environment variables configuration.
    ///
    /// [`Env`]: figment::providers::Env
    ///
    /// Fails if `updates.token_ttl` is zero or exceeds [`MAX_TOKEN_TTL`].
    pub fn new(path: Option<PathBuf>) -> Result<Self, figment::Error> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.unwrap_or(PathBuf::from("Config.toml"))))
            .merge(Env::prefixed("CONFIG_").split("__"))
            .extract()?;

        if !(1..=MAX_TOKEN_TTL).contains(&config.updates.token_ttl) {
            return Err(figment::Error::from(format!(
                "updates.token_ttl must be between 1 and {MAX_TOKEN_TTL} seconds, got {}",
                config.updates.token_ttl
            )));
        }

        Ok(config)
    }

    /// Create new config suitable for running unit tests.
    #[cfg(feature = "test-utils")]
    pub fn for_tests() -> Self {
        Self {
            server: Some(Server {
                address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            }),
            #[cfg(feature = "logging")]
            logging: Logging::default(),
            storage: Storage::default(),
            updates: Updates {
                admin_key: String::from("test-admin-key"),
                environment: Environment::Prod,
                public_url: String::from("http://updates.test"),
                token_ttl: default_token_ttl(),
                reaper_interval: default_reaper_interval(),
                stream_buffer_size: default_stream_buffer_size(),
            },
        }
    }
}
