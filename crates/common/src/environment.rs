//! Deployment environments.
//!
//! Every release is registered against exactly one environment, and each
//! server instance answers update checks for the environment it was
//! configured with.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Deployment environment a release belongs to.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development builds.
    Dev,

    /// Pre-release builds.
    Staging,

    /// Production builds.
    #[default]
    Prod,
}

impl Environment {
    /// All known environments.
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Staging, Environment::Prod];

    /// Lowercase environment name, as used in files and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }

    /// Installer profile infix used by non-production artifacts.
    ///
    /// Production installers carry no profile in their file name.
    pub fn artifact_profile(&self) -> Option<&'static str> {
        match self {
            Environment::Prod => None,
            other => Some(other.as_str()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown environment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEnvironment(pub String);

impl fmt::Display for UnknownEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown environment `{}`", self.0)
    }
}

impl std::error::Error for UnknownEnvironment {}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(UnknownEnvironment(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Environment;

    #[test]
    fn parse_aliases() {
        assert_eq!("production".parse::<Environment>(), Ok(Environment::Prod));
        assert_eq!("DEV".parse::<Environment>(), Ok(Environment::Dev));
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn profile_only_outside_prod() {
        assert_eq!(Environment::Prod.artifact_profile(), None);
        assert_eq!(Environment::Staging.artifact_profile(), Some("staging"));
    }

    #[test]
    fn serialized_lowercase() {
        assert_eq!(
            serde_json::to_string(&Environment::Staging).unwrap(),
            "\"staging\""
        );
    }
}
