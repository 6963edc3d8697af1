//! Release version numbers.
//!
//! Versions are strict `major.minor.patch` triples of decimal integers.
//! Ordering is numeric per component, so `1.2.0` is older than `1.10.0`.

use std::{cmp::Ordering, fmt, str::FromStr};

use derive_more::{Display, Error};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").expect("invalid version pattern"));

/// Provided string is not a `major.minor.patch` version.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display(fmt = "malformed version `{}`", _0)]
pub struct MalformedVersion(#[error(not(source))] pub String);

/// Parsed release version.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for Version {
    type Err = MalformedVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedVersion(s.to_string());

        let captures = VERSION_PATTERN.captures(s).ok_or_else(malformed)?;

        // Components that overflow u64 are rejected rather than truncated.
        let component = |idx: usize| -> Result<u64, MalformedVersion> {
            captures
                .get(idx)
                .ok_or_else(malformed)?
                .as_str()
                .parse()
                .map_err(|_| malformed())
        };

        Ok(Version::new(component(1)?, component(2)?, component(3)?))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Position of a client version relative to the latest release.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Comparison {
    /// Client runs an older version, an update is available.
    Older,

    /// Client runs exactly the latest version.
    Same,

    /// Client runs a version newer than anything registered.
    Newer,
}

impl From<Ordering> for Comparison {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => Comparison::Older,
            Ordering::Equal => Comparison::Same,
            Ordering::Greater => Comparison::Newer,
        }
    }
}

/// Compare a client version string against the latest version string.
pub fn compare(client: &str, latest: &str) -> Result<Comparison, MalformedVersion> {
    let client: Version = client.parse()?;
    let latest: Version = latest.parse()?;

    Ok(client.cmp(&latest).into())
}
