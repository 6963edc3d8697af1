pub mod config;
pub mod environment;
pub mod hash;

#[cfg(feature = "logging")]
pub mod logging;
